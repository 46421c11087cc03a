//! HTTP API
//!
//! | Module | Routes |
//! |--------|--------|
//! | [`print`] | `/print`, `/imprimir`, `/api/last-job`, `/printer/open` |
//! | [`system`] | `/api/config`, `/api/logs`, `/api/service/stop` |
//! | [`health`] | `/health` |

pub mod health;
pub mod print;
pub mod system;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use http::{HeaderValue, Method, request::Parts};
use parking_lot::RwLock;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::{AgentConfig, ServerState};

/// Base64 logos make print requests large
const MAX_BODY_SIZE: usize = 20 * 1024 * 1024;

/// Whether a browser origin may call the agent
///
/// Local origins are always allowed so the agent can never lock out its own
/// UI; otherwise an empty `allowed_origins` list allows everyone.
pub fn origin_allowed(origin: &str, allowed_origins: &[String]) -> bool {
    if origin.contains("localhost") || origin.contains("127.0.0.1") {
        return true;
    }
    allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == origin)
}

fn cors_layer(config: Arc<RwLock<AgentConfig>>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                let Ok(origin) = origin.to_str() else {
                    return false;
                };
                let allowed = origin_allowed(origin, &config.read().allowed_origins);
                if !allowed {
                    tracing::warn!(origin, "Blocked CORS request");
                }
                allowed
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Build the application router
pub fn build_app(state: ServerState) -> Router {
    let cors = cors_layer(state.config.clone());

    Router::<ServerState>::new()
        .merge(print::router())
        .merge(system::router())
        .merge(health::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
