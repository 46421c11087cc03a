//! Configuration, logs and service control

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde_json::Value;
use std::time::Duration;

use crate::core::{AgentConfig, Result, ServerError, ServerState, StatusResponse};

/// Delay between answering a stop request and shutting down
const STOP_DELAY: Duration = Duration::from_secs(1);

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/config", get(get_config).post(update_config))
        .route("/api/logs", get(get_logs))
        .route("/api/service/stop", post(stop_service))
}

async fn get_config(State(state): State<ServerState>) -> Json<AgentConfig> {
    Json(state.config())
}

/// Merge the posted fields into the current config and persist it
///
/// Printer settings are read once at startup, so printer changes only take
/// effect after a restart.
async fn update_config(
    State(state): State<ServerState>,
    patch: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let Json(patch) = patch.map_err(|e| ServerError::Validation(e.body_text()))?;
    if !patch.is_object() {
        return Err(ServerError::Validation(
            "config must be a JSON object".to_string(),
        ));
    }

    let merged = state
        .config()
        .merge_json(&patch)
        .map_err(|e| ServerError::Validation(e.to_string()))?;
    merged.save(state.work_dir()).await?;
    *state.config.write() = merged;

    tracing::info!("Config updated");
    Ok(StatusResponse::ok("Configuración guardada."))
}

async fn get_logs(State(state): State<ServerState>) -> Json<Vec<String>> {
    Json(state.logs.snapshot())
}

async fn stop_service(State(state): State<ServerState>) -> Json<StatusResponse> {
    tracing::info!("Stop request received");
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(STOP_DELAY).await;
        shutdown.cancel();
    });
    StatusResponse::ok("Deteniendo servicio...")
}
