//! Server Implementation
//!
//! HTTPS when `cert.pem` and `key.pem` sit in the work dir, plain HTTP
//! otherwise. Stops on Ctrl-C or when the shutdown token is cancelled.

use crate::core::{Result, ServerError, ServerState};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::time::Duration;

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";

/// How long in-flight requests get to finish on shutdown
const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// HTTP Server
pub struct Server {
    state: ServerState,
}

impl Server {
    pub fn new(state: ServerState) -> Self {
        Self { state }
    }

    /// TLS config from the work dir, if both PEM files exist
    async fn load_tls_config(&self) -> Result<Option<RustlsConfig>> {
        let cert = self.state.work_dir().join(CERT_FILE);
        let key = self.state.work_dir().join(KEY_FILE);
        if !cert.exists() || !key.exists() {
            return Ok(None);
        }

        let config = RustlsConfig::from_pem_file(&cert, &key)
            .await
            .map_err(|e| ServerError::Internal(anyhow::anyhow!("Failed to load TLS certificates: {}", e)))?;
        Ok(Some(config))
    }

    pub async fn run(&self) -> Result<()> {
        let config = self.state.config();
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let app = crate::api::build_app(self.state.clone());

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let shutdown = self.state.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down..."),
                _ = shutdown.cancelled() => tracing::info!("Stop requested, shutting down..."),
            }
            shutdown_handle.graceful_shutdown(Some(GRACE_PERIOD));
        });

        let mode = if config.test_mode {
            "TEST (file)"
        } else {
            "PRODUCTION (hardware)"
        };
        tracing::info!(mode, interface = %config.printer.interface, "Print mode");

        let served = match self.load_tls_config().await? {
            Some(tls) => {
                tracing::info!("POS Agent listening on https://{}", addr);
                axum_server::bind_rustls(addr, tls)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await
            }
            None => {
                tracing::info!("POS Agent listening on http://{}", addr);
                axum_server::bind(addr)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await
            }
        };

        served.map_err(|e| ServerError::Internal(anyhow::anyhow!("Server error: {}", e)))
    }
}
