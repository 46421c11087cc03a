//! Print routes

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;

use crate::core::{Result, ServerError, ServerState, StatusResponse};
use crate::printing::{Command, JobOutcome};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/print", post(print))
        .route("/imprimir", post(print))
        .route("/api/last-job", get(last_job))
        .route("/printer/open", get(open_drawer).post(open_drawer))
}

#[derive(Debug, Serialize)]
pub struct LastJobResponse {
    pub status: &'static str,
    pub commands: Option<Vec<Command>>,
}

async fn print(
    State(state): State<ServerState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<StatusResponse>> {
    let Json(payload) = payload.map_err(|e| ServerError::Validation(e.body_text()))?;
    tracing::info!("New print request");

    match state.executor.submit(payload).await? {
        JobOutcome::Transmitted { bytes } => tracing::info!(bytes, "Job sent to printer"),
        JobOutcome::Simulated { buffer, path } => {
            tracing::info!(bytes = buffer.len(), path = ?path, "Job simulated")
        }
    }
    Ok(StatusResponse::ok("Trabajo de impresión procesado"))
}

async fn last_job(State(state): State<ServerState>) -> Json<LastJobResponse> {
    Json(LastJobResponse {
        status: "ok",
        commands: state.executor.last_job(),
    })
}

async fn open_drawer(State(state): State<ServerState>) -> Result<Json<StatusResponse>> {
    state.executor.open_cash_drawer().await?;
    Ok(StatusResponse::ok("Cash register opened successfully"))
}
