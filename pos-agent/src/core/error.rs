use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::printing::JobError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

/// `{status: "ok" | "error", msg}` body shared by every mutating route
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub msg: String,
}

impl StatusResponse {
    pub fn ok(msg: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "ok",
            msg: msg.into(),
        })
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error",
            msg: msg.into(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Job(JobError::Busy(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(err) => {
                tracing::error!(error = ?err, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(StatusResponse::error(self.to_string()))).into_response()
    }
}

/// Handler result type
pub type Result<T> = std::result::Result<T, ServerError>;
