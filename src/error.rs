//! HTTP-facing error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::db::RepoError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum AppError {
    /// The request body could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Repository(_)
            | AppError::Session(_)
            | AppError::Template(_)
            | AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
            (status, "Internal server error").into_response()
        } else {
            tracing::debug!("{}", self);
            (status, "Bad request").into_response()
        }
    }
}
