//! Error type shared by the store, the generator adapter and the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::model::FormStatus;

#[derive(Debug, Error)]
pub enum AppError {
    /// The upstream reply could not be parsed as JSON at any unwrapping level
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    /// The generation service answered with a non-2xx status
    #[error("generation service returned {status}: {body}")]
    UpstreamUnavailable { status: u16, body: String },

    /// The generation service could not be reached
    #[error("generation service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// No key for the generation service; reported like an unreachable upstream
    #[error("generation service is not configured: {0}")]
    NotConfigured(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("form is not published yet")]
    NotPublished,

    #[error("form is closed")]
    FormClosed,

    #[error("cannot {action} a {from:?} form")]
    InvalidTransition {
        action: &'static str,
        from: FormStatus,
    },

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Stable machine readable code used in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MalformedResponse(_) => "malformed_response",
            AppError::UpstreamUnavailable { .. }
            | AppError::Transport(_)
            | AppError::NotConfigured(_) => "upstream_unavailable",
            AppError::NotFound(_) => "not_found",
            AppError::NotPublished => "not_published",
            AppError::FormClosed => "closed",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::InvalidSubmission(_) => "invalid_submission",
            AppError::BadRequest(_) => "bad_request",
            AppError::Storage(_) | AppError::Serialization(_) | AppError::Io(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedResponse(_)
            | AppError::UpstreamUnavailable { .. }
            | AppError::Transport(_)
            | AppError::NotConfigured(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotPublished => StatusCode::FORBIDDEN,
            AppError::FormClosed => StatusCode::GONE,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::InvalidSubmission(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) | AppError::Serialization(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(json!({
                "error": self.to_string(),
                "code": self.code(),
            })),
        )
            .into_response()
    }
}
