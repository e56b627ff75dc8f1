//! Error taxonomy for the moderation core and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request fields that failed validation before any state or upstream access.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("artist and title must be non-empty")]
    EmptyFields,
    #[error("action is not supported for this item type")]
    UnsupportedAction,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyFields => "empty_fields",
            ValidationError::UnsupportedAction => "unsupported_action",
        }
    }
}

#[derive(Debug, Error)]
pub enum ModerationError {
    /// Missing, tampered or foreign credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Webhook secret mismatch.
    #[error("forbidden")]
    Forbidden,

    /// Item already resolved (or being resolved) by another moderator.
    #[error("already handled by {by}")]
    Conflict { by: String },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Site API failure, message passed through for diagnostics.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl ModerationError {
    pub fn upstream(err: anyhow::Error) -> Self {
        ModerationError::Upstream(format!("{:#}", err))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ModerationError::Unauthorized | ModerationError::Forbidden => StatusCode::FORBIDDEN,
            ModerationError::Conflict { .. } => StatusCode::CONFLICT,
            ModerationError::Validation(_) => StatusCode::BAD_REQUEST,
            ModerationError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ModerationError {
    fn into_response(self) -> Response {
        let body = match &self {
            ModerationError::Unauthorized => json!({ "error": "unauthorized" }),
            ModerationError::Forbidden => json!({ "error": "forbidden" }),
            ModerationError::Conflict { by } => json!({ "error": "already_handled", "by": by }),
            ModerationError::Validation(v) => json!({ "error": v.code() }),
            ModerationError::Upstream(msg) => json!({ "error": msg }),
        };
        (self.status(), Json(body)).into_response()
    }
}
