use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::FieldName;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// A rejected conversation turn. Every variant leaves the conversation state
/// exactly as it was before the event, so the user can simply try again.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TurnError {
    #[error("Message blocked: abusive content detected.")]
    AbuseRejected,

    #[error("Invalid {0}. Try again.")]
    ValidationFailed(FieldName),

    #[error("We need your consent to proceed.")]
    ConsentRequired,

    #[error("That input isn't expected right now.")]
    NotAccepting,

    #[error("No final response from the assistant: {0}")]
    CollaboratorUnavailable(String),

    #[error("Could not save your appointment: {0}")]
    PersistenceFailed(String),
}
