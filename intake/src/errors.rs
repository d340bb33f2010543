use crate::db::errors::DbError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data, including bodies that are not valid JSON
    #[error("{message}")]
    BadRequest { message: String },

    /// The `action` query parameter is missing, unknown, or not allowed with this method
    #[error("Unknown action: {action}")]
    UnknownAction { action: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } | Error::UnknownAction { .. } => StatusCode::BAD_REQUEST,
            Error::Database(DbError::UniqueViolation { .. }) => StatusCode::CONFLICT,
            Error::Database(DbError::Transient(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal { .. } | Error::Database(_) | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::UnknownAction { .. } => self.to_string(),
            Error::Database(DbError::UniqueViolation { .. }) => "Resource already exists".to_string(),
            Error::Database(DbError::Transient(_)) => "Service temporarily unavailable".to_string(),
            Error::Database(_) => "Database error occurred".to_string(),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database error: {}", self);
            }
            Error::BadRequest { .. } | Error::UnknownAction { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
