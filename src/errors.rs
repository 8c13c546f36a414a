use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ErrorResponse;

/// Errors a handler can answer with; each renders the error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// Downstream failure. `error` is echoed to the client.
    #[error("{message}")]
    Internal {
        message: String,
        error: Option<String>,
        details: Option<serde_json::Value>,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>, error: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            message: message.into(),
            error: Some(error.to_string()),
            details: None,
        }
    }

    /// A 500 without an underlying error, e.g. an update that touched no rows.
    pub fn failed(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
            error: None,
            details: None,
        }
    }

    pub fn with_details(self, details: serde_json::Value) -> Self {
        match self {
            ApiError::Internal { message, error, .. } => ApiError::Internal {
                message,
                error,
                details: Some(details),
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "rejected request body");
        ApiError::bad_request("Invalid JSON body")
    }
}

/// The only query string the API parses is the users page.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "rejected query string");
        ApiError::bad_request("Invalid pagination parameters")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(message) | ApiError::NotFound(message) => {
                ErrorResponse::new(message)
            }
            ApiError::Internal {
                message,
                error,
                details,
            } => ErrorResponse {
                error,
                details,
                ..ErrorResponse::new(message)
            },
        };
        (status, Json(body)).into_response()
    }
}
