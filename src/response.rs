use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Success envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: Status,
    pub message: String,
    pub data: T,
    /// Number of items in `data` (list endpoints only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Total number of items available (list endpoints only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// ISO-8601 UTC.
    pub timestamp: String,
}

/// Error envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub status: Status,
    pub message: String,
    /// Underlying cause, present on server errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data,
            count: None,
            total: None,
            timestamp: now_iso8601(),
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn page(message: impl Into<String>, data: Vec<T>, total: u64) -> Self {
        let count = data.len();
        Self {
            count: Some(count),
            total: Some(total),
            ..Self::success(message, data)
        }
    }
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            error: None,
            details: None,
            timestamp: now_iso8601(),
        }
    }
}

/// A success envelope paired with the HTTP status it is sent with.
pub struct Reply<T>(pub StatusCode, pub ApiResponse<T>);

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

pub fn ok<T>(message: impl Into<String>, data: T) -> Reply<T> {
    Reply(StatusCode::OK, ApiResponse::success(message, data))
}

pub fn created<T>(message: impl Into<String>, data: T) -> Reply<T> {
    Reply(StatusCode::CREATED, ApiResponse::success(message, data))
}

pub fn page<T>(message: impl Into<String>, data: Vec<T>, total: u64) -> Reply<Vec<T>> {
    Reply(StatusCode::OK, ApiResponse::page(message, data, total))
}

pub fn now_iso8601() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_list_fields() {
        let json = serde_json::to_value(ApiResponse::success("done", 5)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "done");
        assert_eq!(json["data"], 5);
        assert!(json.get("count").is_none());
        assert!(json.get("error").is_none());
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn page_envelope_counts_items() {
        let json = serde_json::to_value(ApiResponse::page("list", vec![1, 2], 9)).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["total"], 9);
    }

    #[test]
    fn error_envelope_has_no_data() {
        let json = serde_json::to_value(ErrorResponse::new("nope")).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("data").is_none());
        assert!(json.get("error").is_none());
    }
}
