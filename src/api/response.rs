use super::error::ErrorCode;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Error body shared by every route: `{"error": "...", "code": 2000}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: i32,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, msg: Option<String>) -> Self {
        Self {
            error: msg.unwrap_or_else(|| code.default_message().to_string()),
            code: code.code(),
        }
    }
}

// Helpers to produce responses
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(data).into_response()
}

fn error_response(
    status: StatusCode,
    code: ErrorCode,
    msg: impl Into<String>,
) -> Response {
    (status, Json(ErrorBody::new(code, Some(msg.into())))).into_response()
}

pub fn bad_request(code: ErrorCode, msg: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, msg)
}

pub fn not_found(code: ErrorCode, msg: impl Into<String>) -> Response {
    error_response(StatusCode::NOT_FOUND, code, msg)
}

pub fn internal_error(code: ErrorCode, msg: impl Into<String>) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, code, msg)
}
