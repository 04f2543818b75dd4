use super::response::{bad_request, internal_error, not_found};
use axum::response::Response;
use serde::Serialize;
use thiserror::Error;

use crate::panels::StoreError;

#[derive(Debug, Clone, Copy, Serialize)]
#[repr(i32)]
pub enum ErrorCode {
    Validation = 1000,
    PanelIdInvalid = 1001,
    ArtifactNotFound = 2000,
    Storage = 9001,
    Internal = 9000,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::Validation => "validation error",
            ErrorCode::PanelIdInvalid => "invalid panel id",
            ErrorCode::ArtifactNotFound => "File not found",
            ErrorCode::Storage => "storage error",
            ErrorCode::Internal => "internal error",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid panel id: {0}")]
    PanelIdInvalid(String),
    #[error("File not found")]
    ArtifactNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::Validation,
            AppError::PanelIdInvalid(_) => ErrorCode::PanelIdInvalid,
            AppError::ArtifactNotFound(_) => ErrorCode::ArtifactNotFound,
            AppError::Storage(_) => ErrorCode::Storage,
            AppError::Internal(_) => ErrorCode::Internal,
        }
    }
    pub fn to_response(&self) -> Response {
        match self.code() {
            ErrorCode::Validation | ErrorCode::PanelIdInvalid => {
                bad_request(self.code(), self.to_string())
            }
            ErrorCode::ArtifactNotFound => {
                not_found(self.code(), self.to_string())
            }
            ErrorCode::Storage | ErrorCode::Internal => {
                internal_error(self.code(), self.to_string())
            }
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidId(id) => AppError::PanelIdInvalid(id),
            StoreError::Io(io) => AppError::Storage(io.to_string()),
        }
    }
}
