//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use crate::db::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, warn};

/// Message returned for every denied permission check
pub const PERMISSION_MESSAGE: &str = "You do not have permission to perform this action.";

/// Message returned for every persistence failure
pub const DATABASE_MESSAGE: &str = "Database error.";

/// Per-field validation messages, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field shorthand
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl IntoIterator for FieldErrors {
    type Item = (String, Vec<String>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, list) in errors.field_errors() {
            for e in list {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", e.code));
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Persistence error: {0}")]
    Store(StoreError),

    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.into())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict(what) => validation_error("conflict", what),
            other => AppError::Store(other),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl AppError {
    /// Permission denied with the standard message
    pub fn permission() -> Self {
        AppError::Unauthorized(PERMISSION_MESSAGE.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_code, message, errors) = match self {
            AppError::Store(e) => {
                error!("Persistence error: {:?}", e);
                let errors = FieldErrors::single("database", DATABASE_MESSAGE);
                ("DATABASE_ERROR", DATABASE_MESSAGE.to_string(), Some(errors))
            }
            AppError::Validation(errors) => (
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(errors),
            ),
            AppError::NotFound(msg) => {
                let errors = FieldErrors::single("notFound", msg.clone());
                ("NOT_FOUND", msg, Some(errors))
            }
            AppError::Unauthorized(msg) => {
                warn!("Permission denied: {}", msg);
                let errors = FieldErrors::single("permissions", msg.clone());
                ("PERMISSION_DENIED", msg, Some(errors))
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ("INTERNAL_ERROR", "An internal error occurred".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            code: error_code.to_string(),
            errors,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error on one field
pub fn validation_error(field: impl Into<String>, msg: impl Into<String>) -> AppError {
    AppError::Validation(FieldErrors::single(field, msg))
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}

/// Returns the standard permission error unless `allowed`
pub fn ensure(allowed: bool) -> ApiResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::permission())
    }
}
