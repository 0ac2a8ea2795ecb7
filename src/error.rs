//! Application error taxonomy and its HTTP rendering.
//!
//! Every fallible operation in the crate returns [`AppError`]. Handlers convert
//! it into a JSON body of the form `{"error": {"code", "message", "details"}}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::utils::code_generator::CodeGenerationError;
use crate::utils::custom_code::CustomCodeError;
use crate::utils::url_normalizer::UrlValidationError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Serializable error payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    /// Custom code failed a shape rule (length or characters).
    #[error(transparent)]
    InvalidCustomCode(CustomCodeError),

    /// A lookup key that could never have been assigned.
    #[error("Invalid short code '{code}'")]
    InvalidCode { code: String },

    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("Short code '{code}' is reserved")]
    Reserved { code: String },

    #[error("Short code '{code}' is already taken")]
    AlreadyTaken { code: String },

    #[error("Short link '{code}' not found")]
    NotFound { code: String },

    #[error("Short link '{code}' has been deactivated")]
    Inactive { code: String },

    #[error("Short link '{code}' has expired")]
    Expired { code: String },

    #[error("Could not allocate a unique code after {attempts} attempts")]
    TooManyRetries {
        attempts: u32,
        last_collision: Option<String>,
    },

    #[error("Secure random source failed: {0}")]
    RandomSource(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store operation '{operation}' timed out")]
    Timeout { operation: &'static str },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidUrl(_)
            | AppError::InvalidCustomCode(_)
            | AppError::InvalidCode { .. }
            | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Reserved { .. } | AppError::AlreadyTaken { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Inactive { .. } => StatusCode::FORBIDDEN,
            AppError::Expired { .. } => StatusCode::GONE,
            AppError::TooManyRetries { .. } | AppError::Timeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::RandomSource(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidUrl(UrlValidationError::TooLong { .. }) => "url_too_long",
            AppError::InvalidUrl(UrlValidationError::Malicious) => "malicious_url",
            AppError::InvalidUrl(_) => "invalid_url",
            AppError::InvalidCustomCode(_) => "invalid_custom_code",
            AppError::InvalidCode { .. } => "invalid_code",
            AppError::Validation { .. } => "validation_error",
            AppError::Reserved { .. } => "reserved_code",
            AppError::AlreadyTaken { .. } => "code_taken",
            AppError::NotFound { .. } => "not_found",
            AppError::Inactive { .. } => "inactive",
            AppError::Expired { .. } => "expired",
            AppError::TooManyRetries { .. } => "too_many_retries",
            AppError::Timeout { .. } => "timeout",
            AppError::RandomSource(_) | AppError::Database(_) | AppError::Internal(_) => {
                "internal_error"
            }
        }
    }

    /// Builds the serializable payload.
    ///
    /// Dependency failures get a generic message; their detail stays in the logs.
    pub fn to_error_info(&self) -> ErrorInfo {
        let (message, details) = match self {
            AppError::Validation { message, details } => (message.clone(), details.clone()),
            AppError::InvalidUrl(UrlValidationError::TooLong { max, actual }) => (
                self.to_string(),
                json!({ "max_length": max, "actual_length": actual }),
            ),
            AppError::InvalidCustomCode(CustomCodeError::TooShort { min, actual }) => (
                self.to_string(),
                json!({ "min_length": min, "actual_length": actual }),
            ),
            AppError::InvalidCustomCode(CustomCodeError::TooLong { max, actual }) => (
                self.to_string(),
                json!({ "max_length": max, "actual_length": actual }),
            ),
            AppError::InvalidCode { code }
            | AppError::Reserved { code }
            | AppError::AlreadyTaken { code }
            | AppError::NotFound { code }
            | AppError::Inactive { code }
            | AppError::Expired { code } => (self.to_string(), json!({ "code": code })),
            AppError::TooManyRetries { attempts, .. } => (
                "Could not allocate a short code, try again later".to_string(),
                json!({ "attempts": attempts }),
            ),
            AppError::Timeout { .. } => ("Service temporarily unavailable".to_string(), json!({})),
            AppError::RandomSource(_) | AppError::Database(_) | AppError::Internal(_) => {
                ("Internal server error".to_string(), json!({}))
            }
            _ => (self.to_string(), json!({})),
        };

        ErrorInfo {
            code: self.kind(),
            message,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        }

        let body = ErrorBody {
            error: self.to_error_info(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CustomCodeError> for AppError {
    fn from(err: CustomCodeError) -> Self {
        match err {
            CustomCodeError::Reserved(code) => AppError::Reserved { code },
            other => AppError::InvalidCustomCode(other),
        }
    }
}

impl From<CodeGenerationError> for AppError {
    fn from(err: CodeGenerationError) -> Self {
        match err {
            CodeGenerationError::RandomSource(reason) => AppError::RandomSource(reason),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(err.field_errors()).unwrap_or(Value::Null);
        AppError::validation("Request validation failed", details)
    }
}
