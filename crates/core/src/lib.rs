//! Shared primitives for all Rust crates in the Grafana folder SDK.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used across SDK crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Creates a validated non-empty string, naming the rejected field on error.
    pub fn named(field: &str, value: impl Into<String>) -> AppResult<Self> {
        Self::new(value)
            .map_err(|_| AppError::Validation(format!("{field} must not be empty or whitespace")))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common error categories surfaced by the SDK.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or a request the server rejected as malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed to access a resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Transport, decode or otherwise unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
