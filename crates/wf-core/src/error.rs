//! # AppError
//!
//! Centralized error handling for Wayfarer.
//! Collaborator failures are mapped into these variants at the port boundary.

use std::fmt::Display;

use thiserror::Error;

/// The primary error type for all wf-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Post, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., blank title, effort outside 1-5, unsupported media)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Auth failure (e.g., bad credentials, expired or unknown session)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Infrastructure failure (e.g., database down, disk full)
    #[error("internal service error: {0}")]
    Internal(String),

    /// Resource already exists (e.g., email already registered)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded
    #[error("too many requests: {0}")]
    RateLimitExceeded(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Wraps an infrastructure error. Plugins use this with `map_err`.
    pub fn internal(err: impl Display) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain on one line
        Self::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for Wayfarer logic.
pub type Result<T> = std::result::Result<T, AppError>;
