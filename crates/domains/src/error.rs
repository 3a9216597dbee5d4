//! # AppError
//!
//! Centralized error handling for the thread tree.
//! Maps store failures to operation-specific error types.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced entity absent (e.g., Thread, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty text, page out of range)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Store failure before anything was written
    #[error("store error: {0}")]
    StoreError(String),

    /// A multi-step mutation failed after some of its writes committed.
    /// Nothing is rolled back.
    #[error("partial failure after {completed} of {total} writes: {cause}")]
    PartialFailure {
        completed: usize,
        total: usize,
        cause: String,
    },

    #[error("failed to fetch thread: {0}")]
    FetchError(#[source] Box<AppError>),

    #[error("failed to create thread: {0}")]
    CreateError(#[source] Box<AppError>),

    #[error("failed to add comment: {0}")]
    CommentError(#[source] Box<AppError>),

    #[error("failed to delete thread: {0}")]
    DeleteError(#[source] Box<AppError>),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }

    /// Converts a driver error, keeping its whole context chain in the message.
    pub fn store(err: anyhow::Error) -> Self {
        AppError::StoreError(format!("{err:#}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(..))
    }

    /// The innermost error for wrapped variants, `self` otherwise.
    pub fn cause(&self) -> &AppError {
        match self {
            AppError::FetchError(inner)
            | AppError::CreateError(inner)
            | AppError::CommentError(inner)
            | AppError::DeleteError(inner) => inner.cause(),
            other => other,
        }
    }
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, AppError>;
