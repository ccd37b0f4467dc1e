//! Error types for StudyMill services
//!
//! One `AppError` enum shared by the infrastructure layers (database, queue,
//! configuration). Pipeline-level failures carry their own taxonomy in the
//! worker crate; only infrastructure concerns live here.

use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    // Resource errors
    #[error("Study not found: {id}")]
    StudyNotFound { id: i32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Queue errors
    #[error("Queue error: {message}")]
    QueueError { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether a retry against the same input could ever succeed.
    ///
    /// Validation and not-found errors are deterministic; everything else is
    /// assumed to be environmental.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. }
                | AppError::MissingField { .. }
                | AppError::StudyNotFound { .. }
                | AppError::Serialization(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
