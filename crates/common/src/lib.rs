//! StudyMill Common Library
//!
//! Shared code for the StudyMill worker processes:
//! - Database models and repository pattern
//! - Task queue integration
//! - Chat-completion LLM client abstraction
//! - Error types and handling
//! - Configuration management

pub mod config;
pub mod db;
pub mod errors;
pub mod llm;
pub mod queue;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{Repository, StudyStore};
pub use errors::{AppError, Result};
pub use llm::TextGenerator;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum length of the error message persisted on a failed study
pub const MAX_FAILURE_MESSAGE_CHARS: usize = 1000;
