//! Worker error taxonomy
//!
//! Every way a single job can fail, with a hard split between the sanitized
//! message persisted on the study (what end users see) and the internal
//! detail that only reaches the logs.

use studymill_common::llm::LlmError;
use thiserror::Error;

/// Failure modes of the document-processing pipeline
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("Unsupported file extension: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Source unavailable ({reference}): {detail}")]
    SourceUnavailable { reference: String, detail: String },

    #[error("AI service unavailable (status {status:?}): {detail}")]
    AiServiceUnavailable { status: Option<u16>, detail: String },

    #[error("AI connection failure: {detail}")]
    AiConnectionFailure { detail: String },

    #[error("AI response malformed: {detail}")]
    AiResponseMalformed { detail: String },
}

impl ProcessError {
    /// Sanitized, user-facing message. Never contains HTTP statuses,
    /// provider error bodies, or filesystem paths.
    pub fn user_message(&self) -> String {
        match self {
            ProcessError::UnsupportedFormat { extension } => {
                format!("Unsupported file format: {}", extension)
            }
            ProcessError::SourceUnavailable { .. } => {
                "The source document could not be found on the server.".to_string()
            }
            ProcessError::AiServiceUnavailable {
                status: Some(402), ..
            } => "The AI service is temporarily unavailable.".to_string(),
            ProcessError::AiServiceUnavailable { .. } => {
                "The AI service is currently unavailable. Please try again later.".to_string()
            }
            ProcessError::AiConnectionFailure { .. } => {
                "Could not reach the AI service. Please try again later.".to_string()
            }
            ProcessError::AiResponseMalformed { .. } => {
                "The AI service returned an invalid response.".to_string()
            }
        }
    }
}

impl From<LlmError> for ProcessError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured => ProcessError::AiServiceUnavailable {
                status: None,
                detail: "API key missing".to_string(),
            },
            LlmError::Unavailable { status, detail } => ProcessError::AiServiceUnavailable {
                status: Some(status),
                detail,
            },
            LlmError::Billing { status, detail } => ProcessError::AiServiceUnavailable {
                status: Some(status),
                detail,
            },
            LlmError::Connection { detail } => ProcessError::AiConnectionFailure { detail },
            LlmError::Malformed { detail } => ProcessError::AiResponseMalformed { detail },
        }
    }
}
