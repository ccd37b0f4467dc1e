//! Chat-completion LLM client abstraction
//!
//! Provides a unified interface for text generation plus the concrete
//! chat-completions HTTP client. Error messages are split in two: the enum
//! variant decides the sanitized user-facing wording, while `detail` keeps
//! the raw status and body for internal logs only.

use crate::config::AiConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors from the text-generation service
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("AI service not configured: api key missing")]
    NotConfigured,

    /// Auth failure or any other HTTP error status
    #[error("AI service error (status {status}): {detail}")]
    Unavailable { status: u16, detail: String },

    /// Quota or payment failure (HTTP 402)
    #[error("AI service billing error (status {status}): {detail}")]
    Billing { status: u16, detail: String },

    /// Transport-level failure before an HTTP status was obtained
    #[error("AI connection failure: {detail}")]
    Connection { detail: String },

    /// Response body did not have the expected shape
    #[error("Malformed AI response: {detail}")]
    Malformed { detail: String },
}

/// Map an HTTP error status to the sanitized error taxonomy.
///
/// 401/403 (auth), 402 (billing), and every other >=400 status all collapse
/// to generic variants; the raw status and body survive only in `detail`.
pub fn classify_status(status: u16, body: String) -> LlmError {
    match status {
        402 => LlmError::Billing {
            status,
            detail: body,
        },
        _ => LlmError::Unavailable {
            status,
            detail: body,
        },
    }
}

/// Trait for text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one prompt through the model and return the raw completion text
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// HTTP client for a chat-completions-style endpoint
pub struct ChatClient {
    client: reqwest::Client,
    config: AiConfig,
}

impl ChatClient {
    /// Create a new chat client from configuration
    pub fn new(config: AiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                detail: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::NotConfigured)?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(model = %self.config.model, prompt_len = prompt.len(), "Calling chat completion");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| LlmError::Malformed {
                detail: format!("Failed to parse response body: {}", e),
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed {
                detail: "Response contained no choices".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Mock generator for testing: pops canned results in order
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
}

impl MockGenerator {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.responses
            .lock()
            .expect("mock generator lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::Malformed {
                    detail: "Mock generator exhausted".to_string(),
                })
            })
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}
