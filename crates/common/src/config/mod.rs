//! Configuration management for StudyMill services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/<env>, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Task queue configuration (SQS)
    pub queue: QueueSettings,

    /// LLM service configuration
    pub ai: AiConfig,

    /// Document source configuration
    pub storage: StorageConfig,

    /// Pipeline tuning knobs
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Connection URL with the scheme normalized for the driver.
    ///
    /// Some hosting platforms hand out `postgres://` URLs; the driver stack
    /// expects `postgresql://`.
    pub fn normalized_url(&self) -> String {
        if let Some(rest) = self.url.strip_prefix("postgres://") {
            format!("postgresql://{}", rest)
        } else {
            self.url.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSettings {
    /// SQS task queue URL
    pub task_queue_url: Option<String>,

    /// Dead letter queue URL for permanently rejected messages
    pub dlq_url: Option<String>,

    /// Long polling timeout in seconds
    #[serde(default = "default_queue_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Visibility timeout in seconds; must cover a full LLM round trip
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    /// API key for the chat-completions service
    pub api_key: Option<String>,

    /// Chat-completions endpoint
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    /// Model to use
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_ai_temperature")]
    pub temperature: f32,

    /// Maximum output tokens per call
    #[serde(default = "default_ai_max_tokens")]
    pub max_tokens: u32,

    /// Connect timeout in seconds
    #[serde(default = "default_ai_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

/// Where job source documents are fetched from
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Shared upload directory on local disk
    Local,
    /// Remote blob store reached over HTTP
    Remote,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Fetch strategy
    #[serde(default = "default_storage_mode")]
    pub mode: StorageMode,

    /// Upload directory for local mode
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Base URL of the blob store for remote mode
    pub remote_base_url: Option<String>,

    /// Bearer token for the blob store, if it requires one
    pub remote_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Raw-text fallback length when chunking yields nothing
    #[serde(default = "default_context_fallback")]
    pub context_fallback_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            context_fallback_chars: default_context_fallback(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

// Default value functions
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    300
}
fn default_queue_poll_timeout() -> u64 {
    20
}
fn default_visibility_timeout() -> u64 {
    300
}
fn default_ai_endpoint() -> String {
    "https://api.deepseek.com/v1/chat/completions".to_string()
}
fn default_ai_model() -> String {
    "deepseek-chat".to_string()
}
fn default_ai_temperature() -> f32 {
    0.7
}
fn default_ai_max_tokens() -> u32 {
    8000
}
fn default_ai_connect_timeout() -> u64 {
    10
}
fn default_ai_timeout() -> u64 {
    120
}
fn default_storage_mode() -> StorageMode {
    StorageMode::Local
}
fn default_upload_dir() -> String {
    "app/static/uploads".to_string()
}
fn default_chunk_size() -> usize {
    4000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_context_fallback() -> usize {
    8000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__DATABASE__URL=postgresql://...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the LLM read timeout as Duration
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai.timeout_secs)
    }

    /// Get the LLM connect timeout as Duration
    pub fn ai_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ai.connect_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/studymill".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            queue: QueueSettings {
                task_queue_url: None,
                dlq_url: None,
                poll_timeout_secs: default_queue_poll_timeout(),
                visibility_timeout_secs: default_visibility_timeout(),
            },
            ai: AiConfig {
                api_key: None,
                endpoint: default_ai_endpoint(),
                model: default_ai_model(),
                temperature: default_ai_temperature(),
                max_tokens: default_ai_max_tokens(),
                connect_timeout_secs: default_ai_connect_timeout(),
                timeout_secs: default_ai_timeout(),
            },
            storage: StorageConfig {
                mode: default_storage_mode(),
                upload_dir: default_upload_dir(),
                remote_base_url: None,
                remote_token: None,
            },
            pipeline: PipelineSettings::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
