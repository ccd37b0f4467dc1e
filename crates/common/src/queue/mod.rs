//! SQS task queue integration
//!
//! Provides:
//! - SQS client wrapper tuned for one-at-a-time consumption
//! - Task message deserialization and boundary validation
//! - Dead letter queue handling for permanent rejections

use crate::errors::{AppError, Result};
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client as SqsClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// SQS queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue URL
    pub url: String,
    /// Dead letter queue URL for permanently rejected messages (optional)
    pub dlq_url: Option<String>,
    /// Visibility timeout in seconds; must outlast a full job, LLM calls
    /// included, or the broker redelivers mid-flight
    pub visibility_timeout: i32,
    /// Wait time for long polling (seconds)
    pub wait_time_seconds: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            dlq_url: None,
            visibility_timeout: 300,
            wait_time_seconds: 20,
        }
    }
}

/// SQS queue client wrapper
pub struct TaskQueue {
    client: SqsClient,
    config: QueueConfig,
}

impl TaskQueue {
    /// Create a new queue client
    pub async fn new(config: QueueConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);

        Ok(Self { client, config })
    }

    /// Create with existing AWS client
    pub fn with_client(client: SqsClient, config: QueueConfig) -> Self {
        Self { client, config }
    }

    /// Receive at most one message from the queue.
    ///
    /// One message per poll keeps exactly one job in flight per worker
    /// process, which bounds concurrent LLM spend to one call and keeps
    /// partial-failure reasoning simple.
    pub async fn receive_one(&self) -> Result<Option<Message>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.config.url)
            .max_number_of_messages(1)
            .visibility_timeout(self.config.visibility_timeout)
            .wait_time_seconds(self.config.wait_time_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive message: {}", e),
            })?;

        let message = result.messages.unwrap_or_default().into_iter().next();
        debug!(received = message.is_some(), "Polled task queue");

        Ok(message)
    }

    /// Positively acknowledge a delivery
    pub async fn ack(&self, receipt_handle: &str) -> Result<()> {
        self.delete(receipt_handle).await
    }

    /// Permanently reject a delivery: never requeued onto the task queue.
    ///
    /// The raw body is forwarded to the dead letter queue when one is
    /// configured, then the delivery is deleted so the broker cannot retry
    /// billable work that failed deterministically.
    pub async fn reject(&self, message: &Message) -> Result<()> {
        if let (Some(dlq_url), Some(body)) = (&self.config.dlq_url, &message.body) {
            let sent = self
                .client
                .send_message()
                .queue_url(dlq_url)
                .message_body(body)
                .send()
                .await;

            if let Err(e) = sent {
                warn!(error = %e, "Failed to forward rejected message to DLQ");
            }
        }

        if let Some(receipt) = &message.receipt_handle {
            self.delete(receipt).await?;
        }

        Ok(())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }
}

/// Raw study task payload as published by the front end.
///
/// Older publishers used `file_path` where newer ones send `filename`; both
/// are accepted. Field names are part of the wire contract and stay in the
/// publisher's language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStudyTask {
    #[serde(default)]
    pub estudo_id: Option<i32>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// A validated study task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyTask {
    pub study_id: i32,
    pub source_reference: String,
}

impl RawStudyTask {
    /// Parse a message body into a raw task
    pub fn from_body(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(Into::into)
    }

    /// Validate required fields once at the boundary.
    ///
    /// A message without a positive study id or a non-empty source reference
    /// can never become valid on retry.
    pub fn validate(self) -> Result<StudyTask> {
        let study_id = match self.estudo_id {
            Some(id) if id > 0 => id,
            _ => {
                return Err(AppError::MissingField {
                    field: "estudo_id".to_string(),
                })
            }
        };

        let source_reference = self
            .filename
            .or(self.file_path)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::MissingField {
                field: "filename".to_string(),
            })?;

        Ok(StudyTask {
            study_id,
            source_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_task() {
        let task = RawStudyTask::from_body(r#"{"estudo_id": 7, "filename": "doc.pdf"}"#)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(task.study_id, 7);
        assert_eq!(task.source_reference, "doc.pdf");
    }

    #[test]
    fn test_legacy_file_path_field() {
        let task = RawStudyTask::from_body(r#"{"estudo_id": 7, "file_path": "old/doc.txt"}"#)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(task.source_reference, "old/doc.txt");
    }

    #[test]
    fn test_filename_wins_over_file_path() {
        let raw = RawStudyTask {
            estudo_id: Some(1),
            filename: Some("new.txt".into()),
            file_path: Some("old.txt".into()),
        };
        assert_eq!(raw.validate().unwrap().source_reference, "new.txt");
    }

    #[test]
    fn test_missing_id_rejected() {
        let err = RawStudyTask::from_body(r#"{"filename": "doc.pdf"}"#)
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[test]
    fn test_zero_id_rejected() {
        let raw = RawStudyTask {
            estudo_id: Some(0),
            filename: Some("doc.pdf".into()),
            file_path: None,
        };
        assert!(raw.validate().is_err());
    }

    #[test]
    fn test_blank_filename_rejected() {
        let raw = RawStudyTask {
            estudo_id: Some(3),
            filename: Some("   ".into()),
            file_path: None,
        };
        assert!(raw.validate().is_err());
    }

    #[test]
    fn test_garbage_body_is_permanent() {
        let err = RawStudyTask::from_body("not json").unwrap_err();
        assert!(err.is_permanent());
    }
}
