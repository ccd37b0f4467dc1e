//! StudyMill Worker
//!
//! Processes study-generation jobs from the task queue:
//! 1. Receives a study task from the queue
//! 2. Fetches and loads the source document
//! 3. Generates a summary and quiz via the LLM pipeline
//! 4. Persists results transactionally and answers the broker

mod chunker;
mod consumer;
mod docx;
mod errors;
mod fetch;
mod loader;
mod pdf;
mod pipeline;

use crate::consumer::{Disposition, JobConsumer};
use crate::fetch::{LocalUploads, RemoteBlobs, SourceFetcher};
use crate::pipeline::StudyPipeline;
use anyhow::Context;
use std::sync::Arc;
use studymill_common::{
    config::{AppConfig, StorageMode},
    db::{DbPool, Repository},
    llm::ChatClient,
    queue::{QueueConfig, TaskQueue},
    VERSION,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting StudyMill Worker v{}", VERSION);

    // Database connectivity is checked at boot; a worker that cannot
    // persist results must not consume billable jobs.
    let db = DbPool::new(&config.database).await?;
    db.ping().await.context("Database ping failed")?;

    let store = Arc::new(Repository::new(db));

    let generator = Arc::new(ChatClient::new(config.ai.clone()).context("AI client init failed")?);
    info!(model = %config.ai.model, "AI client initialized");

    let fetcher: Arc<dyn SourceFetcher> = match config.storage.mode {
        StorageMode::Local => {
            info!(upload_dir = %config.storage.upload_dir, "Using local upload directory");
            Arc::new(LocalUploads::new(config.storage.upload_dir.clone()))
        }
        StorageMode::Remote => {
            let base_url = config
                .storage
                .remote_base_url
                .clone()
                .context("storage.remote_base_url is required in remote mode")?;
            info!(base_url = %base_url, "Using remote blob store");
            Arc::new(RemoteBlobs::new(
                base_url,
                config.storage.remote_token.clone(),
                std::env::temp_dir().join("studymill-downloads"),
            ))
        }
    };

    let pipeline = StudyPipeline::new(generator, config.pipeline.clone());
    let consumer = JobConsumer::new(store, fetcher, pipeline);

    let queue_url = config
        .queue
        .task_queue_url
        .clone()
        .context("queue.task_queue_url is required")?;

    info!(url = %queue_url, "Connecting to task queue...");
    let queue = TaskQueue::new(QueueConfig {
        url: queue_url,
        dlq_url: config.queue.dlq_url.clone(),
        visibility_timeout: config.queue.visibility_timeout_secs as i32,
        wait_time_seconds: config.queue.poll_timeout_secs as i32,
    })
    .await?;

    info!("Worker ready, starting queue polling...");

    let mut receive_failures: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            result = queue.receive_one() => {
                let message = match result {
                    Ok(Some(message)) => {
                        receive_failures = 0;
                        message
                    }
                    Ok(None) => {
                        receive_failures = 0;
                        continue;
                    }
                    Err(e) => {
                        receive_failures += 1;
                        let backoff = std::time::Duration::from_secs(
                            (receive_failures * 2).min(30),
                        );
                        error!(
                            error = %e,
                            failures = receive_failures,
                            backoff_secs = backoff.as_secs(),
                            "Failed to receive from queue"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                };

                let body = message.body.as_deref().unwrap_or_default();
                let outcome = consumer.handle(body).await;

                // The broker is answered before source files are removed;
                // a leaked file is recoverable, a lost answer is not.
                match outcome.disposition {
                    Disposition::Ack => {
                        if let Some(receipt) = &message.receipt_handle {
                            if let Err(e) = queue.ack(receipt).await {
                                error!(error = %e, "Failed to ack message");
                            }
                        }
                    }
                    Disposition::Reject => {
                        if let Err(e) = queue.reject(&message).await {
                            error!(error = %e, "Failed to reject message");
                        }
                    }
                }

                if let Some(path) = outcome.cleanup {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!(path = %path.display(), error = %e, "Failed to remove source file");
                    }
                }
            }
        }
    }

    info!("Worker shutting down");
    Ok(())
}
