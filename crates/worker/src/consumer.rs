//! Job consumer
//!
//! Drives one delivery through validate -> fetch -> load -> pipeline ->
//! persist and decides how the broker should be answered. Two invariants
//! rule this module:
//!
//! - Every failure path ends in a permanent rejection, never a requeue: the
//!   LLM work is billable and the failures are deterministic.
//! - On success the database commit happens before the broker is acked.
//!   Acking first would let a crash leave the broker believing in work the
//!   database never saw.
//!
//! No error crosses the job boundary: the caller always gets a `JobOutcome`.

use crate::fetch::{Retention, SourceFetcher};
use crate::loader::load_document;
use crate::pipeline::{PipelineResult, StudyPipeline};
use std::path::PathBuf;
use std::sync::Arc;
use studymill_common::db::{SaveOutcome, StudyStore};
use studymill_common::queue::RawStudyTask;
use tracing::{error, info, instrument, warn};

/// How the broker should be answered for a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Positive acknowledgment: the job reached a committed terminal state
    Ack,
    /// Permanent rejection, no requeue
    Reject,
}

/// Result of handling one delivery
#[derive(Debug)]
pub struct JobOutcome {
    pub disposition: Disposition,
    /// Source file to delete once the broker has been answered
    pub cleanup: Option<PathBuf>,
}

impl JobOutcome {
    fn ack(cleanup: Option<PathBuf>) -> Self {
        Self {
            disposition: Disposition::Ack,
            cleanup,
        }
    }

    fn reject(cleanup: Option<PathBuf>) -> Self {
        Self {
            disposition: Disposition::Reject,
            cleanup,
        }
    }
}

/// The consumer core, parameterized over its collaborators so tests can
/// substitute in-memory implementations.
pub struct JobConsumer {
    store: Arc<dyn StudyStore>,
    fetcher: Arc<dyn SourceFetcher>,
    pipeline: StudyPipeline,
}

impl JobConsumer {
    pub fn new(
        store: Arc<dyn StudyStore>,
        fetcher: Arc<dyn SourceFetcher>,
        pipeline: StudyPipeline,
    ) -> Self {
        Self {
            store,
            fetcher,
            pipeline,
        }
    }

    /// Handle one raw delivery body.
    #[instrument(skip(self, body))]
    pub async fn handle(&self, body: &str) -> JobOutcome {
        // Boundary validation. A payload missing its study id or source
        // reference can never become valid, and without a study id there is
        // no row to mark failed: reject with no database write.
        let task = match RawStudyTask::from_body(body).and_then(RawStudyTask::validate) {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, "Rejecting invalid task payload");
                return JobOutcome::reject(None);
            }
        };

        let study_id = task.study_id;
        info!(study_id, source = %task.source_reference, "Task received");

        let document = match self.fetcher.fetch(&task.source_reference).await {
            Ok(document) => document,
            Err(e) => {
                error!(study_id, error = %e, "Source fetch failed");
                self.store.mark_failed(study_id, &e.user_message()).await;
                return JobOutcome::reject(None);
            }
        };

        // Scratch copies are removed however the job ends; a shared upload
        // is removed only after a successful run, so a failed study's
        // source survives for inspection or manual replay.
        let scratch =
            (document.retention == Retention::Scratch).then(|| document.path.clone());

        let text = match load_document(&document.path) {
            Ok(text) => text,
            Err(e) => {
                error!(study_id, error = %e, "Document load failed");
                self.store.mark_failed(study_id, &e.user_message()).await;
                return JobOutcome::reject(scratch);
            }
        };

        let title = document
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "AI-generated study".to_string());

        match self.pipeline.process(&text, &title).await {
            PipelineResult::Completed { summary, quiz, .. } => {
                match self.store.save_success(study_id, &summary, &quiz).await {
                    Ok(SaveOutcome::Saved) => {
                        info!(study_id, "Task finished, study ready");
                        JobOutcome::ack(Some(document.path))
                    }
                    Ok(SaveOutcome::StudyMissing) => {
                        // The study was deleted while we worked. Nothing
                        // left to update; the delivery is still done.
                        warn!(study_id, "Study vanished before persistence, acking anyway");
                        JobOutcome::ack(Some(document.path))
                    }
                    Err(e) => {
                        error!(study_id, error = %e, "Persistence failed on the success path");
                        self.store
                            .mark_failed(study_id, "An internal error occurred while saving results.")
                            .await;
                        JobOutcome::reject(scratch)
                    }
                }
            }
            PipelineResult::Failed { error } => {
                error!(study_id, error = %error, "Pipeline failed");
                self.store.mark_failed(study_id, &error.user_message()).await;
                JobOutcome::reject(scratch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProcessError;
    use crate::fetch::{FetchedDocument, LocalUploads};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use studymill_common::config::PipelineSettings;
    use studymill_common::db::NewQuestion;
    use studymill_common::errors::{AppError, Result};
    use studymill_common::llm::{LlmError, MockGenerator};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct StoredStudy {
        status: String,
        summary: String,
    }

    /// In-memory study store mirroring the repository contract
    #[derive(Default)]
    struct MemoryStore {
        studies: Mutex<HashMap<i32, StoredStudy>>,
        questions: Mutex<HashMap<i32, Vec<NewQuestion>>>,
        fail_saves: AtomicBool,
    }

    impl MemoryStore {
        fn with_study(id: i32) -> Self {
            let store = Self::default();
            store.studies.lock().unwrap().insert(
                id,
                StoredStudy {
                    status: "processing".to_string(),
                    summary: String::new(),
                },
            );
            store
        }

        fn study(&self, id: i32) -> Option<StoredStudy> {
            self.studies.lock().unwrap().get(&id).cloned()
        }

        fn questions(&self, id: i32) -> Vec<NewQuestion> {
            self.questions
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .unwrap_or_default()
        }

        fn is_empty(&self) -> bool {
            self.studies.lock().unwrap().is_empty() && self.questions.lock().unwrap().is_empty()
        }
    }

    #[async_trait]
    impl StudyStore for MemoryStore {
        async fn save_success(
            &self,
            study_id: i32,
            summary: &str,
            questions: &[NewQuestion],
        ) -> Result<SaveOutcome> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(AppError::DatabaseConnection {
                    message: "connection reset".to_string(),
                });
            }

            let mut studies = self.studies.lock().unwrap();
            let Some(study) = studies.get_mut(&study_id) else {
                return Ok(SaveOutcome::StudyMissing);
            };

            study.status = "ready".to_string();
            study.summary = summary.to_string();
            self.questions
                .lock()
                .unwrap()
                .insert(study_id, questions.to_vec());

            Ok(SaveOutcome::Saved)
        }

        async fn mark_failed(&self, study_id: i32, message: &str) {
            if let Some(study) = self.studies.lock().unwrap().get_mut(&study_id) {
                study.status = "failed".to_string();
                study.summary = format!("Processing failed: {}", message);
            }
        }
    }

    /// Fetcher that always fails, for source-error tests
    struct BrokenFetcher;

    #[async_trait]
    impl SourceFetcher for BrokenFetcher {
        async fn fetch(&self, reference: &str) -> std::result::Result<FetchedDocument, ProcessError>
        {
            Err(ProcessError::SourceUnavailable {
                reference: reference.to_string(),
                detail: "gone".to_string(),
            })
        }
    }

    fn quiz_json(run: u32) -> String {
        let questions: Vec<String> = (0..5)
            .map(|i| {
                format!(
                    r#"{{"pergunta": "Run {run} question {i}?", "opcoes": ["a{i}", "b{i}", "c{i}", "d{i}"], "resposta_correta": "a{i}"}}"#
                )
            })
            .collect();
        format!(r#"{{"questoes": [{}]}}"#, questions.join(","))
    }

    fn upload_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("studymill-consumer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("doc.txt"), "The borrow checker enforces aliasing rules.")
            .unwrap();
        dir
    }

    fn consumer_with(
        store: Arc<MemoryStore>,
        responses: Vec<std::result::Result<String, LlmError>>,
    ) -> JobConsumer {
        let generator = Arc::new(MockGenerator::new(responses));
        let pipeline = StudyPipeline::new(generator, PipelineSettings::default());
        JobConsumer::new(store, Arc::new(LocalUploads::new(upload_dir())), pipeline)
    }

    const BODY: &str = r#"{"estudo_id": 1, "filename": "doc.txt"}"#;

    #[tokio::test]
    async fn test_happy_path_commits_then_acks() {
        let store = Arc::new(MemoryStore::with_study(1));
        let consumer = consumer_with(
            store.clone(),
            vec![Ok("A summary.".to_string()), Ok(quiz_json(1))],
        );

        let outcome = consumer.handle(BODY).await;

        assert_eq!(outcome.disposition, Disposition::Ack);
        // The consumed upload is scheduled for removal after the ack
        assert!(outcome.cleanup.as_deref().is_some_and(|p| p.ends_with("doc.txt")));
        let study = store.study(1).unwrap();
        assert_eq!(study.status, "ready");
        assert_eq!(study.summary, "A summary.");
        let questions = store.questions(1);
        assert_eq!(questions.len(), 5);
        for q in &questions {
            assert_eq!(q.options.len(), 4);
            assert!(q.options.contains(&q.correct_answer));
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected_without_db_write() {
        let store = Arc::new(MemoryStore::default());
        let consumer = consumer_with(store.clone(), vec![]);

        for body in [
            r#"{"filename": "doc.txt"}"#,
            r#"{"estudo_id": 1}"#,
            r#"{"estudo_id": 0, "filename": "doc.txt"}"#,
            "not json at all",
        ] {
            let outcome = consumer.handle(body).await;
            assert_eq!(outcome.disposition, Disposition::Reject, "body: {}", body);
        }

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_marks_failed_and_rejects() {
        let store = Arc::new(MemoryStore::with_study(1));
        let generator = Arc::new(MockGenerator::new(vec![]));
        let pipeline = StudyPipeline::new(generator, PipelineSettings::default());
        let consumer = JobConsumer::new(store.clone(), Arc::new(BrokenFetcher), pipeline);

        let outcome = consumer.handle(BODY).await;

        assert_eq!(outcome.disposition, Disposition::Reject);
        let study = store.study(1).unwrap();
        assert_eq!(study.status, "failed");
        assert!(!study.summary.is_empty());
        assert!(store.questions(1).is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extension_marks_failed() {
        let dir = upload_dir();
        std::fs::write(dir.join("slides.pptx"), "binary-ish").unwrap();

        let store = Arc::new(MemoryStore::with_study(1));
        let consumer = consumer_with(store.clone(), vec![]);

        let outcome = consumer
            .handle(r#"{"estudo_id": 1, "filename": "slides.pptx"}"#)
            .await;

        assert_eq!(outcome.disposition, Disposition::Reject);
        let study = store.study(1).unwrap();
        assert_eq!(study.status, "failed");
        assert!(study.summary.contains("Unsupported file format"));
    }

    #[tokio::test]
    async fn test_auth_failure_is_sanitized_in_study_row() {
        let store = Arc::new(MemoryStore::with_study(1));
        let consumer = consumer_with(
            store.clone(),
            vec![Err(LlmError::Unavailable {
                status: 401,
                detail: "401 Unauthorized: invalid key".to_string(),
            })],
        );

        let outcome = consumer.handle(BODY).await;

        assert_eq!(outcome.disposition, Disposition::Reject);
        let study = store.study(1).unwrap();
        assert_eq!(study.status, "failed");
        assert!(!study.summary.contains("401"));
        assert!(!study.summary.contains("invalid key"));
    }

    #[tokio::test]
    async fn test_malformed_quiz_persists_no_questions() {
        let store = Arc::new(MemoryStore::with_study(1));
        let bad_quiz = r#"{"questoes": [{"pergunta": "only one", "opcoes": ["a","b","c","d"], "resposta_correta": "a"}]}"#;
        let consumer = consumer_with(
            store.clone(),
            vec![Ok("summary".to_string()), Ok(bad_quiz.to_string())],
        );

        let outcome = consumer.handle(BODY).await;

        assert_eq!(outcome.disposition, Disposition::Reject);
        assert_eq!(store.study(1).unwrap().status, "failed");
        assert!(store.questions(1).is_empty());
    }

    #[tokio::test]
    async fn test_reprocessing_replaces_question_set() {
        let store = Arc::new(MemoryStore::with_study(1));
        let consumer = consumer_with(
            store.clone(),
            vec![
                Ok("first summary".to_string()),
                Ok(quiz_json(1)),
                Ok("second summary".to_string()),
                Ok(quiz_json(2)),
            ],
        );

        assert_eq!(consumer.handle(BODY).await.disposition, Disposition::Ack);
        assert_eq!(consumer.handle(BODY).await.disposition, Disposition::Ack);

        let study = store.study(1).unwrap();
        assert_eq!(study.summary, "second summary");

        let questions = store.questions(1);
        assert_eq!(questions.len(), 5);
        // Only the second run's questions survive
        for q in &questions {
            assert!(q.prompt.starts_with("Run 2"));
        }
    }

    #[tokio::test]
    async fn test_failed_job_keeps_shared_upload() {
        // A shared upload is only removed after a successful run; a failed
        // study keeps its source for inspection or manual replay.
        let store = Arc::new(MemoryStore::with_study(1));
        let consumer = consumer_with(
            store.clone(),
            vec![Err(LlmError::Connection {
                detail: "timed out".to_string(),
            })],
        );

        let outcome = consumer.handle(BODY).await;

        assert_eq!(outcome.disposition, Disposition::Reject);
        assert!(outcome.cleanup.is_none());
    }

    #[tokio::test]
    async fn test_study_missing_is_acked_as_noop() {
        let store = Arc::new(MemoryStore::default());
        let consumer = consumer_with(
            store.clone(),
            vec![Ok("summary".to_string()), Ok(quiz_json(1))],
        );

        let outcome = consumer.handle(BODY).await;

        assert_eq!(outcome.disposition, Disposition::Ack);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_marks_failed_and_rejects() {
        let store = Arc::new(MemoryStore::with_study(1));
        store.fail_saves.store(true, Ordering::SeqCst);
        let consumer = consumer_with(
            store.clone(),
            vec![Ok("summary".to_string()), Ok(quiz_json(1))],
        );

        let outcome = consumer.handle(BODY).await;

        assert_eq!(outcome.disposition, Disposition::Reject);
        assert_eq!(store.study(1).unwrap().status, "failed");
    }

    #[tokio::test]
    async fn test_redelivery_after_success_converges() {
        // Simulates a crash between commit and ack: the broker redelivers a
        // job whose study is already ready. Reprocessing must converge to a
        // single, current question set.
        let store = Arc::new(MemoryStore::with_study(1));
        let consumer = consumer_with(
            store.clone(),
            vec![
                Ok("summary".to_string()),
                Ok(quiz_json(7)),
                Ok("summary".to_string()),
                Ok(quiz_json(7)),
            ],
        );

        assert_eq!(consumer.handle(BODY).await.disposition, Disposition::Ack);
        let first = store.questions(1);

        assert_eq!(consumer.handle(BODY).await.disposition, Disposition::Ack);
        let second = store.questions(1);

        assert_eq!(first, second);
        assert_eq!(second.len(), 5);
        assert_eq!(store.study(1).unwrap().status, "ready");
    }
}
