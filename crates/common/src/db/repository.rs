//! Repository pattern for database operations
//!
//! All worker data access goes through `Repository`. The consumer itself
//! depends on the `StudyStore` trait so tests can substitute an in-memory
//! store.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::MAX_FAILURE_MESSAGE_CHARS;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, Set, TransactionTrait,
};
use tracing::{error, info, warn};

/// A question produced by the pipeline, ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// Result of the success-path write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Study updated and questions replaced
    Saved,
    /// The study no longer exists; nothing to update
    StudyMissing,
}

/// Persistence operations the job consumer depends on
#[async_trait]
pub trait StudyStore: Send + Sync {
    /// Transactionally store the summary, flip the study to `ready`, and
    /// replace its question set.
    async fn save_success(
        &self,
        study_id: i32,
        summary: &str,
        questions: &[NewQuestion],
    ) -> Result<SaveOutcome>;

    /// Best-effort failure marking. Never returns an error: a secondary DB
    /// failure here must not take down the consumer loop.
    async fn mark_failed(&self, study_id: i32, message: &str);
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Find study by ID
    pub async fn find_study_by_id(&self, id: i32) -> Result<Option<Study>> {
        StudyEntity::find_by_id(id)
            .one(self.pool.conn())
            .await
            .map_err(Into::into)
    }
}

/// Truncate to a maximum number of characters without splitting a char.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[async_trait]
impl StudyStore for Repository {
    async fn save_success(
        &self,
        study_id: i32,
        summary: &str,
        questions: &[NewQuestion],
    ) -> Result<SaveOutcome> {
        let txn = self.pool.conn().begin().await?;

        let Some(study) = StudyEntity::find_by_id(study_id).one(&txn).await? else {
            return Ok(SaveOutcome::StudyMissing);
        };

        let mut study: StudyActiveModel = study.into();
        study.summary = Set(summary.to_string());
        study.status = Set(String::from(StudyStatus::Ready));
        study.update(&txn).await?;

        // Replace, never append: clears rows from a prior run of the same
        // study before inserting the new set.
        QuestionEntity::delete_many()
            .filter(QuestionColumn::StudyId.eq(study_id))
            .exec(&txn)
            .await?;

        for q in questions {
            let question = QuestionActiveModel {
                id: NotSet,
                study_id: Set(study_id),
                prompt: Set(q.prompt.clone()),
                options_json: Set(serde_json::to_string(&q.options)?),
                correct_answer: Set(q.correct_answer.clone()),
                user_answer: Set(None),
                is_correct: Set(None),
            };
            question.insert(&txn).await?;
        }

        txn.commit().await?;

        info!(study_id, question_count = questions.len(), "Study saved and ready");

        Ok(SaveOutcome::Saved)
    }

    async fn mark_failed(&self, study_id: i32, message: &str) {
        let result: Result<()> = async {
            let Some(study) = self.find_study_by_id(study_id).await? else {
                return Err(AppError::StudyNotFound { id: study_id });
            };

            let mut study: StudyActiveModel = study.into();
            study.summary = Set(format!(
                "Processing failed: {}",
                truncate_chars(message, MAX_FAILURE_MESSAGE_CHARS)
            ));
            study.status = Set(String::from(StudyStatus::Failed));
            study.update(self.pool.conn()).await?;

            Ok(())
        }
        .await;

        match result {
            Ok(()) => warn!(study_id, "Study marked as failed"),
            Err(e) => error!(study_id, error = %e, "Could not record failure in database"),
        }
    }
}
