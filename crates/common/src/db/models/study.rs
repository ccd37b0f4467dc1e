//! Study entity
//!
//! One user-submitted document and its derived study material.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Study status enum
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyStatus {
    Processing,
    Ready,
    Failed,
}

impl From<String> for StudyStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ready" => StudyStatus::Ready,
            "failed" => StudyStatus::Failed,
            _ => StudyStatus::Processing,
        }
    }
}

impl From<StudyStatus> for String {
    fn from(status: StudyStatus) -> Self {
        match status {
            StudyStatus::Processing => "processing".to_string(),
            StudyStatus::Ready => "ready".to_string(),
            StudyStatus::Failed => "failed".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "studies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Foreign key to the user table; the user entity is owned by the
    /// front-end application, not by the worker.
    pub owner_id: i32,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Empty until processing completes; on failure holds the sanitized
    /// error message.
    #[sea_orm(column_type = "Text")]
    pub summary: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text", nullable)]
    pub source_file: Option<String>,
}

impl Model {
    /// Get the study status as an enum
    pub fn study_status(&self) -> StudyStatus {
        StudyStatus::from(self.status.clone())
    }

    /// Check if the study is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.study_status(),
            StudyStatus::Ready | StudyStatus::Failed
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::question::Entity", on_delete = "Cascade")]
    Questions,
}

impl Related<super::question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Questions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [StudyStatus::Processing, StudyStatus::Ready, StudyStatus::Failed] {
            let s = String::from(status.clone());
            assert_eq!(StudyStatus::from(s), status);
        }
    }

    #[test]
    fn test_unknown_status_defaults_to_processing() {
        assert_eq!(
            StudyStatus::from("garbage".to_string()),
            StudyStatus::Processing
        );
    }
}
