//! Question entity
//!
//! Multiple-choice question attached to a study. The option list is stored
//! as a JSON array in a text column; questions are fully replaced on each
//! reprocessing of their parent study.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "questions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub study_id: i32,

    #[sea_orm(column_type = "Text")]
    pub prompt: String,

    /// JSON array of exactly 4 answer options
    #[sea_orm(column_type = "Text")]
    pub options_json: String,

    #[sea_orm(column_type = "Text")]
    pub correct_answer: String,

    /// Filled in by the front end when the user answers
    #[sea_orm(column_type = "Text", nullable)]
    pub user_answer: Option<String>,

    pub is_correct: Option<bool>,
}

impl Model {
    /// Decode the stored option list; a corrupt column yields an empty list
    /// rather than an error.
    pub fn options(&self) -> Vec<String> {
        serde_json::from_str(&self.options_json).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::study::Entity",
        from = "Column::StudyId",
        to = "super::study::Column::Id"
    )]
    Study,
}

impl Related<super::study::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Study.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options_json: &str) -> Model {
        Model {
            id: 1,
            study_id: 1,
            prompt: "What is ownership?".to_string(),
            options_json: options_json.to_string(),
            correct_answer: "a".to_string(),
            user_answer: None,
            is_correct: None,
        }
    }

    #[test]
    fn test_options_decoding() {
        let q = question(r#"["a","b","c","d"]"#);
        assert_eq!(q.options(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_corrupt_options_yield_empty() {
        let q = question("not json");
        assert!(q.options().is_empty());
    }
}
