//! SeaORM entity models
//!
//! Database entities for StudyMill

mod question;
mod study;

pub use study::{
    ActiveModel as StudyActiveModel, Column as StudyColumn, Entity as StudyEntity, Model as Study,
    StudyStatus,
};

pub use question::{
    ActiveModel as QuestionActiveModel, Column as QuestionColumn, Entity as QuestionEntity,
    Model as Question,
};
