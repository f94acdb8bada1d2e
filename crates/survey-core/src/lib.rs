//! In-memory domain graph for survey forms.
//!
//! # Modules
//!
//! - [`id`]: identifier newtypes and the per-kind [`IdAllocator`]
//! - [`collection`]: copy-on-write [`IndexedCollection`]
//! - [`map`]: flat key/value representation used by collaborators
//! - [`choice`], [`question`], [`answer`], [`subject`], [`form`]: entities
//! - [`graph`]: [`SurveyGraph`], the root of the graph
//! - [`error`]: [`CoreError`]

pub mod answer;
pub mod choice;
pub mod collection;
pub mod error;
pub mod form;
pub mod graph;
pub mod id;
pub mod map;
pub mod question;
pub mod subject;

// Re-export commonly used types
pub use answer::{Answer, AnswerKind};
pub use choice::Choice;
pub use collection::{Entity, IndexedCollection};
pub use error::CoreError;
pub use form::Form;
pub use graph::SurveyGraph;
pub use id::{Allocators, ChoiceId, EntityKind, FormId, IdAllocator, Identifier, QuestionId, SubjectId};
pub use map::EntityMap;
pub use question::{ClosedMode, Question, QuestionKind, QuestionType};
pub use subject::{Answers, Subject};
