//! Persistence for survey graphs.
//!
//! Provides the [`RowStore`] trait defining the storage contract over flat
//! rows, with [`InMemoryStore`] and [`SqliteStore`] as backends, and the
//! [`convert`] functions that move a whole [`SurveyGraph`](survey_core::SurveyGraph)
//! in and out of a store.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`rows`]: one row struct per table
//! - [`filter`]: equality filters for searches
//! - [`traits`]: RowStore trait definition
//! - [`convert`]: snapshot load/save and graph decomposition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation

pub mod convert;
pub mod error;
pub mod filter;
pub mod memory;
pub mod rows;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use convert::{decompose, load_snapshot, save_snapshot, SnapshotRows};
pub use error::StorageError;
pub use filter::Filter;
pub use memory::InMemoryStore;
pub use rows::{ChoiceRow, ClosedAnswerRow, FormRow, OpenedAnswerRow, QuestionRow, Row, SubjectRow};
pub use sqlite::SqliteStore;
pub use traits::RowStore;
