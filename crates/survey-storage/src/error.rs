//! Storage error types for survey-storage.
//!
//! [`StorageError`] covers all anticipated failure modes in the storage
//! layer: SQLite and serialization failures, malformed filters, and
//! reconstruction failures surfaced by the core entity types.

use survey_core::CoreError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQLite backend reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A schema migration could not be applied.
    #[error("migration error: {0}")]
    Migration(String),

    /// A filter names a field the row kind cannot be filtered by.
    #[error("invalid filter: table '{table}' has no filterable field '{field}'")]
    InvalidFilter { table: &'static str, field: String },

    /// A stored row could not be turned back into a graph entity.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StorageError {
    /// Returns true for a stored row that failed entity validation (for
    /// example an unrecognized question type tag).
    pub fn is_invalid_entity(&self) -> bool {
        matches!(self, StorageError::Core(CoreError::InvalidEntity { .. }))
    }
}
