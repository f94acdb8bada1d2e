//! The [`RowStore`] trait defining the storage contract for survey rows.
//!
//! A store knows nothing about forms or subjects: it persists flat rows of
//! the kinds in [`crate::rows`] and answers equality searches over them.
//! [`crate::convert`] turns a whole [`SurveyGraph`](survey_core::SurveyGraph)
//! into rows and back.

use crate::convert::SnapshotRows;
use crate::error::StorageError;
use crate::filter::Filter;
use crate::rows::{ChoiceRow, ClosedAnswerRow, FormRow, OpenedAnswerRow, QuestionRow, Row, SubjectRow};

/// The storage contract for survey rows.
///
/// Synchronous and single-threaded; every backend (InMemoryStore,
/// SqliteStore) is swappable behind it.
pub trait RowStore {
    /// All rows of kind `R` matching `filter`, in insertion order.
    fn search<R: Row>(&self, filter: &Filter) -> Result<Vec<R>, StorageError>;

    /// Inserts `row`, replacing any stored row with the same key.
    fn save<R: Row>(&mut self, row: &R) -> Result<(), StorageError>;

    /// Removes every row of kind `R`.
    fn remove<R: Row>(&mut self) -> Result<(), StorageError>;

    /// Removes every row of every kind.
    fn clear(&mut self) -> Result<(), StorageError> {
        self.remove::<ClosedAnswerRow>()?;
        self.remove::<OpenedAnswerRow>()?;
        self.remove::<SubjectRow>()?;
        self.remove::<ChoiceRow>()?;
        self.remove::<QuestionRow>()?;
        self.remove::<FormRow>()
    }

    /// Replaces the whole stored content with `rows`.
    ///
    /// The default clears then saves row by row; backends with
    /// transactions should override it to make the swap atomic.
    fn replace_snapshot(&mut self, rows: &SnapshotRows) -> Result<(), StorageError> {
        self.clear()?;
        for row in &rows.forms {
            self.save(row)?;
        }
        for row in &rows.questions {
            self.save(row)?;
        }
        for row in &rows.choices {
            self.save(row)?;
        }
        for row in &rows.subjects {
            self.save(row)?;
        }
        for row in &rows.opened_answers {
            self.save(row)?;
        }
        for row in &rows.closed_answers {
            self.save(row)?;
        }
        Ok(())
    }
}
