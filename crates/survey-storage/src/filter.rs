//! Equality filters for [`RowStore::search`](crate::traits::RowStore::search).

use survey_core::{FormId, Identifier, QuestionId, SubjectId};

use crate::error::StorageError;
use crate::rows::Row;

/// A conjunction of `field = value` constraints on integer columns.
///
/// The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<(String, i64)>,
}

impl Filter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds a `field = value` constraint.
    pub fn and(mut self, field: impl Into<String>, value: i64) -> Self {
        self.clauses.push((field.into(), value));
        self
    }

    /// Adds a `field = id` constraint.
    pub fn and_id<I: Identifier>(self, field: impl Into<String>, id: I) -> Self {
        self.and(field, i64::from(id.raw()))
    }

    /// Rows owned by `form`.
    pub fn form(form: FormId) -> Self {
        Self::all().and_id("form", form)
    }

    /// Rows owned by `question`.
    pub fn question(question: QuestionId) -> Self {
        Self::all().and_id("question", question)
    }

    /// Rows owned by `subject`.
    pub fn subject(subject: SubjectId) -> Self {
        Self::all().and_id("subject", subject)
    }

    pub fn clauses(&self) -> &[(String, i64)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Fails with [`StorageError::InvalidFilter`] if a clause names a field
    /// `R` cannot be filtered by.
    pub fn validate<R: Row>(&self) -> Result<(), StorageError> {
        match self
            .clauses
            .iter()
            .find(|(field, _)| !R::FILTERABLE.contains(&field.as_str()))
        {
            Some((field, _)) => Err(StorageError::InvalidFilter {
                table: R::TABLE,
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Returns true if `row` satisfies every clause.
    pub fn matches<R: Row>(&self, row: &R) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| row.field(field) == Some(*value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::{ClosedAnswerRow, QuestionRow};
    use chrono::Utc;
    use survey_core::ChoiceId;

    #[test]
    fn empty_filter_matches_everything() {
        let row = ClosedAnswerRow {
            subject: SubjectId(1),
            question: QuestionId(2),
            choice: ChoiceId(3),
            modified_at: Utc::now(),
        };
        assert!(Filter::all().matches(&row));
        assert!(Filter::subject(SubjectId(1)).matches(&row));
        assert!(!Filter::subject(SubjectId(2)).matches(&row));
        assert!(Filter::subject(SubjectId(1))
            .and_id("choice", ChoiceId(3))
            .matches(&row));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Filter::form(FormId(1)).validate::<QuestionRow>().is_ok());
        let err = Filter::subject(SubjectId(1))
            .validate::<QuestionRow>()
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidFilter { table: "questions", .. }));
    }
}
