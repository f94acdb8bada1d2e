//! In-memory implementation of [`RowStore`].
//!
//! Rows are kept as JSON values per table, keyed by primary key in
//! insertion order. Nothing survives the process; used in tests and by
//! `DataService::in_memory`.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::StorageError;
use crate::filter::Filter;
use crate::rows::{Row, RowKey};
use crate::traits::RowStore;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: HashMap<&'static str, IndexMap<RowKey, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows of kind `R`.
    pub fn row_count<R: Row>(&self) -> usize {
        self.tables.get(R::TABLE).map_or(0, IndexMap::len)
    }
}

impl RowStore for InMemoryStore {
    fn search<R: Row>(&self, filter: &Filter) -> Result<Vec<R>, StorageError> {
        filter.validate::<R>()?;
        let Some(table) = self.tables.get(R::TABLE) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for value in table.values() {
            let row: R = serde_json::from_value(value.clone())?;
            if filter.matches(&row) {
                found.push(row);
            }
        }
        Ok(found)
    }

    fn save<R: Row>(&mut self, row: &R) -> Result<(), StorageError> {
        let value = serde_json::to_value(row)?;
        self.tables
            .entry(R::TABLE)
            .or_default()
            .insert(row.key(), value);
        Ok(())
    }

    fn remove<R: Row>(&mut self) -> Result<(), StorageError> {
        self.tables.remove(R::TABLE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::{ChoiceRow, FormRow};
    use chrono::Utc;
    use survey_core::{ChoiceId, FormId, QuestionId};

    fn choice(id: u32, question: u32, label: &str) -> ChoiceRow {
        ChoiceRow {
            id: ChoiceId(id),
            question: QuestionId(question),
            label: label.into(),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn search_filters_and_keeps_insertion_order() {
        let mut store = InMemoryStore::new();
        store.save(&choice(3, 1, "c")).unwrap();
        store.save(&choice(1, 1, "a")).unwrap();
        store.save(&choice(2, 2, "b")).unwrap();

        let rows: Vec<ChoiceRow> = store.search(&Filter::question(QuestionId(1))).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![ChoiceId(3), ChoiceId(1)]);
    }

    #[test]
    fn save_replaces_rows_with_the_same_key() {
        let mut store = InMemoryStore::new();
        store.save(&choice(1, 1, "old")).unwrap();
        store.save(&choice(1, 1, "new")).unwrap();
        let rows: Vec<ChoiceRow> = store.search(&Filter::all()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "new");
    }

    #[test]
    fn remove_clears_one_kind_only() {
        let mut store = InMemoryStore::new();
        store.save(&choice(1, 1, "a")).unwrap();
        store
            .save(&FormRow {
                id: FormId(1),
                name: "f".into(),
                description: String::new(),
                created_at: Utc::now(),
                modified_at: Utc::now(),
            })
            .unwrap();
        store.remove::<ChoiceRow>().unwrap();
        assert_eq!(store.row_count::<ChoiceRow>(), 0);
        assert_eq!(store.row_count::<FormRow>(), 1);
    }

    #[test]
    fn invalid_filter_is_an_error() {
        let store = InMemoryStore::new();
        let result = store.search::<FormRow>(&Filter::subject(survey_core::SubjectId(1)));
        assert!(matches!(result, Err(StorageError::InvalidFilter { .. })));
    }
}
