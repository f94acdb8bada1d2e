//! SQLite implementation of [`RowStore`].
//!
//! [`SqliteStore`] keeps one table per row kind (see
//! `migrations/001_initial_schema.sql`). Searches return rows in insertion
//! order; a snapshot replacement runs in a single transaction.

use rusqlite::{params_from_iter, Connection};

use crate::convert::SnapshotRows;
use crate::error::StorageError;
use crate::filter::Filter;
use crate::rows::{ChoiceRow, ClosedAnswerRow, FormRow, OpenedAnswerRow, QuestionRow, Row, SubjectRow};
use crate::traits::RowStore;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }
}

fn select_sql<R: Row>(filter: &Filter) -> String {
    let mut sql = format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::TABLE);
    for (i, (field, _)) in filter.clauses().iter().enumerate() {
        let joiner = if i == 0 { " WHERE " } else { " AND " };
        sql.push_str(&format!("{joiner}{field} = ?{}", i + 1));
    }
    sql.push_str(" ORDER BY rowid");
    sql
}

fn insert_sql<R: Row>() -> String {
    let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        R::TABLE,
        R::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

fn save_row<R: Row>(conn: &Connection, row: &R) -> Result<(), StorageError> {
    let mut stmt = conn.prepare_cached(&insert_sql::<R>())?;
    stmt.execute(params_from_iter(row.to_values()?))?;
    Ok(())
}

fn save_rows<R: Row>(conn: &Connection, rows: &[R]) -> Result<(), StorageError> {
    for row in rows {
        save_row(conn, row)?;
    }
    Ok(())
}

fn delete_rows<R: Row>(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(&format!("DELETE FROM {}", R::TABLE), [])?;
    Ok(())
}

impl RowStore for SqliteStore {
    fn search<R: Row>(&self, filter: &Filter) -> Result<Vec<R>, StorageError> {
        filter.validate::<R>()?;
        let mut stmt = self.conn.prepare_cached(&select_sql::<R>(filter))?;
        let values = filter.clauses().iter().map(|(_, value)| *value);
        let rows = stmt
            .query_map(params_from_iter(values), |row| R::from_sql(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn save<R: Row>(&mut self, row: &R) -> Result<(), StorageError> {
        save_row(&self.conn, row)
    }

    fn remove<R: Row>(&mut self) -> Result<(), StorageError> {
        delete_rows::<R>(&self.conn)
    }

    fn replace_snapshot(&mut self, rows: &SnapshotRows) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;

        delete_rows::<ClosedAnswerRow>(&tx)?;
        delete_rows::<OpenedAnswerRow>(&tx)?;
        delete_rows::<SubjectRow>(&tx)?;
        delete_rows::<ChoiceRow>(&tx)?;
        delete_rows::<QuestionRow>(&tx)?;
        delete_rows::<FormRow>(&tx)?;

        save_rows(&tx, &rows.forms)?;
        save_rows(&tx, &rows.questions)?;
        save_rows(&tx, &rows.choices)?;
        save_rows(&tx, &rows.subjects)?;
        save_rows(&tx, &rows.opened_answers)?;
        save_rows(&tx, &rows.closed_answers)?;

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use survey_core::{FormId, QuestionId, SubjectId};

    fn question(id: u32, form: u32, tag: &str) -> QuestionRow {
        QuestionRow {
            id: QuestionId(id),
            form: FormId(form),
            question_type: tag.into(),
            title: format!("q{id}"),
            word_count: (tag == "opened").then_some(10),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn select_sql_binds_each_clause() {
        let filter = Filter::subject(SubjectId(1)).and("question", 2);
        assert_eq!(
            select_sql::<ClosedAnswerRow>(&filter),
            "SELECT subject, question, choice, modified_at FROM closed_answers \
             WHERE subject = ?1 AND question = ?2 ORDER BY rowid"
        );
    }

    #[test]
    fn rows_roundtrip_through_sqlite() {
        let mut store = SqliteStore::in_memory().unwrap();
        let q = question(1, 1, "opened");
        store.save(&q).unwrap();
        let back: Vec<QuestionRow> = store.search(&Filter::all()).unwrap();
        assert_eq!(back, vec![q]);
    }

    #[test]
    fn search_filters_by_owner() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.save(&question(1, 1, "opened")).unwrap();
        store.save(&question(2, 2, "unique")).unwrap();
        store.save(&question(3, 1, "multiple")).unwrap();

        let rows: Vec<QuestionRow> = store.search(&Filter::form(FormId(1))).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![QuestionId(1), QuestionId(3)]);
    }

    #[test]
    fn save_replaces_by_primary_key() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.save(&question(1, 1, "opened")).unwrap();
        let mut changed = question(1, 1, "unique");
        changed.title = "renamed".into();
        store.save(&changed).unwrap();

        let rows: Vec<QuestionRow> = store.search(&Filter::all()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "renamed");
    }

    #[test]
    fn legacy_pipe_joined_words_are_read() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO opened_answers (subject, question, words, modified_at) \
                 VALUES (1, 2, 'fast|cheap', '2024-01-01T00:00:00Z'), \
                        (1, 3, '[sic]|ok', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        let rows: Vec<OpenedAnswerRow> = store.search(&Filter::all()).unwrap();
        assert_eq!(rows[0].words, vec!["fast", "cheap"]);
        assert_eq!(rows[1].words, vec!["[sic]", "ok"]);
    }
}
