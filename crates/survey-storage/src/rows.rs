//! Flat row types persisted by a [`RowStore`](crate::traits::RowStore).
//!
//! One row kind per table. Entity ids are stored as integers, the question
//! variant as its type tag, and timestamps as RFC 3339 text. Answer rows
//! carry the owning subject's modification time.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use survey_core::{ChoiceId, FormId, Identifier, QuestionId, SubjectId};

use crate::error::StorageError;

/// Primary key of a row, one integer per key column.
pub type RowKey = Vec<i64>;

/// A persisted row kind.
pub trait Row: Serialize + DeserializeOwned + Clone + fmt::Debug {
    /// Table the rows live in.
    const TABLE: &'static str;
    /// Column names, in the order of [`Row::to_values`].
    const COLUMNS: &'static [&'static str];
    /// Integer columns a [`Filter`](crate::filter::Filter) may constrain.
    const FILTERABLE: &'static [&'static str];

    fn key(&self) -> RowKey;

    /// Value of a filterable integer column.
    fn field(&self, column: &str) -> Option<i64>;

    /// SQL values in [`Row::COLUMNS`] order.
    fn to_values(&self) -> Result<Vec<Value>, StorageError>;

    /// Reads a row selected with [`Row::COLUMNS`].
    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRow {
    pub id: FormId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRow {
    pub id: QuestionId,
    pub form: FormId,
    /// `opened`, `unique` or `multiple`.
    #[serde(rename = "type")]
    pub question_type: String,
    pub title: String,
    /// Only meaningful for opened questions.
    pub word_count: Option<u32>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRow {
    pub id: ChoiceId,
    pub question: QuestionId,
    pub label: String,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRow {
    pub id: SubjectId,
    pub form: FormId,
    pub valid: bool,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedAnswerRow {
    pub subject: SubjectId,
    pub question: QuestionId,
    pub words: Vec<String>,
    pub modified_at: DateTime<Utc>,
}

/// One selected choice of a closed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedAnswerRow {
    pub subject: SubjectId,
    pub question: QuestionId,
    pub choice: ChoiceId,
    pub modified_at: DateTime<Utc>,
}

fn int<I: Identifier>(id: I) -> i64 {
    i64::from(id.raw())
}

fn id_value<I: Identifier>(id: I) -> Value {
    Value::Integer(int(id))
}

fn timestamp_to_sql(ts: &DateTime<Utc>) -> Value {
    Value::Text(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn timestamp_from_sql(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decodes a stored word list.
///
/// Current rows hold a JSON array. Older databases joined the words with
/// `|`, which is still accepted; text that is not a JSON array of strings
/// is read that way.
pub fn decode_words(text: &str) -> Vec<String> {
    if text.trim_start().starts_with('[') {
        if let Ok(words) = serde_json::from_str(text) {
            return words;
        }
    }
    if text.is_empty() {
        return Vec::new();
    }
    text.split('|').map(str::to_string).collect()
}

impl Row for FormRow {
    const TABLE: &'static str = "forms";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "description", "created_at", "modified_at"];
    const FILTERABLE: &'static [&'static str] = &["id"];

    fn key(&self) -> RowKey {
        vec![int(self.id)]
    }

    fn field(&self, column: &str) -> Option<i64> {
        match column {
            "id" => Some(int(self.id)),
            _ => None,
        }
    }

    fn to_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            id_value(self.id),
            Value::Text(self.name.clone()),
            Value::Text(self.description.clone()),
            timestamp_to_sql(&self.created_at),
            timestamp_to_sql(&self.modified_at),
        ])
    }

    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(FormRow {
            id: FormId(row.get(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: timestamp_from_sql(row, 3)?,
            modified_at: timestamp_from_sql(row, 4)?,
        })
    }
}

impl Row for QuestionRow {
    const TABLE: &'static str = "questions";
    const COLUMNS: &'static [&'static str] =
        &["id", "form", "type", "title", "word_count", "modified_at"];
    const FILTERABLE: &'static [&'static str] = &["id", "form"];

    fn key(&self) -> RowKey {
        vec![int(self.id)]
    }

    fn field(&self, column: &str) -> Option<i64> {
        match column {
            "id" => Some(int(self.id)),
            "form" => Some(int(self.form)),
            _ => None,
        }
    }

    fn to_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            id_value(self.id),
            id_value(self.form),
            Value::Text(self.question_type.clone()),
            Value::Text(self.title.clone()),
            self.word_count
                .map_or(Value::Null, |n| Value::Integer(i64::from(n))),
            timestamp_to_sql(&self.modified_at),
        ])
    }

    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(QuestionRow {
            id: QuestionId(row.get(0)?),
            form: FormId(row.get(1)?),
            question_type: row.get(2)?,
            title: row.get(3)?,
            word_count: row.get(4)?,
            modified_at: timestamp_from_sql(row, 5)?,
        })
    }
}

impl Row for ChoiceRow {
    const TABLE: &'static str = "choices";
    const COLUMNS: &'static [&'static str] = &["id", "question", "label", "modified_at"];
    const FILTERABLE: &'static [&'static str] = &["id", "question"];

    fn key(&self) -> RowKey {
        vec![int(self.id)]
    }

    fn field(&self, column: &str) -> Option<i64> {
        match column {
            "id" => Some(int(self.id)),
            "question" => Some(int(self.question)),
            _ => None,
        }
    }

    fn to_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            id_value(self.id),
            id_value(self.question),
            Value::Text(self.label.clone()),
            timestamp_to_sql(&self.modified_at),
        ])
    }

    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(ChoiceRow {
            id: ChoiceId(row.get(0)?),
            question: QuestionId(row.get(1)?),
            label: row.get(2)?,
            modified_at: timestamp_from_sql(row, 3)?,
        })
    }
}

impl Row for SubjectRow {
    const TABLE: &'static str = "subjects";
    const COLUMNS: &'static [&'static str] = &["id", "form", "valid", "modified_at"];
    const FILTERABLE: &'static [&'static str] = &["id", "form"];

    fn key(&self) -> RowKey {
        vec![int(self.id)]
    }

    fn field(&self, column: &str) -> Option<i64> {
        match column {
            "id" => Some(int(self.id)),
            "form" => Some(int(self.form)),
            _ => None,
        }
    }

    fn to_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            id_value(self.id),
            id_value(self.form),
            Value::Integer(i64::from(self.valid)),
            timestamp_to_sql(&self.modified_at),
        ])
    }

    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(SubjectRow {
            id: SubjectId(row.get(0)?),
            form: FormId(row.get(1)?),
            valid: row.get(2)?,
            modified_at: timestamp_from_sql(row, 3)?,
        })
    }
}

impl Row for OpenedAnswerRow {
    const TABLE: &'static str = "opened_answers";
    const COLUMNS: &'static [&'static str] = &["subject", "question", "words", "modified_at"];
    const FILTERABLE: &'static [&'static str] = &["subject", "question"];

    fn key(&self) -> RowKey {
        vec![int(self.subject), int(self.question)]
    }

    fn field(&self, column: &str) -> Option<i64> {
        match column {
            "subject" => Some(int(self.subject)),
            "question" => Some(int(self.question)),
            _ => None,
        }
    }

    fn to_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            id_value(self.subject),
            id_value(self.question),
            Value::Text(serde_json::to_string(&self.words)?),
            timestamp_to_sql(&self.modified_at),
        ])
    }

    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let words: String = row.get(2)?;
        Ok(OpenedAnswerRow {
            subject: SubjectId(row.get(0)?),
            question: QuestionId(row.get(1)?),
            words: decode_words(&words),
            modified_at: timestamp_from_sql(row, 3)?,
        })
    }
}

impl Row for ClosedAnswerRow {
    const TABLE: &'static str = "closed_answers";
    const COLUMNS: &'static [&'static str] = &["subject", "question", "choice", "modified_at"];
    const FILTERABLE: &'static [&'static str] = &["subject", "question", "choice"];

    fn key(&self) -> RowKey {
        vec![int(self.subject), int(self.question), int(self.choice)]
    }

    fn field(&self, column: &str) -> Option<i64> {
        match column {
            "subject" => Some(int(self.subject)),
            "question" => Some(int(self.question)),
            "choice" => Some(int(self.choice)),
            _ => None,
        }
    }

    fn to_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            id_value(self.subject),
            id_value(self.question),
            id_value(self.choice),
            timestamp_to_sql(&self.modified_at),
        ])
    }

    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(ClosedAnswerRow {
            subject: SubjectId(row.get(0)?),
            question: QuestionId(row.get(1)?),
            choice: ChoiceId(row.get(2)?),
            modified_at: timestamp_from_sql(row, 3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_decode_json_and_legacy_forms() {
        assert_eq!(decode_words(r#"["a","b c"]"#), vec!["a", "b c"]);
        assert_eq!(decode_words("fast|cheap"), vec!["fast", "cheap"]);
        assert!(decode_words("").is_empty());
        assert!(decode_words("[]").is_empty());
    }

    #[test]
    fn legacy_words_starting_with_a_bracket_are_split() {
        assert_eq!(decode_words("[sic]|ok"), vec!["[sic]", "ok"]);
        assert_eq!(decode_words("[draft]"), vec!["[draft]"]);
    }

    #[test]
    fn values_follow_column_order() {
        let row = QuestionRow {
            id: QuestionId(3),
            form: FormId(1),
            question_type: "opened".into(),
            title: "Why?".into(),
            word_count: None,
            modified_at: Utc::now(),
        };
        let values = row.to_values().unwrap();
        assert_eq!(values.len(), QuestionRow::COLUMNS.len());
        assert_eq!(values[0], Value::Integer(3));
        assert_eq!(values[2], Value::Text("opened".into()));
        assert_eq!(values[4], Value::Null);
    }

    #[test]
    fn keys_cover_composite_primary_keys() {
        let row = ClosedAnswerRow {
            subject: SubjectId(4),
            question: QuestionId(5),
            choice: ChoiceId(6),
            modified_at: Utc::now(),
        };
        assert_eq!(row.key(), vec![4, 5, 6]);
        assert_eq!(row.field("choice"), Some(6));
        assert_eq!(row.field("label"), None);
    }

    #[test]
    fn serde_uses_the_type_column_name() {
        let row = QuestionRow {
            id: QuestionId(1),
            form: FormId(1),
            question_type: "unique".into(),
            title: "Pick".into(),
            word_count: None,
            modified_at: Utc::now(),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["type"], "unique");
    }
}
