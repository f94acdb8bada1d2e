//! Flat key/value representation exchanged with collaborators.
//!
//! Entities serialize to an [`EntityMap`] (a JSON object) via `to_map` and
//! are rebuilt with `from_map`. The helpers here read typed fields out of a
//! map and report missing or mistyped fields as
//! [`CoreError::InvalidEntity`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::CoreError;
use crate::id::Identifier;

/// A flat key/value view of one entity.
pub type EntityMap = serde_json::Map<String, Value>;

pub const ID: &str = "id";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const CREATED_AT: &str = "created_at";
pub const MODIFIED_AT: &str = "modified_at";
pub const QUESTIONS: &str = "questions";
pub const SUBJECTS: &str = "subjects";
pub const TITLE: &str = "title";
pub const TYPE: &str = "type";
pub const WORD_COUNT: &str = "word_count";
pub const CHOICES: &str = "choices";
pub const LABEL: &str = "label";
pub const VALID: &str = "valid";
pub const ANSWERS: &str = "answers";
pub const QUESTION: &str = "question";
pub const WORDS: &str = "words";

/// Returns the value under `key`, treating JSON `null` as absent.
pub fn field<'a>(map: &'a EntityMap, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn missing(entity: &'static str, key: &str) -> CoreError {
    CoreError::invalid(entity, format!("missing field '{key}'"))
}

fn mistyped(entity: &'static str, key: &str, expected: &str) -> CoreError {
    CoreError::invalid(entity, format!("field '{key}' must be {expected}"))
}

pub fn optional_str<'a>(
    map: &'a EntityMap,
    key: &str,
    entity: &'static str,
) -> Result<Option<&'a str>, CoreError> {
    match field(map, key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| mistyped(entity, key, "a string")),
    }
}

pub fn required_str<'a>(
    map: &'a EntityMap,
    key: &str,
    entity: &'static str,
) -> Result<&'a str, CoreError> {
    optional_str(map, key, entity)?.ok_or_else(|| missing(entity, key))
}

pub fn optional_u32(
    map: &EntityMap,
    key: &str,
    entity: &'static str,
) -> Result<Option<u32>, CoreError> {
    match field(map, key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| mistyped(entity, key, "an unsigned 32-bit integer")),
    }
}

pub fn required_u32(map: &EntityMap, key: &str, entity: &'static str) -> Result<u32, CoreError> {
    optional_u32(map, key, entity)?.ok_or_else(|| missing(entity, key))
}

pub fn optional_id<I: Identifier>(
    map: &EntityMap,
    key: &str,
    entity: &'static str,
) -> Result<Option<I>, CoreError> {
    Ok(optional_u32(map, key, entity)?.map(I::from_raw))
}

pub fn required_id<I: Identifier>(
    map: &EntityMap,
    key: &str,
    entity: &'static str,
) -> Result<I, CoreError> {
    optional_id(map, key, entity)?.ok_or_else(|| missing(entity, key))
}

pub fn optional_bool(
    map: &EntityMap,
    key: &str,
    entity: &'static str,
) -> Result<Option<bool>, CoreError> {
    match field(map, key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| mistyped(entity, key, "a boolean")),
    }
}

pub fn optional_timestamp(
    map: &EntityMap,
    key: &str,
    entity: &'static str,
) -> Result<Option<DateTime<Utc>>, CoreError> {
    match optional_str(map, key, entity)? {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| CoreError::invalid(entity, format!("field '{key}': {e}"))),
    }
}

/// Returns the array under `key`; absent means `None`.
pub fn optional_array<'a>(
    map: &'a EntityMap,
    key: &str,
    entity: &'static str,
) -> Result<Option<&'a Vec<Value>>, CoreError> {
    match field(map, key) {
        None => Ok(None),
        Some(v) => v
            .as_array()
            .map(Some)
            .ok_or_else(|| mistyped(entity, key, "an array")),
    }
}

/// Views an array element as a nested entity map.
pub fn as_object<'a>(value: &'a Value, entity: &'static str) -> Result<&'a EntityMap, CoreError> {
    value
        .as_object()
        .ok_or_else(|| CoreError::invalid(entity, "expected an object"))
}

pub fn timestamp_value(ts: &DateTime<Utc>) -> Value {
    Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

pub fn id_value<I: Identifier>(id: I) -> Value {
    Value::from(id.raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::FormId;
    use serde_json::json;

    fn map(value: Value) -> EntityMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn null_reads_as_absent() {
        let m = map(json!({ "id": null, "name": "x" }));
        assert_eq!(optional_id::<FormId>(&m, ID, "form").unwrap(), None);
        assert_eq!(required_str(&m, NAME, "form").unwrap(), "x");
    }

    #[test]
    fn missing_required_field_is_invalid_entity() {
        let m = map(json!({}));
        let err = required_str(&m, TITLE, "question").unwrap_err();
        assert!(matches!(err, CoreError::InvalidEntity { entity: "question", .. }));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn mistyped_field_is_invalid_entity() {
        let m = map(json!({ "word_count": "ten", "valid": 1 }));
        assert!(optional_u32(&m, WORD_COUNT, "question").is_err());
        assert!(optional_bool(&m, VALID, "subject").is_err());
    }

    #[test]
    fn timestamps_keep_sub_second_precision() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T10:20:30.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut m = EntityMap::new();
        m.insert(MODIFIED_AT.into(), timestamp_value(&ts));
        assert_eq!(optional_timestamp(&m, MODIFIED_AT, "form").unwrap(), Some(ts));
    }
}
