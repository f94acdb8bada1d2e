//! A selectable option of a closed question.

use chrono::{DateTime, Utc};

use crate::collection::Entity;
use crate::error::CoreError;
use crate::id::{ChoiceId, IdAllocator};
use crate::map::{self, EntityMap};

const ENTITY: &str = "choice";

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub id: ChoiceId,
    pub label: String,
    pub modified_at: DateTime<Utc>,
}

impl Choice {
    pub fn new(id: ChoiceId, label: impl Into<String>) -> Self {
        Choice {
            id,
            label: label.into(),
            modified_at: Utc::now(),
        }
    }

    pub fn to_map(&self) -> EntityMap {
        let mut m = EntityMap::new();
        m.insert(map::ID.into(), map::id_value(self.id));
        m.insert(map::LABEL.into(), self.label.clone().into());
        m.insert(map::MODIFIED_AT.into(), map::timestamp_value(&self.modified_at));
        m
    }

    /// Builds a choice from its flat form. A missing `id` draws a fresh one.
    pub fn from_map(m: &EntityMap, ids: &IdAllocator<ChoiceId>) -> Result<Self, CoreError> {
        let id = match map::optional_id(m, map::ID, ENTITY)? {
            Some(id) => {
                ids.reserve(id);
                id
            }
            None => ids.take_id(),
        };
        Ok(Choice {
            id,
            label: map::required_str(m, map::LABEL, ENTITY)?.to_string(),
            modified_at: map::optional_timestamp(m, map::MODIFIED_AT, ENTITY)?
                .unwrap_or_else(Utc::now),
        })
    }

    pub fn assign_from_map(&mut self, m: &EntityMap) -> Result<(), CoreError> {
        if let Some(label) = map::optional_str(m, map::LABEL, ENTITY)? {
            self.label = label.to_string();
        }
        self.modified_at = map::optional_timestamp(m, map::MODIFIED_AT, ENTITY)?
            .unwrap_or_else(Utc::now);
        Ok(())
    }
}

impl Entity for Choice {
    type Id = ChoiceId;

    fn id(&self) -> ChoiceId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_map_without_id_takes_a_fresh_one() {
        let ids = IdAllocator::new();
        ids.reserve(ChoiceId(4));
        let m = json!({ "label": "Yes" }).as_object().unwrap().clone();
        let choice = Choice::from_map(&m, &ids).unwrap();
        assert_eq!(choice.id, ChoiceId(5));
        assert_eq!(choice.label, "Yes");
    }

    #[test]
    fn to_map_from_map_preserves_fields() {
        let ids = IdAllocator::new();
        let choice = Choice::new(ChoiceId(9), "Maybe");
        let back = Choice::from_map(&choice.to_map(), &ids).unwrap();
        assert_eq!(back, choice);
        assert_eq!(ids.take_id(), ChoiceId(10));
    }

    #[test]
    fn label_is_required() {
        let m = json!({ "id": 1 }).as_object().unwrap().clone();
        assert!(Choice::from_map(&m, &IdAllocator::new()).is_err());
    }
}
