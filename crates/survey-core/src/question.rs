//! Questions: the prompts a form asks.
//!
//! A [`Question`] is either opened (free text with a target word count) or
//! closed (a set of [`Choice`]s, answered with one or several selections).
//! The variant set is closed: every consumer matches on [`QuestionKind`]
//! exhaustively, so adding a variant surfaces at every use site.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::choice::Choice;
use crate::collection::{Entity, IndexedCollection};
use crate::error::CoreError;
use crate::id::{Allocators, ChoiceId, QuestionId};
use crate::map::{self, EntityMap};

const ENTITY: &str = "question";

/// How many choices a closed question accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedMode {
    Unique,
    Multiple,
}

/// The persisted type tag of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    Opened,
    Unique,
    Multiple,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Opened => "opened",
            QuestionType::Unique => "unique",
            QuestionType::Multiple => "multiple",
        }
    }

    /// The selection mode of a closed type; `None` for opened questions.
    pub fn closed_mode(self) -> Option<ClosedMode> {
        match self {
            QuestionType::Opened => None,
            QuestionType::Unique => Some(ClosedMode::Unique),
            QuestionType::Multiple => Some(ClosedMode::Multiple),
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opened" => Ok(QuestionType::Opened),
            "unique" => Ok(QuestionType::Unique),
            "multiple" => Ok(QuestionType::Multiple),
            other => Err(CoreError::invalid(
                ENTITY,
                format!("unrecognized question type '{other}'"),
            )),
        }
    }
}

/// Variant-specific question data.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionKind {
    Opened {
        word_count: u32,
    },
    Closed {
        mode: ClosedMode,
        choices: IndexedCollection<Choice>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub modified_at: DateTime<Utc>,
    pub kind: QuestionKind,
}

impl Question {
    pub fn opened(id: QuestionId, title: impl Into<String>, word_count: u32) -> Self {
        Question {
            id,
            title: title.into(),
            modified_at: Utc::now(),
            kind: QuestionKind::Opened { word_count },
        }
    }

    pub fn closed(
        id: QuestionId,
        title: impl Into<String>,
        mode: ClosedMode,
        choices: IndexedCollection<Choice>,
    ) -> Self {
        Question {
            id,
            title: title.into(),
            modified_at: Utc::now(),
            kind: QuestionKind::Closed { mode, choices },
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match &self.kind {
            QuestionKind::Opened { .. } => QuestionType::Opened,
            QuestionKind::Closed {
                mode: ClosedMode::Unique,
                ..
            } => QuestionType::Unique,
            QuestionKind::Closed {
                mode: ClosedMode::Multiple,
                ..
            } => QuestionType::Multiple,
        }
    }

    /// The choices of a closed question; `None` for opened questions.
    pub fn choices(&self) -> Option<&IndexedCollection<Choice>> {
        match &self.kind {
            QuestionKind::Opened { .. } => None,
            QuestionKind::Closed { choices, .. } => Some(choices),
        }
    }

    pub fn owns_choice(&self, id: ChoiceId) -> bool {
        self.choices().is_some_and(|c| c.contains(id))
    }

    pub fn to_map(&self) -> EntityMap {
        let mut m = EntityMap::new();
        m.insert(map::ID.into(), map::id_value(self.id));
        m.insert(map::TITLE.into(), self.title.clone().into());
        m.insert(map::TYPE.into(), self.question_type().as_str().into());
        m.insert(map::MODIFIED_AT.into(), map::timestamp_value(&self.modified_at));
        match &self.kind {
            QuestionKind::Opened { word_count } => {
                m.insert(map::WORD_COUNT.into(), Value::from(*word_count));
            }
            QuestionKind::Closed { choices, .. } => {
                let list = choices.values().map(|c| Value::Object(c.to_map())).collect();
                m.insert(map::CHOICES.into(), Value::Array(list));
            }
        }
        m
    }

    /// Builds a question from its flat form. The `type` field selects the
    /// variant; an unknown tag fails with [`CoreError::InvalidEntity`].
    pub fn from_map(m: &EntityMap, allocators: &Allocators) -> Result<Self, CoreError> {
        let id = match map::optional_id(m, map::ID, ENTITY)? {
            Some(id) => {
                allocators.questions.reserve(id);
                id
            }
            None => allocators.questions.take_id(),
        };
        let question_type: QuestionType = map::required_str(m, map::TYPE, ENTITY)?.parse()?;
        let kind = match question_type.closed_mode() {
            None => QuestionKind::Opened {
                word_count: map::optional_u32(m, map::WORD_COUNT, ENTITY)?.unwrap_or(0),
            },
            Some(mode) => QuestionKind::Closed {
                mode,
                choices: choices_from_map(m, allocators, None)?,
            },
        };
        Ok(Question {
            id,
            title: map::required_str(m, map::TITLE, ENTITY)?.to_string(),
            modified_at: map::optional_timestamp(m, map::MODIFIED_AT, ENTITY)?
                .unwrap_or_else(Utc::now),
            kind,
        })
    }

    /// Updates the question from a flat map. Only keys that are present are
    /// applied. A changed `type` rebuilds the variant data; choices listed
    /// with an id this question already owns are updated rather than
    /// recreated.
    pub fn assign_from_map(
        &mut self,
        m: &EntityMap,
        allocators: &Allocators,
    ) -> Result<(), CoreError> {
        if let Some(title) = map::optional_str(m, map::TITLE, ENTITY)? {
            self.title = title.to_string();
        }
        let question_type = match map::optional_str(m, map::TYPE, ENTITY)? {
            Some(tag) => tag.parse()?,
            None => self.question_type(),
        };
        self.kind = match (question_type.closed_mode(), &self.kind) {
            (None, QuestionKind::Opened { word_count }) => QuestionKind::Opened {
                word_count: map::optional_u32(m, map::WORD_COUNT, ENTITY)?.unwrap_or(*word_count),
            },
            (None, QuestionKind::Closed { .. }) => QuestionKind::Opened {
                word_count: map::optional_u32(m, map::WORD_COUNT, ENTITY)?.unwrap_or(0),
            },
            (Some(mode), QuestionKind::Closed { choices, .. }) => {
                let choices = if map::field(m, map::CHOICES).is_some() {
                    choices_from_map(m, allocators, Some(choices))?
                } else {
                    choices.clone()
                };
                QuestionKind::Closed { mode, choices }
            }
            (Some(mode), QuestionKind::Opened { .. }) => QuestionKind::Closed {
                mode,
                choices: choices_from_map(m, allocators, None)?,
            },
        };
        self.modified_at = map::optional_timestamp(m, map::MODIFIED_AT, ENTITY)?
            .unwrap_or_else(Utc::now);
        Ok(())
    }
}

impl Entity for Question {
    type Id = QuestionId;

    fn id(&self) -> QuestionId {
        self.id
    }
}

fn choices_from_map(
    m: &EntityMap,
    allocators: &Allocators,
    existing: Option<&IndexedCollection<Choice>>,
) -> Result<IndexedCollection<Choice>, CoreError> {
    let mut choices = IndexedCollection::new(allocators.choices.clone());
    let Some(list) = map::optional_array(m, map::CHOICES, ENTITY)? else {
        return Ok(choices);
    };
    for item in list {
        let cm = map::as_object(item, "choice")?;
        let known = map::optional_id::<ChoiceId>(cm, map::ID, "choice")?
            .and_then(|id| existing.and_then(|c| c.find(id)));
        let choice = match known {
            Some(current) => {
                let mut updated = current.clone();
                updated.assign_from_map(cm)?;
                updated
            }
            None => Choice::from_map(cm, &allocators.choices)?,
        };
        choices.insert(choice);
    }
    Ok(choices)
}
