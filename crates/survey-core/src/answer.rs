//! A subject's response to one question.
//!
//! Answers are keyed by the id of the question they answer. The variant
//! must agree with the question's: opened questions take a sequence of
//! words, closed questions a set of selected choice ids.

use indexmap::IndexSet;
use serde_json::Value;

use crate::error::CoreError;
use crate::id::{ChoiceId, QuestionId};
use crate::map::{self, EntityMap};
use crate::question::{ClosedMode, Question, QuestionKind};

const ENTITY: &str = "answer";

const OPENED: &str = "opened";
const CLOSED: &str = "closed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKind {
    Opened { words: Vec<String> },
    Closed { choices: IndexSet<ChoiceId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub question: QuestionId,
    pub kind: AnswerKind,
}

impl Answer {
    pub fn opened(question: QuestionId, words: Vec<String>) -> Self {
        Answer {
            question,
            kind: AnswerKind::Opened { words },
        }
    }

    /// An opened answer whose words are `text` split on whitespace.
    pub fn from_text(question: QuestionId, text: &str) -> Self {
        Self::opened(question, text.split_whitespace().map(str::to_string).collect())
    }

    pub fn closed(question: QuestionId, choices: impl IntoIterator<Item = ChoiceId>) -> Self {
        Answer {
            question,
            kind: AnswerKind::Closed {
                choices: choices.into_iter().collect(),
            },
        }
    }

    /// The empty answer of the right variant for `question`.
    pub fn default_for(question: &Question) -> Self {
        match &question.kind {
            QuestionKind::Opened { .. } => Self::opened(question.id, Vec::new()),
            QuestionKind::Closed { .. } => Answer {
                question: question.id,
                kind: AnswerKind::Closed {
                    choices: IndexSet::new(),
                },
            },
        }
    }

    /// Returns true if this answer's variant fits `question`'s.
    pub fn matches(&self, question: &Question) -> bool {
        match (&self.kind, &question.kind) {
            (AnswerKind::Opened { .. }, QuestionKind::Opened { .. }) => true,
            (AnswerKind::Closed { .. }, QuestionKind::Closed { .. }) => true,
            (AnswerKind::Opened { .. }, QuestionKind::Closed { .. })
            | (AnswerKind::Closed { .. }, QuestionKind::Opened { .. }) => false,
        }
    }

    pub fn words(&self) -> Option<&[String]> {
        match &self.kind {
            AnswerKind::Opened { words } => Some(words),
            AnswerKind::Closed { .. } => None,
        }
    }

    pub fn selected(&self) -> Option<&IndexSet<ChoiceId>> {
        match &self.kind {
            AnswerKind::Opened { .. } => None,
            AnswerKind::Closed { choices } => Some(choices),
        }
    }

    /// Rebuilds this answer against the current definition of `question`.
    ///
    /// Returns `None` when the variants disagree. Closed selections are
    /// intersected with the choices the question still owns, in the
    /// question's choice order.
    pub fn reconciled(&self, question: &Question) -> Option<Answer> {
        match (&self.kind, &question.kind) {
            (AnswerKind::Opened { words }, QuestionKind::Opened { .. }) => {
                Some(Self::opened(question.id, words.clone()))
            }
            (AnswerKind::Closed { choices: selected }, QuestionKind::Closed { choices, .. }) => {
                Some(Self::closed(
                    question.id,
                    choices.ids().filter(|id| selected.contains(id)),
                ))
            }
            (AnswerKind::Opened { .. }, QuestionKind::Closed { .. })
            | (AnswerKind::Closed { .. }, QuestionKind::Opened { .. }) => None,
        }
    }

    pub fn to_map(&self) -> EntityMap {
        let mut m = EntityMap::new();
        m.insert(map::QUESTION.into(), map::id_value(self.question));
        match &self.kind {
            AnswerKind::Opened { words } => {
                m.insert(map::TYPE.into(), OPENED.into());
                m.insert(
                    map::WORDS.into(),
                    Value::Array(words.iter().cloned().map(Value::String).collect()),
                );
            }
            AnswerKind::Closed { choices } => {
                m.insert(map::TYPE.into(), CLOSED.into());
                m.insert(
                    map::CHOICES.into(),
                    Value::Array(choices.iter().map(|c| map::id_value(*c)).collect()),
                );
            }
        }
        m
    }

    /// Builds an answer for `question` from its flat form.
    ///
    /// The map must name `question` and agree with its variant. A `type`
    /// field, when present, must agree too. Selected choices must belong
    /// to the question, and a unique question accepts at most one.
    pub fn from_map(m: &EntityMap, question: &Question) -> Result<Self, CoreError> {
        let question_id: QuestionId = map::required_id(m, map::QUESTION, ENTITY)?;
        if question_id != question.id {
            return Err(CoreError::InconsistentReference {
                reason: format!(
                    "answer for question {question_id} matched against question {}",
                    question.id
                ),
            });
        }
        let tag = map::optional_str(m, map::TYPE, ENTITY)?;
        match &question.kind {
            QuestionKind::Opened { .. } => {
                if tag.is_some_and(|t| t != OPENED) {
                    return Err(mismatch(question));
                }
                let words = match field_array(m, map::WORDS)? {
                    Some(list) => list
                        .iter()
                        .map(|w| {
                            w.as_str().map(str::to_string).ok_or_else(|| {
                                CoreError::invalid(ENTITY, "words must be strings")
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    None => Vec::new(),
                };
                Ok(Self::opened(question.id, words))
            }
            QuestionKind::Closed { mode, choices } => {
                if tag.is_some_and(|t| t != CLOSED) {
                    return Err(mismatch(question));
                }
                let mut selected = IndexSet::new();
                for value in field_array(m, map::CHOICES)?.into_iter().flatten() {
                    let raw = value
                        .as_u64()
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(|| CoreError::invalid(ENTITY, "choices must be choice ids"))?;
                    let id = ChoiceId(raw);
                    if !choices.contains(id) {
                        return Err(CoreError::InconsistentReference {
                            reason: format!("choice {id} is not part of question {}", question.id),
                        });
                    }
                    selected.insert(id);
                }
                if *mode == ClosedMode::Unique && selected.len() > 1 {
                    return Err(CoreError::invalid(
                        ENTITY,
                        format!("question {} accepts a single choice", question.id),
                    ));
                }
                Ok(Self::closed(question.id, selected))
            }
        }
    }
}

fn field_array<'a>(m: &'a EntityMap, key: &str) -> Result<Option<&'a Vec<Value>>, CoreError> {
    map::optional_array(m, key, ENTITY)
}

fn mismatch(question: &Question) -> CoreError {
    CoreError::InconsistentReference {
        reason: format!(
            "answer variant does not match {} question {}",
            question.question_type(),
            question.id
        ),
    }
}
