//! Subjects: one respondent's submission to a form.
//!
//! A [`Subject`] holds exactly one [`Answer`] per question of its form,
//! keyed by question id and kept in question order. Whenever the question
//! set may have drifted (a reload, a form edit), [`Subject::reconcile`]
//! brings the answers back in line with the current definitions.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use crate::answer::Answer;
use crate::collection::{Entity, IndexedCollection};
use crate::error::CoreError;
use crate::id::{IdAllocator, QuestionId, SubjectId};
use crate::map::{self, EntityMap};
use crate::question::Question;

const ENTITY: &str = "subject";

/// Answers of one subject, keyed by the question they answer.
pub type Answers = IndexMap<QuestionId, Answer>;

#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub id: SubjectId,
    pub valid: bool,
    pub modified_at: DateTime<Utc>,
    pub answers: Answers,
}

impl Subject {
    /// A subject with a default answer for every question.
    pub fn new(id: SubjectId, questions: &IndexedCollection<Question>) -> Self {
        Subject {
            id,
            valid: false,
            modified_at: Utc::now(),
            answers: default_answers(questions),
        }
    }

    pub fn answer(&self, question: QuestionId) -> Option<&Answer> {
        self.answers.get(&question)
    }

    /// Rebuilds the answer map against `questions`.
    ///
    /// Answers for questions that no longer exist, or whose variant no
    /// longer matches, are dropped. Closed selections lose choices the
    /// question no longer owns. Questions without an answer get a default
    /// one. The result follows question order.
    pub fn reconcile(&mut self, questions: &IndexedCollection<Question>) {
        let mut answers = Answers::with_capacity(questions.len());
        for (id, question) in questions.iter() {
            let answer = self
                .answers
                .get(&id)
                .and_then(|a| a.reconciled(question))
                .unwrap_or_else(|| Answer::default_for(question));
            answers.insert(id, answer);
        }
        self.answers = answers;
    }

    pub fn to_tiny_map(&self) -> EntityMap {
        let mut m = EntityMap::new();
        m.insert(map::ID.into(), map::id_value(self.id));
        m.insert(map::VALID.into(), self.valid.into());
        m.insert(map::MODIFIED_AT.into(), map::timestamp_value(&self.modified_at));
        m
    }

    pub fn to_map(&self) -> EntityMap {
        let mut m = self.to_tiny_map();
        let answers = self
            .answers
            .values()
            .map(|a| Value::Object(a.to_map()))
            .collect();
        m.insert(map::ANSWERS.into(), Value::Array(answers));
        m
    }

    /// Builds a subject of a form whose questions are `questions`.
    ///
    /// Every listed answer must name one of `questions` and match its
    /// variant; unanswered questions get a default answer.
    pub fn from_map(
        m: &EntityMap,
        questions: &IndexedCollection<Question>,
        ids: &IdAllocator<SubjectId>,
    ) -> Result<Self, CoreError> {
        let id = match map::optional_id(m, map::ID, ENTITY)? {
            Some(id) => {
                ids.reserve(id);
                id
            }
            None => ids.take_id(),
        };
        let mut subject = Subject {
            id,
            valid: map::optional_bool(m, map::VALID, ENTITY)?.unwrap_or(false),
            modified_at: map::optional_timestamp(m, map::MODIFIED_AT, ENTITY)?
                .unwrap_or_else(Utc::now),
            answers: answers_from_map(m, questions)?,
        };
        subject.reconcile(questions);
        Ok(subject)
    }

    /// Updates the subject from a flat map. Listed answers replace the
    /// current answer to their question; the others are kept.
    pub fn assign_from_map(
        &mut self,
        m: &EntityMap,
        questions: &IndexedCollection<Question>,
    ) -> Result<(), CoreError> {
        if let Some(valid) = map::optional_bool(m, map::VALID, ENTITY)? {
            self.valid = valid;
        }
        let incoming = answers_from_map(m, questions)?;
        self.answers.extend(incoming);
        self.reconcile(questions);
        self.modified_at = map::optional_timestamp(m, map::MODIFIED_AT, ENTITY)?
            .unwrap_or_else(Utc::now);
        Ok(())
    }
}

impl Entity for Subject {
    type Id = SubjectId;

    fn id(&self) -> SubjectId {
        self.id
    }
}

pub(crate) fn default_answers(questions: &IndexedCollection<Question>) -> Answers {
    questions
        .iter()
        .map(|(id, q)| (id, Answer::default_for(q)))
        .collect()
}

fn answers_from_map(
    m: &EntityMap,
    questions: &IndexedCollection<Question>,
) -> Result<Answers, CoreError> {
    let mut answers = Answers::new();
    let Some(list) = map::optional_array(m, map::ANSWERS, ENTITY)? else {
        return Ok(answers);
    };
    for item in list {
        let am = map::as_object(item, "answer")?;
        let question_id: QuestionId = map::required_id(am, map::QUESTION, "answer")?;
        let question = questions
            .find(question_id)
            .ok_or_else(|| CoreError::InconsistentReference {
                reason: format!("answer refers to unknown question {question_id}"),
            })?;
        answers.insert(question_id, Answer::from_map(am, question)?);
    }
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerKind;
    use crate::choice::Choice;
    use crate::id::{Allocators, ChoiceId};
    use crate::question::ClosedMode;
    use serde_json::json;

    fn obj(value: Value) -> EntityMap {
        value.as_object().unwrap().clone()
    }

    /// Question 1 opened, question 2 multiple with choices 10, 11, 12.
    fn questions(allocs: &Allocators) -> IndexedCollection<Question> {
        let mut choices = IndexedCollection::new(allocs.choices.clone());
        for (id, label) in [(10, "A"), (11, "B"), (12, "C")] {
            choices.insert(Choice::new(ChoiceId(id), label));
        }
        let mut qs = IndexedCollection::new(allocs.questions.clone());
        qs.insert(Question::opened(QuestionId(1), "Why?", 20));
        qs.insert(Question::closed(QuestionId(2), "Pick", ClosedMode::Multiple, choices));
        qs
    }

    #[test]
    fn new_subject_has_one_default_answer_per_question() {
        let allocs = Allocators::new();
        let qs = questions(&allocs);
        let s = Subject::new(SubjectId(1), &qs);
        assert_eq!(s.answers.len(), 2);
        assert!(matches!(s.answers[&QuestionId(1)].kind, AnswerKind::Opened { .. }));
        assert!(matches!(s.answers[&QuestionId(2)].kind, AnswerKind::Closed { .. }));
    }

    #[test]
    fn reconcile_drops_stale_and_fills_missing() {
        let allocs = Allocators::new();
        let mut qs = questions(&allocs);
        let mut s = Subject::new(SubjectId(1), &qs);
        s.answers.insert(
            QuestionId(2),
            Answer::closed(QuestionId(2), [ChoiceId(10), ChoiceId(11), ChoiceId(12)]),
        );
        s.answers.insert(QuestionId(99), Answer::from_text(QuestionId(99), "orphan"));

        // Choice 11 disappears from question 2; question 3 is added.
        let mut q2 = qs.at(QuestionId(2)).unwrap().clone();
        if let crate::question::QuestionKind::Closed { choices, .. } = &mut q2.kind {
            choices.erase(ChoiceId(11));
        }
        qs.insert(q2);
        qs.insert(Question::opened(QuestionId(3), "More?", 5));

        s.reconcile(&qs);
        let keys: Vec<_> = s.answers.keys().copied().collect();
        assert_eq!(keys, vec![QuestionId(1), QuestionId(2), QuestionId(3)]);
        let selected: Vec<_> = s.answers[&QuestionId(2)]
            .selected()
            .unwrap()
            .iter()
            .copied()
            .collect();
        assert_eq!(selected, vec![ChoiceId(10), ChoiceId(12)]);
    }

    #[test]
    fn from_map_fills_defaults_and_orders_by_question() {
        let allocs = Allocators::new();
        let qs = questions(&allocs);
        let s = Subject::from_map(
            &obj(json!({ "valid": true, "answers": [{ "question": 2, "choices": [12] }] })),
            &qs,
            &allocs.subjects,
        )
        .unwrap();
        assert_eq!(s.id, SubjectId(1));
        assert!(s.valid);
        let keys: Vec<_> = s.answers.keys().copied().collect();
        assert_eq!(keys, vec![QuestionId(1), QuestionId(2)]);
        assert!(s.answers[&QuestionId(1)].words().unwrap().is_empty());
    }

    #[test]
    fn from_map_rejects_unknown_question() {
        let allocs = Allocators::new();
        let qs = questions(&allocs);
        let err = Subject::from_map(
            &obj(json!({ "answers": [{ "question": 7, "words": [] }] })),
            &qs,
            &allocs.subjects,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InconsistentReference { .. }));
    }

    #[test]
    fn assign_replaces_only_listed_answers() {
        let allocs = Allocators::new();
        let qs = questions(&allocs);
        let mut s = Subject::from_map(
            &obj(json!({
                "id": 4,
                "answers": [
                    { "question": 1, "words": ["first"] },
                    { "question": 2, "choices": [10] }
                ]
            })),
            &qs,
            &allocs.subjects,
        )
        .unwrap();

        s.assign_from_map(
            &obj(json!({ "answers": [{ "question": 2, "choices": [11, 12] }] })),
            &qs,
        )
        .unwrap();

        assert_eq!(s.answers[&QuestionId(1)].words().unwrap(), ["first"]);
        assert_eq!(s.answers[&QuestionId(2)].selected().unwrap().len(), 2);
        assert!(!s.valid);
    }

    #[test]
    fn to_map_roundtrips() {
        let allocs = Allocators::new();
        let qs = questions(&allocs);
        let mut s = Subject::new(SubjectId(8), &qs);
        s.valid = true;
        s.answers
            .insert(QuestionId(1), Answer::from_text(QuestionId(1), "because it works"));
        let back = Subject::from_map(&s.to_map(), &qs, &allocs.subjects).unwrap();
        assert_eq!(back, s);
        assert_eq!(s.to_tiny_map().len(), 3);
    }
}
