//! Forms: a survey definition with its ordered questions and the subjects
//! that answered it.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::collection::{Entity, IndexedCollection};
use crate::error::CoreError;
use crate::id::{Allocators, FormId, QuestionId, SubjectId};
use crate::map::{self, EntityMap};
use crate::question::Question;
use crate::subject::Subject;

const ENTITY: &str = "form";

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub id: FormId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    questions: IndexedCollection<Question>,
    subjects: IndexedCollection<Subject>,
}

impl Form {
    /// An empty form whose collections draw ids from `allocators`.
    pub fn new(id: FormId, name: impl Into<String>, allocators: &Allocators) -> Self {
        let now = Utc::now();
        Form {
            id,
            name: name.into(),
            description: String::new(),
            created_at: now,
            modified_at: now,
            questions: IndexedCollection::new(allocators.questions.clone()),
            subjects: IndexedCollection::new(allocators.subjects.clone()),
        }
    }

    pub fn questions(&self) -> &IndexedCollection<Question> {
        &self.questions
    }

    pub fn subjects(&self) -> &IndexedCollection<Subject> {
        &self.subjects
    }

    /// Replaces the question list and reconciles every subject's answers
    /// against it.
    pub fn set_questions(&mut self, questions: IndexedCollection<Question>) {
        self.questions = questions;
        self.reconcile_subjects();
    }

    /// Replaces the subject collection as is. Callers that build subjects
    /// outside [`Subject::from_map`] are responsible for their answers.
    pub fn set_subjects(&mut self, subjects: IndexedCollection<Subject>) {
        self.subjects = subjects;
    }

    /// Inserts or replaces one subject after reconciling it with the
    /// current questions.
    pub fn put_subject(&mut self, mut subject: Subject) {
        subject.reconcile(&self.questions);
        self.subjects.insert(subject);
    }

    pub fn remove_subject(&mut self, id: SubjectId) -> Option<Subject> {
        self.subjects.erase(id)
    }

    pub fn question(&self, id: QuestionId) -> Result<&Question, CoreError> {
        self.questions.at(id)
    }

    /// A fresh subject with one default answer per current question. The
    /// subject is not added to the form.
    pub fn new_subject(&self) -> Subject {
        Subject::new(self.subjects.take_id(), &self.questions)
    }

    /// Re-runs answer reconciliation on every subject.
    pub fn reconcile_subjects(&mut self) {
        let ids: Vec<_> = self.subjects.ids().collect();
        for id in ids {
            if let Some(subject) = self.subjects.find(id) {
                let mut subject = subject.clone();
                subject.reconcile(&self.questions);
                self.subjects.insert(subject);
            }
        }
    }

    /// Listing summary without nested questions or subjects.
    pub fn to_tiny_map(&self) -> EntityMap {
        let mut m = EntityMap::new();
        m.insert(map::ID.into(), map::id_value(self.id));
        m.insert(map::NAME.into(), self.name.clone().into());
        m.insert(map::DESCRIPTION.into(), self.description.clone().into());
        m.insert(map::CREATED_AT.into(), map::timestamp_value(&self.created_at));
        m.insert(map::MODIFIED_AT.into(), map::timestamp_value(&self.modified_at));
        m
    }

    pub fn to_map(&self) -> EntityMap {
        let mut m = self.to_tiny_map();
        let questions = self
            .questions
            .values()
            .map(|q| Value::Object(q.to_map()))
            .collect();
        let subjects = self
            .subjects
            .values()
            .map(|s| Value::Object(s.to_map()))
            .collect();
        m.insert(map::QUESTIONS.into(), Value::Array(questions));
        m.insert(map::SUBJECTS.into(), Value::Array(subjects));
        m
    }

    /// Builds a form from its flat form. Questions are read before
    /// subjects, whose answers are checked against them.
    pub fn from_map(m: &EntityMap, allocators: &Allocators) -> Result<Self, CoreError> {
        let id = match map::optional_id(m, map::ID, ENTITY)? {
            Some(id) => {
                allocators.forms.reserve(id);
                id
            }
            None => allocators.forms.take_id(),
        };
        let now = Utc::now();
        let created_at = map::optional_timestamp(m, map::CREATED_AT, ENTITY)?.unwrap_or(now);
        let mut form = Form {
            id,
            name: map::required_str(m, map::NAME, ENTITY)?.to_string(),
            description: map::optional_str(m, map::DESCRIPTION, ENTITY)?
                .unwrap_or_default()
                .to_string(),
            created_at,
            modified_at: map::optional_timestamp(m, map::MODIFIED_AT, ENTITY)?
                .unwrap_or(created_at),
            questions: IndexedCollection::new(allocators.questions.clone()),
            subjects: IndexedCollection::new(allocators.subjects.clone()),
        };
        form.questions = questions_from_map(m, allocators, None)?;
        form.subjects = subjects_from_map(m, &form.questions, allocators, None)?;
        Ok(form)
    }

    /// Updates the form from a flat map. Only keys that are present are
    /// applied; `questions` and `subjects`, when present, replace the
    /// current lists. Entries that carry an id the form already knows are
    /// updated in place of being rebuilt.
    pub fn assign_from_map(
        &mut self,
        m: &EntityMap,
        allocators: &Allocators,
    ) -> Result<(), CoreError> {
        if let Some(name) = map::optional_str(m, map::NAME, ENTITY)? {
            self.name = name.to_string();
        }
        if let Some(description) = map::optional_str(m, map::DESCRIPTION, ENTITY)? {
            self.description = description.to_string();
        }
        if let Some(created_at) = map::optional_timestamp(m, map::CREATED_AT, ENTITY)? {
            self.created_at = created_at;
        }
        if map::field(m, map::QUESTIONS).is_some() {
            let questions = questions_from_map(m, allocators, Some(&self.questions))?;
            self.set_questions(questions);
        }
        if map::field(m, map::SUBJECTS).is_some() {
            self.subjects = subjects_from_map(m, &self.questions, allocators, Some(&self.subjects))?;
        }
        self.modified_at = map::optional_timestamp(m, map::MODIFIED_AT, ENTITY)?
            .unwrap_or_else(Utc::now);
        Ok(())
    }
}

impl Entity for Form {
    type Id = FormId;

    fn id(&self) -> FormId {
        self.id
    }
}

fn questions_from_map(
    m: &EntityMap,
    allocators: &Allocators,
    existing: Option<&IndexedCollection<Question>>,
) -> Result<IndexedCollection<Question>, CoreError> {
    let mut questions = IndexedCollection::new(allocators.questions.clone());
    for item in map::optional_array(m, map::QUESTIONS, ENTITY)?.into_iter().flatten() {
        let qm = map::as_object(item, "question")?;
        let known = map::optional_id::<QuestionId>(qm, map::ID, "question")?
            .and_then(|id| existing.and_then(|q| q.find(id)));
        let question = match known {
            Some(current) => {
                let mut updated = current.clone();
                updated.assign_from_map(qm, allocators)?;
                updated
            }
            None => Question::from_map(qm, allocators)?,
        };
        questions.insert(question);
    }
    Ok(questions)
}

fn subjects_from_map(
    m: &EntityMap,
    questions: &IndexedCollection<Question>,
    allocators: &Allocators,
    existing: Option<&IndexedCollection<Subject>>,
) -> Result<IndexedCollection<Subject>, CoreError> {
    let mut subjects = IndexedCollection::new(allocators.subjects.clone());
    for item in map::optional_array(m, map::SUBJECTS, ENTITY)?.into_iter().flatten() {
        let sm = map::as_object(item, "subject")?;
        let known = map::optional_id(sm, map::ID, "subject")?
            .and_then(|id| existing.and_then(|s| s.find(id)));
        let subject = match known {
            Some(current) => {
                let mut updated = current.clone();
                updated.assign_from_map(sm, questions)?;
                updated
            }
            None => Subject::from_map(sm, questions, &allocators.subjects)?,
        };
        subjects.insert(subject);
    }
    Ok(subjects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::Answer;
    use crate::id::ChoiceId;
    use crate::question::QuestionType;
    use serde_json::json;

    fn obj(value: Value) -> EntityMap {
        value.as_object().unwrap().clone()
    }

    fn sample(allocs: &Allocators) -> Form {
        Form::from_map(
            &obj(json!({
                "id": 1,
                "name": "Lunch",
                "description": "Weekly lunch poll",
                "questions": [
                    { "id": 1, "title": "Comments", "type": "opened", "word_count": 30 },
                    {
                        "id": 2, "title": "Dishes", "type": "multiple",
                        "choices": [
                            { "id": 1, "label": "Soup" },
                            { "id": 2, "label": "Salad" },
                            { "id": 3, "label": "Pasta" }
                        ]
                    }
                ],
                "subjects": [
                    { "id": 1, "valid": true, "answers": [{ "question": 2, "choices": [1, 3] }] }
                ]
            })),
            allocs,
        )
        .unwrap()
    }

    #[test]
    fn from_map_builds_nested_graph() {
        let allocs = Allocators::new();
        let form = sample(&allocs);
        assert_eq!(form.name, "Lunch");
        let types: Vec<_> = form.questions().values().map(|q| q.question_type()).collect();
        assert_eq!(types, vec![QuestionType::Opened, QuestionType::Multiple]);
        let subject = form.subjects().at(SubjectId(1)).unwrap();
        assert_eq!(subject.answers.len(), 2);
        assert_eq!(form.modified_at, form.created_at);
    }

    #[test]
    fn name_is_required() {
        let err = Form::from_map(&obj(json!({ "description": "x" })), &Allocators::new());
        assert!(matches!(err, Err(CoreError::InvalidEntity { entity: "form", .. })));
    }

    #[test]
    fn to_map_from_map_roundtrip() {
        let allocs = Allocators::new();
        let form = sample(&allocs);
        let back = Form::from_map(&form.to_map(), &allocs).unwrap();
        assert_eq!(back, form);
        assert!(!form.to_tiny_map().contains_key("questions"));
    }

    #[test]
    fn new_subject_answers_every_question_and_is_not_inserted() {
        let allocs = Allocators::new();
        let form = sample(&allocs);
        let fresh = form.new_subject();
        assert_eq!(fresh.id, SubjectId(2));
        assert_eq!(fresh.answers.len(), form.questions().len());
        for (qid, question) in form.questions().iter() {
            assert!(fresh.answers[&qid].matches(question));
        }
        assert!(!form.subjects().contains(fresh.id));
    }

    #[test]
    fn assigning_questions_reconciles_subjects() {
        let allocs = Allocators::new();
        let mut form = sample(&allocs);
        let before = form.clone();

        // Question 1 goes away and "Pasta" is no longer offered.
        form.assign_from_map(
            &obj(json!({
                "questions": [
                    {
                        "id": 2, "title": "Dishes", "type": "multiple",
                        "choices": [{ "id": 1, "label": "Soup" }, { "id": 2, "label": "Salad" }]
                    }
                ]
            })),
            &allocs,
        )
        .unwrap();

        assert_eq!(form.name, "Lunch");
        let subject = form.subjects().at(SubjectId(1)).unwrap();
        assert_eq!(subject.answers.len(), 1);
        assert_eq!(
            subject.answers[&QuestionId(2)],
            Answer::closed(QuestionId(2), [ChoiceId(1)])
        );

        // The clone taken before the edit still sees the old graph.
        assert_eq!(before.questions().len(), 2);
        let old = before.subjects().at(SubjectId(1)).unwrap();
        assert_eq!(old.answers[&QuestionId(2)].selected().unwrap().len(), 2);
    }

    #[test]
    fn put_and_remove_subject() {
        let allocs = Allocators::new();
        let mut form = sample(&allocs);
        let mut fresh = form.new_subject();
        fresh.answers.clear();
        let id = fresh.id;
        form.put_subject(fresh);
        assert_eq!(form.subjects().at(id).unwrap().answers.len(), 2);
        assert!(form.remove_subject(id).is_some());
        assert!(form.subjects().at(id).is_err());
    }
}
