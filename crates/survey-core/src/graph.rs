//! SurveyGraph: the root of the in-memory domain graph.
//!
//! [`SurveyGraph`] owns the per-kind [`Allocators`] and the top-level forms
//! collection. Everything else (questions, choices, subjects, answers)
//! lives inside a form, so erasing a form removes its whole subtree.

use std::collections::HashMap;

use crate::collection::IndexedCollection;
use crate::error::CoreError;
use crate::form::Form;
use crate::id::{Allocators, ChoiceId, FormId, QuestionId, SubjectId};
use crate::subject::Subject;

/// A complete snapshot of every form and what it owns.
#[derive(Debug, Clone)]
pub struct SurveyGraph {
    allocators: Allocators,
    forms: IndexedCollection<Form>,
}

impl SurveyGraph {
    /// An empty graph with fresh allocators.
    pub fn new() -> Self {
        let allocators = Allocators::new();
        let forms = IndexedCollection::new(allocators.forms.clone());
        SurveyGraph { allocators, forms }
    }

    pub fn allocators(&self) -> &Allocators {
        &self.allocators
    }

    pub fn forms(&self) -> &IndexedCollection<Form> {
        &self.forms
    }

    pub fn form(&self, id: FormId) -> Result<&Form, CoreError> {
        self.forms.at(id)
    }

    /// Inserts or replaces a form without checking the ids it carries.
    /// Used where ids are already known to be unique, such as a load.
    pub fn insert_form(&mut self, form: Form) {
        self.forms.insert(form);
    }

    /// Inserts or replaces a form after checking that no question, choice,
    /// or subject id it carries is owned by another form, and that no
    /// choice id appears under two of its questions.
    pub fn put_form(&mut self, form: Form) -> Result<(), CoreError> {
        self.check_ownership(&form)?;
        self.forms.insert(form);
        Ok(())
    }

    fn check_ownership(&self, form: &Form) -> Result<(), CoreError> {
        let mut choice_owner: HashMap<ChoiceId, QuestionId> = HashMap::new();
        for question in form.questions().values() {
            for choice in question.choices().into_iter().flat_map(|c| c.ids()) {
                if let Some(first) = choice_owner.insert(choice, question.id) {
                    return Err(conflict(format!(
                        "choice {choice} is listed under questions {first} and {}",
                        question.id
                    )));
                }
            }
        }

        for other in self.forms.values().filter(|f| f.id != form.id) {
            for question in other.questions().values() {
                if form.questions().contains(question.id) {
                    return Err(conflict(format!(
                        "question {} belongs to form {}",
                        question.id, other.id
                    )));
                }
                for choice in question.choices().into_iter().flat_map(|c| c.ids()) {
                    if choice_owner.contains_key(&choice) {
                        return Err(conflict(format!(
                            "choice {choice} belongs to question {} of form {}",
                            question.id, other.id
                        )));
                    }
                }
            }
            if let Some(subject) = other.subjects().ids().find(|id| form.subjects().contains(*id)) {
                return Err(conflict(format!(
                    "subject {subject} belongs to form {}",
                    other.id
                )));
            }
        }
        Ok(())
    }

    /// Removes a form and, with it, all of its questions, choices,
    /// subjects, and answers.
    pub fn erase_form(&mut self, id: FormId) -> Option<Form> {
        self.forms.erase(id)
    }

    /// Finds a subject by scanning every form's subjects.
    pub fn find_subject(&self, id: SubjectId) -> Option<(&Form, &Subject)> {
        self.forms
            .values()
            .find_map(|form| form.subjects().find(id).map(|subject| (form, subject)))
    }

    pub fn question_count(&self) -> usize {
        self.forms.values().map(|f| f.questions().len()).sum()
    }

    pub fn subject_count(&self) -> usize {
        self.forms.values().map(|f| f.subjects().len()).sum()
    }
}

impl Default for SurveyGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict(reason: String) -> CoreError {
    CoreError::InconsistentReference { reason }
}

// Allocator state is bookkeeping, not content.
impl PartialEq for SurveyGraph {
    fn eq(&self, other: &Self) -> bool {
        self.forms == other.forms
    }
}
