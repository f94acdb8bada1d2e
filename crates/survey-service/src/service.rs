//! DataService: the single coordinator between callers and the survey
//! graph.
//!
//! Every query and mutation runs against the in-memory [`SurveyGraph`].
//! The store is touched only by [`DataService::load_data`] and
//! [`DataService::flush`], each of which moves the whole snapshot.

use serde_json::Value;
use tracing::{debug, error, info};

use survey_core::map::{self, EntityMap};
use survey_core::{
    ChoiceId, CoreError, Form, FormId, QuestionId, Subject, SubjectId, SurveyGraph,
};
use survey_storage::{load_snapshot, save_snapshot, InMemoryStore, RowStore, SqliteStore};

use crate::config::ServiceConfig;
use crate::error::ServiceError;

/// The graph facade. Single-threaded: callers that share it across threads
/// must serialize access themselves.
pub struct DataService<S: RowStore> {
    graph: SurveyGraph,
    store: S,
    config: ServiceConfig,
    /// Set once [`DataService::shutdown`] has flushed.
    closed: bool,
}

impl DataService<SqliteStore> {
    /// Opens the SQLite database at `config.db_path` and loads it.
    pub fn open(config: ServiceConfig) -> Result<Self, ServiceError> {
        let store = SqliteStore::new(&config.db_path)?;
        Self::new(store, config)
    }
}

impl DataService<InMemoryStore> {
    /// An empty service backed by an in-memory store that is never flushed
    /// on drop.
    pub fn in_memory() -> Self {
        DataService {
            graph: SurveyGraph::new(),
            store: InMemoryStore::new(),
            config: ServiceConfig {
                flush_on_drop: false,
                ..ServiceConfig::default()
            },
            closed: false,
        }
    }
}

impl<S: RowStore> DataService<S> {
    /// Wraps `store` and loads its snapshot.
    pub fn new(store: S, config: ServiceConfig) -> Result<Self, ServiceError> {
        let graph = load_snapshot(&store)?;
        Ok(DataService {
            graph,
            store,
            config,
            closed: false,
        })
    }

    pub fn graph(&self) -> &SurveyGraph {
        &self.graph
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Replaces the in-memory graph with the store's snapshot.
    ///
    /// On failure the current graph is kept.
    pub fn load_data(&mut self) -> Result<(), ServiceError> {
        self.graph = load_snapshot(&self.store)?;
        Ok(())
    }

    /// Writes the whole graph to the store, replacing what it held.
    pub fn flush(&mut self) -> Result<(), ServiceError> {
        save_snapshot(&mut self.store, &self.graph)?;
        Ok(())
    }

    /// Flushes and closes the service. Dropping it afterwards does not
    /// flush again.
    pub fn shutdown(mut self) -> Result<(), ServiceError> {
        let result = self.flush();
        self.closed = true;
        if result.is_ok() {
            info!("data service shut down");
        }
        result
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Summaries of every form, keyed by id.
    pub fn list_forms(&self) -> EntityMap {
        self.graph
            .forms()
            .values()
            .map(|form| (form.id.to_string(), Value::Object(form.to_tiny_map())))
            .collect()
    }

    /// Summaries of the subjects of `form`, keyed by id.
    pub fn list_subjects(&self, form: FormId) -> Result<EntityMap, ServiceError> {
        let form = self.graph.form(form)?;
        Ok(form
            .subjects()
            .values()
            .map(|s| (s.id.to_string(), Value::Object(s.to_tiny_map())))
            .collect())
    }

    pub fn get_form(&self, id: FormId) -> Result<EntityMap, ServiceError> {
        Ok(self.graph.form(id)?.to_map())
    }

    /// Looks a subject up across all forms.
    pub fn get_subject(&self, id: SubjectId) -> Result<EntityMap, ServiceError> {
        let (_, subject) = self
            .graph
            .find_subject(id)
            .ok_or_else(|| CoreError::not_found(id))?;
        Ok(subject.to_map())
    }

    /// A fresh, unsaved subject of `form` with a default answer per
    /// question. Its id is drawn from the allocator.
    pub fn get_new_subject(&self, form: FormId) -> Result<EntityMap, ServiceError> {
        Ok(self.graph.form(form)?.new_subject().to_map())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Inserts a form, or updates it when the map names an existing id.
    ///
    /// Fails with [`CoreError::InconsistentReference`] if the map carries a
    /// question, choice, or subject id owned by another form.
    pub fn save_form(&mut self, m: &EntityMap) -> Result<FormId, ServiceError> {
        let allocators = self.graph.allocators().clone();
        let existing = map::optional_id::<FormId>(m, map::ID, "form")?
            .and_then(|id| self.graph.forms().find(id));
        let form = match existing {
            Some(current) => {
                let mut form = current.clone();
                form.assign_from_map(m, &allocators)?;
                form
            }
            None => Form::from_map(m, &allocators)?,
        };
        let id = form.id;
        self.graph.put_form(form)?;
        debug!(form = %id, "saved form");
        Ok(id)
    }

    /// Inserts a subject into `form`, or updates it when the map names one
    /// of the form's subjects. An id owned by another form's subject is
    /// rejected.
    pub fn save_subject(&mut self, form: FormId, m: &EntityMap) -> Result<SubjectId, ServiceError> {
        let mut owner = self.graph.form(form)?.clone();
        let requested = map::optional_id::<SubjectId>(m, map::ID, "subject")?;
        if let Some((other, _)) = requested.and_then(|id| self.graph.find_subject(id)) {
            if other.id != form {
                return Err(CoreError::InconsistentReference {
                    reason: format!("subject belongs to form {}", other.id),
                }
                .into());
            }
        }
        let existing = requested.and_then(|id| owner.subjects().find(id));
        let subject = match existing {
            Some(current) => {
                let mut subject = current.clone();
                subject.assign_from_map(m, owner.questions())?;
                subject
            }
            None => Subject::from_map(m, owner.questions(), owner.subjects().allocator())?,
        };
        let id = subject.id;
        owner.put_subject(subject);
        self.graph.put_form(owner)?;
        debug!(form = %form, subject = %id, "saved subject");
        Ok(id)
    }

    /// Removes a form with everything it owns. Returns false if it did not
    /// exist.
    pub fn delete_form(&mut self, id: FormId) -> bool {
        let removed = self.graph.erase_form(id).is_some();
        if removed {
            debug!(form = %id, "deleted form");
        }
        removed
    }

    /// Removes a subject from whichever form owns it. Returns false if no
    /// form does.
    pub fn delete_subject(&mut self, id: SubjectId) -> bool {
        let Some((form, _)) = self.graph.find_subject(id) else {
            return false;
        };
        let mut owner = form.clone();
        owner.remove_subject(id);
        self.graph.insert_form(owner);
        debug!(subject = %id, "deleted subject");
        true
    }

    // -----------------------------------------------------------------------
    // Id allocation
    // -----------------------------------------------------------------------

    pub fn take_form_id(&self) -> FormId {
        self.graph.allocators().forms.take_id()
    }

    pub fn take_question_id(&self) -> QuestionId {
        self.graph.allocators().questions.take_id()
    }

    pub fn take_choice_id(&self) -> ChoiceId {
        self.graph.allocators().choices.take_id()
    }

    pub fn take_subject_id(&self) -> SubjectId {
        self.graph.allocators().subjects.take_id()
    }
}

impl<S: RowStore> Drop for DataService<S> {
    fn drop(&mut self) {
        if self.closed || !self.config.flush_on_drop {
            return;
        }
        if let Err(e) = self.flush() {
            error!(error = %e, "failed to flush survey data on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> EntityMap {
        value.as_object().unwrap().clone()
    }

    fn service_with_form() -> (DataService<InMemoryStore>, FormId) {
        let mut service = DataService::in_memory();
        let id = service
            .save_form(&obj(json!({
                "name": "Team",
                "questions": [
                    { "title": "Mood", "type": "unique", "choices": [{ "label": "good" }, { "label": "bad" }] },
                    { "title": "Notes", "type": "opened", "word_count": 30 }
                ]
            })))
            .unwrap();
        (service, id)
    }

    #[test]
    fn save_form_assigns_fresh_id_then_updates_in_place() {
        let (mut service, id) = service_with_form();
        assert_eq!(id, FormId(1));

        let again = service
            .save_form(&obj(json!({ "id": 1, "description": "weekly" })))
            .unwrap();
        assert_eq!(again, id);
        let form = service.get_form(id).unwrap();
        assert_eq!(form["name"], "Team");
        assert_eq!(form["description"], "weekly");
        assert_eq!(form["questions"].as_array().unwrap().len(), 2);
        assert_eq!(service.list_forms().len(), 1);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let service = DataService::in_memory();
        assert!(service.get_form(FormId(9)).unwrap_err().is_not_found());
        assert!(service.get_subject(SubjectId(9)).unwrap_err().is_not_found());
        assert!(service.list_subjects(FormId(9)).unwrap_err().is_not_found());
    }

    #[test]
    fn new_subject_is_not_stored() {
        let (service, form) = service_with_form();
        let subject = service.get_new_subject(form).unwrap();
        assert_eq!(subject["answers"].as_array().unwrap().len(), 2);
        assert!(service.list_subjects(form).unwrap().is_empty());
    }

    #[test]
    fn delete_subject_reports_absence() {
        let (mut service, form) = service_with_form();
        let id = service.save_subject(form, &obj(json!({}))).unwrap();
        assert!(service.delete_subject(id));
        assert!(!service.delete_subject(id));
        assert!(!service.delete_form(FormId(42)));
    }

    #[test]
    fn take_ids_follow_the_graph() {
        let (service, _) = service_with_form();
        assert_eq!(service.take_form_id(), FormId(2));
        assert_eq!(service.take_question_id(), QuestionId(3));
        assert_eq!(service.take_choice_id(), ChoiceId(3));
        assert_eq!(service.take_subject_id(), SubjectId(1));
    }
}
