//! Conversions between a [`SurveyGraph`] and flat storage rows.
//!
//! [`decompose`] flattens a graph into [`SnapshotRows`]; [`load_snapshot`]
//! rebuilds a graph from whatever a [`RowStore`] holds, materializing a
//! default answer for every question a subject has no stored answer for.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use survey_core::{
    Allocators, Answer, Answers, Choice, ChoiceId, ClosedMode, Form, FormId, IndexedCollection,
    Question, QuestionId, QuestionKind, QuestionType, Subject, SurveyGraph,
};

use crate::error::StorageError;
use crate::filter::Filter;
use crate::rows::{ChoiceRow, ClosedAnswerRow, FormRow, OpenedAnswerRow, QuestionRow, SubjectRow};
use crate::traits::RowStore;

/// Every row of a graph, grouped by kind in graph order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRows {
    pub forms: Vec<FormRow>,
    pub questions: Vec<QuestionRow>,
    pub choices: Vec<ChoiceRow>,
    pub subjects: Vec<SubjectRow>,
    pub opened_answers: Vec<OpenedAnswerRow>,
    /// One row per selected choice.
    pub closed_answers: Vec<ClosedAnswerRow>,
}

impl SnapshotRows {
    pub fn len(&self) -> usize {
        self.forms.len()
            + self.questions.len()
            + self.choices.len()
            + self.subjects.len()
            + self.opened_answers.len()
            + self.closed_answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flattens `graph` into rows.
pub fn decompose(graph: &SurveyGraph) -> SnapshotRows {
    let mut rows = SnapshotRows::default();

    for form in graph.forms().values() {
        rows.forms.push(FormRow {
            id: form.id,
            name: form.name.clone(),
            description: form.description.clone(),
            created_at: form.created_at,
            modified_at: form.modified_at,
        });

        for question in form.questions().values() {
            let word_count = match &question.kind {
                QuestionKind::Opened { word_count } => Some(*word_count),
                QuestionKind::Closed { .. } => None,
            };
            rows.questions.push(QuestionRow {
                id: question.id,
                form: form.id,
                question_type: question.question_type().as_str().to_string(),
                title: question.title.clone(),
                word_count,
                modified_at: question.modified_at,
            });
            for choice in question.choices().into_iter().flat_map(|c| c.values()) {
                rows.choices.push(ChoiceRow {
                    id: choice.id,
                    question: question.id,
                    label: choice.label.clone(),
                    modified_at: choice.modified_at,
                });
            }
        }

        for subject in form.subjects().values() {
            rows.subjects.push(SubjectRow {
                id: subject.id,
                form: form.id,
                valid: subject.valid,
                modified_at: subject.modified_at,
            });
            for answer in subject.answers.values() {
                if let Some(words) = answer.words() {
                    rows.opened_answers.push(OpenedAnswerRow {
                        subject: subject.id,
                        question: answer.question,
                        words: words.to_vec(),
                        modified_at: subject.modified_at,
                    });
                }
                for choice in answer.selected().into_iter().flatten() {
                    rows.closed_answers.push(ClosedAnswerRow {
                        subject: subject.id,
                        question: answer.question,
                        choice: *choice,
                        modified_at: subject.modified_at,
                    });
                }
            }
        }
    }

    rows
}

/// Replaces the store's content with `graph`.
pub fn save_snapshot<S: RowStore>(store: &mut S, graph: &SurveyGraph) -> Result<(), StorageError> {
    let rows = decompose(graph);
    store.replace_snapshot(&rows)?;
    info!(
        forms = rows.forms.len(),
        questions = rows.questions.len(),
        subjects = rows.subjects.len(),
        rows = rows.len(),
        "saved survey snapshot"
    );
    Ok(())
}

/// Rebuilds a graph from every row in `store`.
///
/// A question row with an unrecognized type tag aborts the load. Answer
/// rows that no longer fit (unknown question, wrong variant, or a choice
/// the question does not own) are dropped.
pub fn load_snapshot<S: RowStore>(store: &S) -> Result<SurveyGraph, StorageError> {
    let mut graph = SurveyGraph::new();
    let allocators = graph.allocators().clone();

    for row in store.search::<FormRow>(&Filter::all())? {
        let mut form = Form::new(row.id, row.name, &allocators);
        form.description = row.description;
        form.created_at = row.created_at;
        form.modified_at = row.modified_at;

        form.set_questions(load_questions(store, row.id, &allocators)?);
        let subjects = load_subjects(store, &form, &allocators)?;
        form.set_subjects(subjects);
        graph.insert_form(form);
    }

    info!(
        forms = graph.forms().len(),
        questions = graph.question_count(),
        subjects = graph.subject_count(),
        "loaded survey snapshot"
    );
    Ok(graph)
}

fn load_questions<S: RowStore>(
    store: &S,
    form: FormId,
    allocators: &Allocators,
) -> Result<IndexedCollection<Question>, StorageError> {
    let mut questions = IndexedCollection::new(allocators.questions.clone());
    for row in store.search::<QuestionRow>(&Filter::form(form))? {
        let kind = match row.question_type.parse::<QuestionType>()? {
            QuestionType::Opened => QuestionKind::Opened {
                word_count: row.word_count.unwrap_or(0),
            },
            QuestionType::Unique => QuestionKind::Closed {
                mode: ClosedMode::Unique,
                choices: load_choices(store, row.id, allocators)?,
            },
            QuestionType::Multiple => QuestionKind::Closed {
                mode: ClosedMode::Multiple,
                choices: load_choices(store, row.id, allocators)?,
            },
        };
        questions.insert(Question {
            id: row.id,
            title: row.title,
            modified_at: row.modified_at,
            kind,
        });
    }
    Ok(questions)
}

fn load_choices<S: RowStore>(
    store: &S,
    question: QuestionId,
    allocators: &Allocators,
) -> Result<IndexedCollection<Choice>, StorageError> {
    let choices = store
        .search::<ChoiceRow>(&Filter::question(question))?
        .into_iter()
        .map(|row| Choice {
            id: row.id,
            label: row.label,
            modified_at: row.modified_at,
        });
    Ok(IndexedCollection::from_entities(allocators.choices.clone(), choices))
}

fn load_subjects<S: RowStore>(
    store: &S,
    form: &Form,
    allocators: &Allocators,
) -> Result<IndexedCollection<Subject>, StorageError> {
    let questions = form.questions();
    let mut subjects = IndexedCollection::new(allocators.subjects.clone());

    for row in store.search::<SubjectRow>(&Filter::form(form.id))? {
        let mut opened: HashMap<QuestionId, Vec<String>> = store
            .search::<OpenedAnswerRow>(&Filter::subject(row.id))?
            .into_iter()
            .map(|a| (a.question, a.words))
            .collect();
        let selected: HashSet<(QuestionId, ChoiceId)> = store
            .search::<ClosedAnswerRow>(&Filter::subject(row.id))?
            .into_iter()
            .map(|a| (a.question, a.choice))
            .collect();

        let mut answers = Answers::with_capacity(questions.len());
        let mut matched = 0;
        for (id, question) in questions.iter() {
            let answer = match &question.kind {
                QuestionKind::Opened { .. } => match opened.remove(&id) {
                    Some(words) => Answer::opened(id, words),
                    None => Answer::default_for(question),
                },
                QuestionKind::Closed { choices, .. } => {
                    let picked: Vec<ChoiceId> = choices
                        .ids()
                        .filter(|choice| selected.contains(&(id, *choice)))
                        .collect();
                    matched += picked.len();
                    Answer::closed(id, picked)
                }
            };
            answers.insert(id, answer);
        }

        let dropped = opened.len() + selected.len() - matched;
        if dropped > 0 {
            debug!(subject = %row.id, dropped, "dropped stale answer rows");
        }

        subjects.insert(Subject {
            id: row.id,
            valid: row.valid,
            modified_at: row.modified_at,
            answers,
        });
    }
    Ok(subjects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::Utc;
    use survey_core::SubjectId;

    fn sample_graph() -> SurveyGraph {
        let mut graph = SurveyGraph::new();
        let allocators = graph.allocators().clone();
        let mut form = Form::new(FormId(1), "Feedback", &allocators);

        let mut choices = IndexedCollection::new(allocators.choices.clone());
        for (id, label) in [(1, "red"), (2, "green"), (3, "blue")] {
            choices.insert(Choice::new(ChoiceId(id), label));
        }
        let mut questions = IndexedCollection::new(allocators.questions.clone());
        questions.insert(Question::opened(QuestionId(1), "Why?", 50));
        questions.insert(Question::closed(
            QuestionId(2),
            "Colors",
            ClosedMode::Multiple,
            choices,
        ));
        form.set_questions(questions);

        let mut subject = form.new_subject();
        subject
            .answers
            .insert(QuestionId(1), Answer::from_text(QuestionId(1), "it is fast"));
        subject
            .answers
            .insert(QuestionId(2), Answer::closed(QuestionId(2), [ChoiceId(1), ChoiceId(3)]));
        form.put_subject(subject);

        graph.insert_form(form);
        graph
    }

    #[test]
    fn decompose_writes_one_closed_row_per_selection() {
        let rows = decompose(&sample_graph());
        assert_eq!(rows.forms.len(), 1);
        assert_eq!(rows.questions.len(), 2);
        assert_eq!(rows.choices.len(), 3);
        assert_eq!(rows.subjects.len(), 1);
        assert_eq!(rows.opened_answers.len(), 1);
        assert_eq!(rows.closed_answers.len(), 2);
        assert_eq!(rows.questions[1].question_type, "multiple");
        assert_eq!(rows.questions[1].word_count, None);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let graph = sample_graph();
        let mut store = InMemoryStore::new();
        save_snapshot(&mut store, &graph).unwrap();
        let loaded = load_snapshot(&store).unwrap();
        assert_eq!(loaded, graph);
    }

    #[test]
    fn loaded_allocators_continue_after_stored_ids() {
        let mut store = InMemoryStore::new();
        save_snapshot(&mut store, &sample_graph()).unwrap();
        let loaded = load_snapshot(&store).unwrap();
        assert_eq!(loaded.allocators().forms.take_id(), FormId(2));
        assert_eq!(loaded.allocators().choices.take_id(), ChoiceId(4));
    }

    #[test]
    fn removed_choices_are_dropped_from_selections() {
        let mut store = InMemoryStore::new();
        save_snapshot(&mut store, &sample_graph()).unwrap();

        // Leave only choices 1 and 3 on the question, but select 1, 2, 3.
        let mut rows = decompose(&sample_graph());
        rows.choices.retain(|c| c.id != ChoiceId(2));
        rows.closed_answers.push(ClosedAnswerRow {
            subject: SubjectId(1),
            question: QuestionId(2),
            choice: ChoiceId(2),
            modified_at: Utc::now(),
        });
        store.replace_snapshot(&rows).unwrap();

        let graph = load_snapshot(&store).unwrap();
        let (_, subject) = graph.find_subject(SubjectId(1)).unwrap();
        let picked: Vec<_> = subject.answers[&QuestionId(2)]
            .selected()
            .unwrap()
            .iter()
            .copied()
            .collect();
        assert_eq!(picked, vec![ChoiceId(1), ChoiceId(3)]);
    }

    #[test]
    fn unknown_question_type_aborts_the_load() {
        let mut store = InMemoryStore::new();
        let mut rows = decompose(&sample_graph());
        rows.questions[0].question_type = "ranking".into();
        store.replace_snapshot(&rows).unwrap();
        let err = load_snapshot(&store).unwrap_err();
        assert!(err.is_invalid_entity());
    }

    #[test]
    fn missing_answer_rows_become_defaults() {
        let mut store = InMemoryStore::new();
        let mut rows = decompose(&sample_graph());
        rows.opened_answers.clear();
        rows.closed_answers.clear();
        store.replace_snapshot(&rows).unwrap();

        let graph = load_snapshot(&store).unwrap();
        let (_, subject) = graph.find_subject(SubjectId(1)).unwrap();
        assert_eq!(subject.answers.len(), 2);
        assert!(subject.answers[&QuestionId(1)].words().unwrap().is_empty());
        assert!(subject.answers[&QuestionId(2)].selected().unwrap().is_empty());
    }
}
