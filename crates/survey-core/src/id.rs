//! Stable ID newtypes for survey entities, plus the per-kind allocator.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `QuestionId` cannot be accidentally used where a `ChoiceId` is
//! expected. Each kind draws fresh values from its own [`IdAllocator`].

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The four entity kinds that carry their own identifier space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Form,
    Question,
    Choice,
    Subject,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Form => "form",
            EntityKind::Question => "question",
            EntityKind::Choice => "choice",
            EntityKind::Subject => "subject",
        };
        f.write_str(name)
    }
}

/// Common behavior of every identifier newtype.
pub trait Identifier: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display {
    /// The entity kind this identifier names.
    const KIND: EntityKind;

    /// Wraps a raw value.
    fn from_raw(raw: u32) -> Self;

    /// Returns the raw value.
    fn raw(self) -> u32;
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl Identifier for $name {
            const KIND: EntityKind = EntityKind::$kind;

            fn from_raw(raw: u32) -> Self {
                $name(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id! {
    /// Identity of a form within the top-level forms collection.
    FormId => Form
}

define_id! {
    /// Identity of a question. Unique across all forms.
    QuestionId => Question
}

define_id! {
    /// Identity of a choice. Unique across all closed questions.
    ChoiceId => Choice
}

define_id! {
    /// Identity of a subject (one respondent's submission).
    SubjectId => Subject
}

/// Monotonic identifier source for one entity kind.
///
/// Cloning an allocator yields a handle onto the same counter, so every
/// collection of a kind draws from one sequence. Values start at 1 and are
/// never handed out twice by the same counter.
pub struct IdAllocator<I> {
    next: Arc<AtomicU32>,
    _kind: PhantomData<fn() -> I>,
}

impl<I: Identifier> IdAllocator<I> {
    /// Creates an allocator with a fresh, independent counter.
    pub fn new() -> Self {
        IdAllocator {
            next: Arc::new(AtomicU32::new(1)),
            _kind: PhantomData,
        }
    }

    /// Returns an identifier never previously returned by this counter.
    pub fn take_id(&self) -> I {
        I::from_raw(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Advances the counter past `id`, so an identifier that entered the
    /// graph from outside (storage, a flat map) is never issued again.
    pub fn reserve(&self, id: I) {
        self.next
            .fetch_max(id.raw().saturating_add(1), Ordering::Relaxed);
    }

    /// The value the next call to [`take_id`](Self::take_id) will return.
    pub fn peek(&self) -> I {
        I::from_raw(self.next.load(Ordering::Relaxed))
    }

    /// Returns true if both handles share one counter.
    pub fn same_counter(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.next, &other.next)
    }
}

impl<I: Identifier> Default for IdAllocator<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Clone for IdAllocator<I> {
    fn clone(&self) -> Self {
        IdAllocator {
            next: Arc::clone(&self.next),
            _kind: PhantomData,
        }
    }
}

impl<I: Identifier> fmt::Debug for IdAllocator<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator")
            .field("kind", &I::KIND)
            .field("next", &self.next.load(Ordering::Relaxed))
            .finish()
    }
}

/// One allocator per entity kind, owned by the top-level graph.
#[derive(Debug, Clone, Default)]
pub struct Allocators {
    pub forms: IdAllocator<FormId>,
    pub questions: IdAllocator<QuestionId>,
    pub choices: IdAllocator<ChoiceId>,
    pub subjects: IdAllocator<SubjectId>,
}

impl Allocators {
    pub fn new() -> Self {
        Self::default()
    }
}
