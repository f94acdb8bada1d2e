//! Copy-on-write, identifier-indexed entity collections.
//!
//! [`IndexedCollection`] maps an entity's identifier to the entity itself.
//! Cloning a collection is an `Arc` bump: both handles read the same
//! backing map until one of them is structurally mutated, at which point
//! that handle forks a private copy (`Arc::make_mut`). Sibling handles keep
//! the pre-mutation view.
//!
//! Each collection also carries the [`IdAllocator`] for its kind, so new
//! entities can draw identifiers that are unique across every collection of
//! that kind in the graph.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::id::{IdAllocator, Identifier};

/// An entity stored in an [`IndexedCollection`], keyed by its own id.
pub trait Entity: Clone {
    type Id: Identifier;

    fn id(&self) -> Self::Id;
}

/// Identifier-indexed, insertion-ordered, copy-on-write container.
pub struct IndexedCollection<T: Entity> {
    entries: Arc<IndexMap<T::Id, T>>,
    allocator: IdAllocator<T::Id>,
}

impl<T: Entity> IndexedCollection<T> {
    /// Creates an empty collection drawing ids from `allocator`.
    pub fn new(allocator: IdAllocator<T::Id>) -> Self {
        IndexedCollection {
            entries: Arc::new(IndexMap::new()),
            allocator,
        }
    }

    /// Creates a collection from `entities`, in iteration order.
    pub fn from_entities(
        allocator: IdAllocator<T::Id>,
        entities: impl IntoIterator<Item = T>,
    ) -> Self {
        let mut collection = Self::new(allocator);
        for entity in entities {
            collection.insert(entity);
        }
        collection
    }

    /// Inserts `entity` under its own id, replacing any previous entry in
    /// place. The id is reserved in the allocator.
    pub fn insert(&mut self, entity: T) {
        let id = entity.id();
        self.allocator.reserve(id);
        Arc::make_mut(&mut self.entries).insert(id, entity);
    }

    /// Removes the entry for `id`, keeping the order of the others.
    /// Returns the removed entity; absent ids are a no-op.
    pub fn erase(&mut self, id: T::Id) -> Option<T> {
        if !self.entries.contains_key(&id) {
            return None;
        }
        Arc::make_mut(&mut self.entries).shift_remove(&id)
    }

    pub fn find(&self, id: T::Id) -> Option<&T> {
        self.entries.get(&id)
    }

    /// Like [`find`](Self::find), failing with [`CoreError::NotFound`].
    pub fn at(&self, id: T::Id) -> Result<&T, CoreError> {
        self.find(id).ok_or_else(|| CoreError::not_found(id))
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.entries.contains_key(&id)
    }

    /// Iterates `(id, entity)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (T::Id, &T)> + '_ {
        self.entries.iter().map(|(id, entity)| (*id, entity))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = T::Id> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draws a fresh identifier from this collection's allocator.
    pub fn take_id(&self) -> T::Id {
        self.allocator.take_id()
    }

    pub fn allocator(&self) -> &IdAllocator<T::Id> {
        &self.allocator
    }

    /// Returns true while both handles still read the same backing map.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<T: Entity> Clone for IndexedCollection<T> {
    fn clone(&self) -> Self {
        IndexedCollection {
            entries: Arc::clone(&self.entries),
            allocator: self.allocator.clone(),
        }
    }
}

// Order-sensitive: two question lists with the same entries in a different
// order are different forms.
impl<T: Entity + PartialEq> PartialEq for IndexedCollection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl<T: Entity + fmt::Debug> fmt::Debug for IndexedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<'a, T: Entity> IntoIterator for &'a IndexedCollection<T> {
    type Item = (&'a T::Id, &'a T);
    type IntoIter = indexmap::map::Iter<'a, T::Id, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
