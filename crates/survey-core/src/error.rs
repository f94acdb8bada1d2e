//! Core error types for survey-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! lookups, flat-map decoding, and cross-entity references.

use thiserror::Error;

use crate::id::EntityKind;

/// Core errors produced by the survey-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier is absent from the collection it was looked up in.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: u32 },

    /// A row or flat map could not be turned into an entity.
    #[error("invalid {entity}: {reason}")]
    InvalidEntity {
        entity: &'static str,
        reason: String,
    },

    /// An answer refers to a question or choice the form does not define.
    #[error("inconsistent reference: {reason}")]
    InconsistentReference { reason: String },
}

impl CoreError {
    pub fn not_found<I: crate::id::Identifier>(id: I) -> Self {
        CoreError::NotFound {
            kind: I::KIND,
            id: id.raw(),
        }
    }

    pub fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidEntity {
            entity,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}
