//! Service error type.

use survey_core::CoreError;
use survey_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A lookup or an incoming map was rejected by the domain model.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Loading or saving the snapshot failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::Core(e) => e.is_not_found(),
            ServiceError::Storage(_) => false,
        }
    }

    /// True for failures of the storage backend itself, as opposed to bad
    /// input or stored rows the domain model rejects.
    pub fn is_storage(&self) -> bool {
        matches!(self, ServiceError::Storage(e) if !matches!(e, StorageError::Core(_)))
    }
}
