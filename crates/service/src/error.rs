//! Typed error enum for the service layer.
//!
//! Unifies storage and recognition failures with the request-level rejections
//! the services raise themselves, so callers match on failure modes instead of
//! parsing messages.

use notescan_storage::StorageError;
use notescan_vision::VisionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage operation failed (DB, not found, closed, unsupported).
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Recognition failed for a reason that is not absorbed per file.
    #[error("vision: {0}")]
    Vision(#[from] VisionError),

    /// Caller provided invalid input (no files, empty serial, bad format).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An edit would give a record a serial another record already owns.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Destructive action attempted without the confirmation phrase.
    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    /// A wipe is in flight, or work is in flight when a wipe was requested.
    #[error("registry busy: {0}")]
    Busy(&'static str),

    /// Blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

impl ServiceError {
    /// Whether this error is likely transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Busy(_) => true,
            _ => false,
        }
    }

    /// Whether this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::Storage(StorageError::NotFound { entity, id: id.to_string() })
    }
}
