use patchvault_types::{PatchId, PatchSetId};

use crate::validate::ValidationError;

/// Errors from patch store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A patch set with this identity already exists.
    #[error("patch set already exists: {0}")]
    DuplicateSet(PatchSetId),

    /// A patch with this identity already exists in the target set.
    #[error("patch already exists: {0}")]
    DuplicatePatch(PatchId),

    /// The referenced patch set does not exist.
    #[error("patch set not found: {0}")]
    SetNotFound(PatchSetId),

    /// The referenced patch does not exist in the target set.
    #[error("patch not found: {0}")]
    PatchNotFound(PatchId),

    /// Structural validation failed; carries the first failing rule.
    #[error("invalid patch set: {0}")]
    Invalid(#[from] ValidationError),

    /// Encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the persistence layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
