//! Pure structural validators for patch sets and patches.
//!
//! Validation runs before every commit in [`PatchStore`] and has no side
//! effects. Rules are checked in a fixed order and the first failure wins;
//! the returned [`ValidationError`] carries exactly one reason.
//!
//! [`PatchStore`]: crate::store::PatchStore

use patchvault_types::{Patch, PatchSet};

/// A single failed validation rule.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("patch set name must not be empty")]
    EmptySetName,

    #[error("patch name must not be empty")]
    EmptyPatchName,

    #[error("patched bytes must not be empty")]
    EmptyPatchedBytes,

    #[error("original bytes must not be empty")]
    EmptyOriginalBytes,

    /// Patches overwrite in place and never resize the binary.
    #[error("byte length mismatch: {original} original vs {patched} patched")]
    LengthMismatch { original: usize, patched: usize },

    #[error("target identity mismatch: patch expects {patch}, set targets {set}")]
    TargetIdentityMismatch { patch: String, set: String },

    #[error("target architecture mismatch: patch expects {patch}, set targets {set}")]
    TargetArchMismatch { patch: String, set: String },
}

/// Validate a whole patch set: non-empty name, then every contained patch
/// against the set's target constraints.
pub fn validate_set(set: &PatchSet) -> Result<(), ValidationError> {
    if set.name.trim().is_empty() {
        return Err(ValidationError::EmptySetName);
    }
    for patch in &set.patches {
        validate_patch(patch, set)?;
    }
    Ok(())
}

/// Validate one patch relative to its owning set.
///
/// Rule order is fixed: name, patched bytes, original bytes, equal length,
/// target identity, target architecture. Target fields are only compared
/// when both the patch and the set declare one.
pub fn validate_patch(patch: &Patch, set: &PatchSet) -> Result<(), ValidationError> {
    if patch.name.trim().is_empty() {
        return Err(ValidationError::EmptyPatchName);
    }
    if patch.patched_bytes.is_empty() {
        return Err(ValidationError::EmptyPatchedBytes);
    }
    if patch.original_bytes.is_empty() {
        return Err(ValidationError::EmptyOriginalBytes);
    }
    if patch.original_bytes.len() != patch.patched_bytes.len() {
        return Err(ValidationError::LengthMismatch {
            original: patch.original_bytes.len(),
            patched: patch.patched_bytes.len(),
        });
    }
    if let (Some(expected), Some(target)) = (&patch.expected_target_id, &set.target_identity) {
        if expected != target {
            return Err(ValidationError::TargetIdentityMismatch {
                patch: expected.clone(),
                set: target.clone(),
            });
        }
    }
    if let (Some(expected), Some(target)) = (&patch.expected_target_arch, &set.target_arch) {
        if expected != target {
            return Err(ValidationError::TargetArchMismatch {
                patch: expected.clone(),
                set: target.clone(),
            });
        }
    }
    Ok(())
}
