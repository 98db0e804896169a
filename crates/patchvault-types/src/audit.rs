use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AuditEntryId, PatchId};

/// Reserved metadata key carrying the owning patch set's id.
pub const META_PATCH_SET_ID: &str = "patchSetID";

/// Reserved metadata key carrying the referenced patch's id.
pub const META_PATCH_ID: &str = "patchID";

/// Kind of mutation an audit entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEvent {
    Created,
    Updated,
    Deleted,
    Applied,
    Verified,
    Enabled,
    Disabled,
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
            Self::Applied => write!(f, "applied"),
            Self::Verified => write!(f, "verified"),
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// One immutable event in a patch set's audit log.
///
/// Entries are append-only: once recorded via [`PatchSet::record`] they are
/// never mutated or removed, and they outlive the patches they reference
/// (a `deleted` entry keeps the removed patch's id).
///
/// [`PatchSet::record`]: crate::set::PatchSet::record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub timestamp: DateTime<Utc>,
    /// Optional user attribution.
    pub user: Option<String>,
    pub event: AuditEvent,
    /// The patch this entry refers to, when the mutation was patch-level.
    pub patch_id: Option<PatchId>,
    /// Human-readable description of the mutation.
    pub detail: String,
    /// String metadata. The reserved keys [`META_PATCH_SET_ID`] and
    /// [`META_PATCH_ID`] are stamped on record; all other keys are opaque.
    pub metadata: BTreeMap<String, String>,
}

impl AuditEntry {
    /// Create an entry timestamped now.
    pub fn new(event: AuditEvent, detail: impl Into<String>) -> Self {
        Self {
            id: AuditEntryId::new(),
            timestamp: Utc::now(),
            user: None,
            event,
            patch_id: None,
            detail: detail.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attribute the entry to a user.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    /// Reference a patch by id.
    pub fn with_patch(mut self, patch_id: PatchId) -> Self {
        self.patch_id = Some(patch_id);
        self
    }

    /// Attach one metadata key/value pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
