use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEntry, META_PATCH_ID, META_PATCH_SET_ID};
use crate::id::{PatchId, PatchSetId};
use crate::patch::Patch;

/// Lifecycle status of a patch set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchSetStatus {
    /// Under construction.
    Draft,
    /// Complete and ready to apply.
    Ready,
    /// All enabled patches written to the target.
    Applied,
    /// All patches verified against the target.
    Verified,
    /// Application or verification failed.
    Failed,
}

impl fmt::Display for PatchSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Ready => write!(f, "ready"),
            Self::Applied => write!(f, "applied"),
            Self::Verified => write!(f, "verified"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregate root: a named, auditable collection of patches targeting one
/// binary.
///
/// The set exclusively owns its patches and its audit log; no other entity
/// references them. Patch order is insertion order (meaningful for display,
/// not for correctness). `created_at` is immutable; `updated_at` advances
/// on every mutation, including patch-level ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSet {
    pub id: PatchSetId,
    /// Human-readable name (must be non-empty after trimming).
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Contained patches in insertion order.
    pub patches: Vec<Patch>,
    pub status: PatchSetStatus,
    /// Path of the binary this set targets, if known.
    pub target_path: Option<PathBuf>,
    /// Identity fingerprint of the target binary (e.g. build UUID).
    pub target_identity: Option<String>,
    /// Architecture of the target binary (e.g. "arm64").
    pub target_arch: Option<String>,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Append-only mutation history.
    pub audit_log: Vec<AuditEntry>,
}

impl PatchSet {
    /// Create an empty draft set with a fresh identity.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        author: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PatchSetId::new(),
            name: name.into(),
            description,
            author,
            patches: Vec::new(),
            status: PatchSetStatus::Draft,
            target_path: None,
            target_identity: None,
            target_arch: None,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            audit_log: Vec::new(),
        }
    }

    /// Advance `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Find a patch by id.
    pub fn patch(&self, id: &PatchId) -> Option<&Patch> {
        self.patches.iter().find(|p| p.id == *id)
    }

    /// Find a patch by id, mutably.
    pub fn patch_mut(&mut self, id: &PatchId) -> Option<&mut Patch> {
        self.patches.iter_mut().find(|p| p.id == *id)
    }

    /// Whether a patch with this id exists in the set.
    pub fn contains_patch(&self, id: &PatchId) -> bool {
        self.patch(id).is_some()
    }

    /// Append an entry to the audit log.
    ///
    /// The reserved metadata keys are stamped here: the owning set's id
    /// always, the referenced patch's id when the entry carries one.
    /// The log only grows; nothing ever removes or rewrites an entry.
    pub fn record(&mut self, mut entry: AuditEntry) {
        entry
            .metadata
            .insert(META_PATCH_SET_ID.to_string(), self.id.to_string());
        if let Some(patch_id) = entry.patch_id {
            entry
                .metadata
                .insert(META_PATCH_ID.to_string(), patch_id.to_string());
        }
        self.audit_log.push(entry);
    }

    /// Case-insensitive substring match against name, description, and tags.
    pub fn matches_query(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        if self.name.to_lowercase().contains(&needle) {
            return true;
        }
        if let Some(desc) = &self.description {
            if desc.to_lowercase().contains(&needle) {
                return true;
            }
        }
        self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEvent;

    #[test]
    fn new_set_is_empty_draft() {
        let set = PatchSet::new("UnlockFeature", None, Some("alice".into()));
        assert_eq!(set.status, PatchSetStatus::Draft);
        assert!(set.patches.is_empty());
        assert!(set.audit_log.is_empty());
        assert_eq!(set.created_at, set.updated_at);
    }

    #[test]
    fn record_stamps_reserved_metadata() {
        let mut set = PatchSet::new("s", None, None);
        let patch = Patch::new("p", 0, vec![0], vec![1]);
        let pid = patch.id;
        set.patches.push(patch);

        set.record(AuditEntry::new(AuditEvent::Created, "patch added").with_patch(pid));

        let entry = set.audit_log.last().unwrap();
        assert_eq!(
            entry.metadata.get(META_PATCH_SET_ID),
            Some(&set.id.to_string())
        );
        assert_eq!(entry.metadata.get(META_PATCH_ID), Some(&pid.to_string()));
    }

    #[test]
    fn record_without_patch_omits_patch_key() {
        let mut set = PatchSet::new("s", None, None);
        set.record(AuditEntry::new(AuditEvent::Created, "set created"));
        let entry = set.audit_log.last().unwrap();
        assert!(entry.metadata.contains_key(META_PATCH_SET_ID));
        assert!(!entry.metadata.contains_key(META_PATCH_ID));
    }

    #[test]
    fn patch_lookup_by_id() {
        let mut set = PatchSet::new("s", None, None);
        let patch = Patch::new("p", 0x10, vec![0xff], vec![0x00]);
        let pid = patch.id;
        set.patches.push(patch);

        assert!(set.contains_patch(&pid));
        assert_eq!(set.patch(&pid).unwrap().offset, 0x10);
        assert!(set.patch(&PatchId::new()).is_none());
    }

    #[test]
    fn matches_query_checks_tags() {
        let mut set = PatchSet::new("MainApp", Some("release build".into()), None);
        set.tags.insert("ios".into());

        assert!(set.matches_query("mainapp"));
        assert!(set.matches_query("Release"));
        assert!(set.matches_query("IOS"));
        assert!(!set.matches_query("android"));
    }
}
