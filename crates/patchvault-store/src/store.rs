//! The serialized patch store.
//!
//! [`PatchStore`] is the single source of truth for patch sets in memory
//! and the gatekeeper for every mutation. All operations, reads included,
//! run under one mutex, so at most one operation is in flight at a time
//! and reads are linearizable with writes.
//!
//! Mutations follow one commit discipline: clone the aggregate out of the
//! cache, mutate the clone, validate, append the audit entry, write the
//! clone to disk, and only then swap it into the cache. A failed
//! validation or disk write aborts the whole operation with the cache
//! unchanged, so no caller ever observes a cache state whose disk state
//! does not exist.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use patchvault_types::{
    AuditEntry, AuditEvent, Patch, PatchId, PatchSet, PatchSetId, PatchSetStatus, PatchStatus,
};

use crate::codec;
use crate::disk::DiskStore;
use crate::error::{StoreError, StoreResult};
use crate::validate::{validate_patch, validate_set};

/// Aggregate counts over the whole store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub total_sets: usize,
    pub total_patches: usize,
    pub enabled_patches: usize,
    pub verified_patches: usize,
}

#[derive(Default)]
struct StoreState {
    sets: HashMap<PatchSetId, PatchSet>,
    loaded: bool,
}

/// Serialized, write-through store of patch sets.
pub struct PatchStore {
    disk: DiskStore,
    inner: Mutex<StoreState>,
}

impl PatchStore {
    /// Create a store persisting under `root`. No I/O happens until
    /// [`load_all`](Self::load_all) or the first mutation.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            disk: DiskStore::new(root),
            inner: Mutex::new(StoreState::default()),
        }
    }

    /// Create a store and load all persisted records.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self::new(root);
        store.load_all()?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().expect("store mutex poisoned")
    }

    /// Write the new aggregate value to disk, then swap it into the cache.
    fn commit(&self, state: &mut StoreState, set: PatchSet) -> StoreResult<()> {
        self.disk.write(&set)?;
        state.sets.insert(set.id, set);
        Ok(())
    }

    fn cloned_set(state: &StoreState, id: &PatchSetId) -> StoreResult<PatchSet> {
        state
            .sets
            .get(id)
            .cloned()
            .ok_or(StoreError::SetNotFound(*id))
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Populate the cache from disk. Idempotent: only the first call
    /// loads; later calls (from any caller) are no-ops.
    pub fn load_all(&self) -> StoreResult<()> {
        let mut state = self.lock();
        if state.loaded {
            return Ok(());
        }
        for set in self.disk.load_all()? {
            state.sets.insert(set.id, set);
        }
        state.loaded = true;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Set operations
    // ---------------------------------------------------------------

    /// All sets, ordered by `updated_at` descending.
    pub fn list_all(&self) -> Vec<PatchSet> {
        let state = self.lock();
        let mut sets: Vec<PatchSet> = state.sets.values().cloned().collect();
        sets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sets
    }

    /// Look up one set by id.
    pub fn get(&self, id: &PatchSetId) -> Option<PatchSet> {
        self.lock().sets.get(id).cloned()
    }

    /// Create, validate, audit, persist, and cache a fresh set.
    pub fn create(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        author: Option<String>,
    ) -> StoreResult<PatchSet> {
        let mut state = self.lock();
        let mut set = PatchSet::new(name, description, author);
        validate_set(&set)?;
        set.record(AuditEntry::new(
            AuditEvent::Created,
            format!("patch set '{}' created", set.name),
        ));
        let created = set.clone();
        self.commit(&mut state, set)?;
        Ok(created)
    }

    /// Add an externally constructed set under its own identity.
    pub fn add(&self, mut set: PatchSet) -> StoreResult<()> {
        let mut state = self.lock();
        if state.sets.contains_key(&set.id) {
            return Err(StoreError::DuplicateSet(set.id));
        }
        validate_set(&set)?;
        set.record(AuditEntry::new(
            AuditEvent::Created,
            format!("patch set '{}' added", set.name),
        ));
        self.commit(&mut state, set)
    }

    /// Replace an existing set wholesale (full-replace, not a partial
    /// patch). Refreshes `updated_at`.
    pub fn update(&self, mut set: PatchSet) -> StoreResult<()> {
        let mut state = self.lock();
        if !state.sets.contains_key(&set.id) {
            return Err(StoreError::SetNotFound(set.id));
        }
        validate_set(&set)?;
        set.touch();
        set.record(AuditEntry::new(
            AuditEvent::Updated,
            format!("patch set '{}' updated", set.name),
        ));
        self.commit(&mut state, set)
    }

    /// Delete a set and its persisted record. Records no audit entry:
    /// the record the entry would live in is gone.
    pub fn delete(&self, id: &PatchSetId) -> StoreResult<()> {
        let mut state = self.lock();
        if !state.sets.contains_key(id) {
            return Err(StoreError::SetNotFound(*id));
        }
        self.disk.remove(id)?;
        state.sets.remove(id);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Patch operations
    // ---------------------------------------------------------------

    /// Append a patch to a set after validating it against the set's
    /// target constraints.
    pub fn add_patch(&self, patch: Patch, set_id: &PatchSetId) -> StoreResult<()> {
        let mut state = self.lock();
        let mut set = Self::cloned_set(&state, set_id)?;
        if set.contains_patch(&patch.id) {
            return Err(StoreError::DuplicatePatch(patch.id));
        }
        validate_patch(&patch, &set)?;
        let entry = AuditEntry::new(
            AuditEvent::Created,
            format!("patch '{}' added", patch.name),
        )
        .with_patch(patch.id);
        set.patches.push(patch);
        set.touch();
        set.record(entry);
        self.commit(&mut state, set)
    }

    /// Replace a patch in place, preserving its position in the set.
    pub fn update_patch(&self, patch: Patch, set_id: &PatchSetId) -> StoreResult<()> {
        let mut state = self.lock();
        let mut set = Self::cloned_set(&state, set_id)?;
        let pos = set
            .patches
            .iter()
            .position(|p| p.id == patch.id)
            .ok_or(StoreError::PatchNotFound(patch.id))?;
        validate_patch(&patch, &set)?;
        let entry = AuditEntry::new(
            AuditEvent::Updated,
            format!("patch '{}' updated", patch.name),
        )
        .with_patch(patch.id);
        set.patches[pos] = patch;
        set.touch();
        set.record(entry);
        self.commit(&mut state, set)
    }

    /// Remove a patch. The audit entry outlives the patch, keeping its
    /// id and name.
    pub fn delete_patch(&self, patch_id: &PatchId, set_id: &PatchSetId) -> StoreResult<()> {
        let mut state = self.lock();
        let mut set = Self::cloned_set(&state, set_id)?;
        let pos = set
            .patches
            .iter()
            .position(|p| p.id == *patch_id)
            .ok_or(StoreError::PatchNotFound(*patch_id))?;
        let removed = set.patches.remove(pos);
        set.touch();
        set.record(
            AuditEntry::new(
                AuditEvent::Deleted,
                format!("patch '{}' deleted", removed.name),
            )
            .with_patch(removed.id),
        );
        self.commit(&mut state, set)
    }

    /// Flip a patch's enabled flag. No-op (no audit, no persist, no
    /// timestamps) when the flag already has the requested value.
    pub fn set_patch_enabled(
        &self,
        enabled: bool,
        patch_id: &PatchId,
        set_id: &PatchSetId,
        user: Option<String>,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let mut set = Self::cloned_set(&state, set_id)?;
        let patch = set
            .patch_mut(patch_id)
            .ok_or(StoreError::PatchNotFound(*patch_id))?;
        if patch.enabled == enabled {
            return Ok(());
        }
        patch.enabled = enabled;
        patch.touch();
        let detail = format!(
            "patch '{}' {}",
            patch.name,
            if enabled { "enabled" } else { "disabled" }
        );
        set.touch();
        set.record(
            AuditEntry::new(AuditEvent::Updated, detail)
                .with_patch(*patch_id)
                .with_user(user),
        );
        self.commit(&mut state, set)
    }

    /// Set a patch's verification status. Unconditional: status, message,
    /// and timestamps are refreshed even when the status is unchanged.
    pub fn set_patch_status(
        &self,
        status: PatchStatus,
        patch_id: &PatchId,
        set_id: &PatchSetId,
        message: Option<String>,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let mut set = Self::cloned_set(&state, set_id)?;
        let patch = set
            .patch_mut(patch_id)
            .ok_or(StoreError::PatchNotFound(*patch_id))?;
        patch.status = status;
        patch.verification_message = message.clone();
        patch.touch();
        let detail = format!("patch '{}' status set to {status}", patch.name);
        let mut entry = AuditEntry::new(AuditEvent::Updated, detail).with_patch(*patch_id);
        if let Some(message) = message {
            entry = entry.with_metadata("message", message);
        }
        set.touch();
        set.record(entry);
        self.commit(&mut state, set)
    }

    /// Set a set's lifecycle status. No-op when the status is unchanged
    /// and no message is supplied; a message alone forces an update.
    pub fn set_patch_set_status(
        &self,
        status: PatchSetStatus,
        set_id: &PatchSetId,
        message: Option<String>,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let mut set = Self::cloned_set(&state, set_id)?;
        if set.status == status && message.is_none() {
            return Ok(());
        }
        set.status = status;
        set.touch();
        let mut entry =
            AuditEntry::new(AuditEvent::Updated, format!("status set to {status}"));
        if let Some(message) = message {
            entry = entry.with_metadata("message", message);
        }
        set.record(entry);
        self.commit(&mut state, set)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Case-insensitive substring search over set names, descriptions,
    /// and tags. An empty query matches nothing. Results are sorted by
    /// `updated_at` descending before truncation.
    pub fn search_sets(&self, query: &str, limit: usize) -> Vec<PatchSet> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let state = self.lock();
        let mut hits: Vec<PatchSet> = state
            .sets
            .values()
            .filter(|s| s.matches_query(query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        hits.truncate(limit);
        hits
    }

    /// Case-insensitive substring search over patch names, descriptions,
    /// and tags. An empty query matches nothing. Results keep iteration
    /// order; they are not sorted.
    pub fn search_patches(&self, query: &str, limit: usize) -> Vec<Patch> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let state = self.lock();
        let mut hits: Vec<Patch> = state
            .sets
            .values()
            .flat_map(|s| s.patches.iter())
            .filter(|p| p.matches_query(query))
            .cloned()
            .collect();
        hits.truncate(limit);
        hits
    }

    /// The most recent audit entries across all sets, newest first.
    pub fn recent_audit(&self, limit: usize) -> Vec<AuditEntry> {
        let state = self.lock();
        let mut entries: Vec<AuditEntry> = state
            .sets
            .values()
            .flat_map(|s| s.audit_log.iter())
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        entries
    }

    /// Canonical byte representation of one set, suitable for
    /// [`import`](Self::import) on another store.
    pub fn export(&self, id: &PatchSetId) -> StoreResult<Vec<u8>> {
        let state = self.lock();
        let set = state.sets.get(id).ok_or(StoreError::SetNotFound(*id))?;
        codec::encode(set)
    }

    /// Decode a set and route it through [`add`](Self::add), so the
    /// duplicate-identity and validation rules apply identically.
    pub fn import(&self, bytes: &[u8]) -> StoreResult<PatchSet> {
        let set = codec::decode(bytes)?;
        let id = set.id;
        self.add(set)?;
        self.get(&id).ok_or(StoreError::SetNotFound(id))
    }

    /// Aggregate counts over all sets and patches.
    pub fn statistics(&self) -> StoreStatistics {
        let state = self.lock();
        let mut stats = StoreStatistics {
            total_sets: state.sets.len(),
            ..StoreStatistics::default()
        };
        for patch in state.sets.values().flat_map(|s| s.patches.iter()) {
            stats.total_patches += 1;
            if patch.enabled {
                stats.enabled_patches += 1;
            }
            if patch.status == PatchStatus::Verified {
                stats.verified_patches += 1;
            }
        }
        stats
    }

    /// Sets whose target path equals the given path after lexical
    /// normalization (`./a/b` and `a/b` are the same target), newest
    /// first.
    pub fn find_by_target(&self, path: &Path) -> Vec<PatchSet> {
        let needle = normalize_path(path);
        let state = self.lock();
        let mut hits: Vec<PatchSet> = state
            .sets
            .values()
            .filter(|s| {
                s.target_path
                    .as_deref()
                    .is_some_and(|p| normalize_path(p) == needle)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        hits
    }
}

/// Lexical path normalization: drops `.` components and resolves `..`
/// against preceding normal components. Purely textual; never touches
/// the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `..` at the root stays at the root.
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().map(|c| c.as_os_str()).collect()
}
