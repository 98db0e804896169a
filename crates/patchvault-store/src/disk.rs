//! One-file-per-set disk persistence.
//!
//! Each patch set is stored as `<root>/<set-id>.json` in the canonical
//! encoding from [`codec`](crate::codec). The root directory is created
//! lazily and idempotently. Writes go through a temp file in the same
//! directory followed by a rename, so a record is always observed either
//! whole or not at all.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use patchvault_types::{PatchSet, PatchSetId};

use crate::codec;
use crate::error::StoreResult;

/// File extension for persisted patch set records.
const RECORD_EXTENSION: &str = "json";

/// Durable storage for patch set records under one directory.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a disk store rooted at `root`. No I/O happens until the
    /// first load or write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory if it does not exist yet.
    pub fn ensure_root(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Path of the record file for a set id.
    fn record_path(&self, id: &PatchSetId) -> PathBuf {
        self.root.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    /// Atomically write one set's record.
    pub fn write(&self, set: &PatchSet) -> StoreResult<()> {
        self.ensure_root()?;
        let bytes = codec::encode(set)?;
        let tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        fs::write(tmp.path(), &bytes)?;
        tmp.persist(self.record_path(&set.id))
            .map_err(|e| e.error)?;
        debug!(set = %set.id, bytes = bytes.len(), "persisted patch set record");
        Ok(())
    }

    /// Remove one set's record. Returns `true` if a file existed.
    pub fn remove(&self, id: &PatchSetId) -> StoreResult<bool> {
        let path = self.record_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Load every record in the storage directory.
    ///
    /// Records that fail to read or decode are logged and skipped; a
    /// single corrupt file never prevents the rest from loading.
    pub fn load_all(&self) -> StoreResult<Vec<PatchSet>> {
        self.ensure_root()?;
        let mut sets = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable record");
                    continue;
                }
            };
            match codec::decode(&bytes) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt record");
                }
            }
        }
        debug!(count = sets.len(), root = %self.root.display(), "loaded patch set records");
        Ok(sets)
    }
}
