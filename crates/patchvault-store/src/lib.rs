//! Validated, audited, file-backed storage for PatchVault patch sets.
//!
//! This crate is the orchestration layer of the patch repository. It owns
//! the authoritative in-memory cache of all patch sets and is the only
//! component allowed to mutate them.
//!
//! # Components
//!
//! - [`validate`] — pure structural validators run before every commit
//! - [`codec`] — canonical JSON encoding (the export/import format and the
//!   on-disk format are the same bytes)
//! - [`DiskStore`] — one-file-per-set persistence with atomic replace
//! - [`PatchStore`] — the serialized store: every operation runs under one
//!   global lock, validates before committing, appends an audit entry on
//!   every mutation, and writes through to disk before the cache is updated
//!
//! # Design Rules
//!
//! 1. At most one store operation is in flight at a time; reads are
//!    linearizable with writes.
//! 2. A mutation is complete only after its file write returns. Cache and
//!    disk never diverge after a successful call.
//! 3. Any failure (validation, I/O) aborts the whole operation with the
//!    cache unchanged. No retries, no partial commits.
//! 4. The audit log is append-only for the lifetime of a set.
//! 5. A corrupt record on disk is logged and skipped at load; it never
//!    prevents the rest of the store from loading.

pub mod codec;
pub mod disk;
pub mod error;
pub mod store;
pub mod validate;

pub use disk::DiskStore;
pub use error::{StoreError, StoreResult};
pub use store::{PatchStore, StoreStatistics};
pub use validate::{validate_patch, validate_set, ValidationError};
