//! Foundation types for PatchVault.
//!
//! This crate provides the value objects of the patch repository: patch
//! sets, the patches they contain, and the append-only audit entries
//! recorded against them. All types here are pure data with serde
//! support; validation, persistence, and orchestration live in
//! `patchvault-store`.
//!
//! # Key Types
//!
//! - [`PatchSet`] — aggregate root: a named, auditable collection of patches
//!   targeting one binary
//! - [`Patch`] — one fixed-length byte-range substitution plus verification
//!   metadata
//! - [`AuditEntry`] — immutable record of one mutation to a patch set or its
//!   patches
//! - [`PatchId`], [`PatchSetId`], [`AuditEntryId`] — UUID v7 identifiers

pub mod audit;
pub mod id;
pub mod patch;
pub mod set;

pub use audit::{AuditEntry, AuditEvent, META_PATCH_ID, META_PATCH_SET_ID};
pub use id::{AuditEntryId, PatchId, PatchSetId};
pub use patch::{Patch, PatchStatus};
pub use set::{PatchSet, PatchSetStatus};
