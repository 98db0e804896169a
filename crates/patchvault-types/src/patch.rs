use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::PatchId;

/// Verification status of a single patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStatus {
    /// Created but not yet checked against the target binary.
    Pending,
    /// Original bytes confirmed present at the offset.
    Verified,
    /// Verification failed (bytes at the offset differ).
    Failed,
    /// Patched bytes have been written to the target.
    Applied,
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Verified => write!(f, "verified"),
            Self::Failed => write!(f, "failed"),
            Self::Applied => write!(f, "applied"),
        }
    }
}

/// One atomic byte substitution in a target binary.
///
/// A patch overwrites `original_bytes` with `patched_bytes` at `offset`.
/// The two sequences must have equal length: patches overwrite in place,
/// never resize. The optional expected target fields are a fingerprint of
/// the binary the patch was authored against, used for mismatch detection
/// rather than enforcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Unique identifier within the owning set.
    pub id: PatchId,
    /// Human-readable name (must be non-empty after trimming).
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// File offset of the substitution.
    pub offset: u64,
    /// Bytes expected at `offset` before patching.
    #[serde(with = "hex_bytes")]
    pub original_bytes: Vec<u8>,
    /// Bytes written at `offset` when the patch is applied.
    #[serde(with = "hex_bytes")]
    pub patched_bytes: Vec<u8>,
    /// Whether the patch participates in application.
    pub enabled: bool,
    /// Verification status.
    pub status: PatchStatus,
    /// Message from the last verification attempt, if any.
    pub verification_message: Option<String>,
    /// Expected target binary identity (e.g. build UUID).
    pub expected_target_id: Option<String>,
    /// Expected target architecture (e.g. "arm64").
    pub expected_target_arch: Option<String>,
    /// Free-form tags for search.
    pub tags: BTreeSet<String>,
    /// Creation time (immutable).
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Patch {
    /// Create a new pending, enabled patch.
    pub fn new(
        name: impl Into<String>,
        offset: u64,
        original_bytes: Vec<u8>,
        patched_bytes: Vec<u8>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PatchId::new(),
            name: name.into(),
            description: None,
            offset,
            original_bytes,
            patched_bytes,
            enabled: true,
            status: PatchStatus::Pending,
            verification_message: None,
            expected_target_id: None,
            expected_target_arch: None,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
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

/// Serde adapter encoding byte sequences as lowercase hex strings, so the
/// persisted form stays human-readable.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_patch_defaults() {
        let p = Patch::new("nop-check", 0x1000, vec![0x00, 0x01], vec![0x01, 0x00]);
        assert!(p.enabled);
        assert_eq!(p.status, PatchStatus::Pending);
        assert!(p.verification_message.is_none());
        assert_eq!(p.created_at, p.updated_at);
    }

    #[test]
    fn bytes_serialize_as_hex_strings() {
        let p = Patch::new("jmp", 0x40, vec![0xde, 0xad], vec![0xbe, 0xef]);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["original_bytes"], "dead");
        assert_eq!(json["patched_bytes"], "beef");
    }

    #[test]
    fn matches_query_is_case_insensitive() {
        let mut p = Patch::new("Unlock Feature", 0, vec![0], vec![1]);
        p.description = Some("bypass license gate".into());
        p.tags.insert("licensing".into());

        assert!(p.matches_query("unlock"));
        assert!(p.matches_query("LICENSE"));
        assert!(p.matches_query("licens"));
        assert!(!p.matches_query("telemetry"));
    }

    #[test]
    fn status_display_matches_serde() {
        for status in [
            PatchStatus::Pending,
            PatchStatus::Verified,
            PatchStatus::Failed,
            PatchStatus::Applied,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    proptest! {
        #[test]
        fn hex_bytes_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut p = Patch::new("rt", 0, vec![0x90], vec![0x90]);
            p.original_bytes = bytes.clone();
            p.patched_bytes = bytes;
            let json = serde_json::to_string(&p).unwrap();
            let back: Patch = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(p, back);
        }
    }
}
