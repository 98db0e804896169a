//! Canonical encoding of patch sets.
//!
//! The on-disk format and the export/import format are the same bytes:
//! pretty-printed JSON with deterministic key order (struct field order
//! plus `BTreeMap`/`BTreeSet` for maps and tags), hex-encoded byte fields,
//! and ISO-8601 timestamps. Two encodings of equal in-memory values are
//! byte-identical, and `decode(encode(x)) == x` for every valid set.
//! The format is versionless and self-describing.

use patchvault_types::PatchSet;

use crate::error::{StoreError, StoreResult};

/// Encode a patch set to its canonical byte representation.
pub fn encode(set: &PatchSet) -> StoreResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(set)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a patch set from its canonical byte representation.
pub fn decode(bytes: &[u8]) -> StoreResult<PatchSet> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchvault_types::{AuditEntry, AuditEvent, Patch};

    fn sample_set() -> PatchSet {
        let mut set = PatchSet::new("UnlockFeature", Some("demo".into()), Some("alice".into()));
        set.target_identity = Some("4fb9-build-uuid".into());
        set.target_arch = Some("arm64".into());
        set.tags.insert("ios".into());
        let patch = Patch::new("nop-check", 0x1000, vec![0x00, 0x01], vec![0x01, 0x00]);
        let pid = patch.id;
        set.patches.push(patch);
        set.record(AuditEntry::new(AuditEvent::Created, "patch added").with_patch(pid));
        set
    }

    #[test]
    fn round_trip_preserves_equality() {
        let set = sample_set();
        let bytes = encode(&set).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(set, back);
    }

    #[test]
    fn encoding_is_deterministic() {
        let set = sample_set();
        assert_eq!(encode(&set).unwrap(), encode(&set).unwrap());

        // Encoding a decoded copy is also byte-identical.
        let bytes = encode(&set).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(encode(&back).unwrap(), bytes);
    }

    #[test]
    fn encoding_is_human_readable() {
        let set = sample_set();
        let text = String::from_utf8(encode(&set).unwrap()).unwrap();
        assert!(text.contains("\"name\": \"UnlockFeature\""));
        assert!(text.contains("\"original_bytes\": \"0001\""));
        assert!(text.contains("\"patchSetID\""));
        // RFC 3339 timestamps, not epoch integers.
        assert!(text.contains("T") && text.contains("Z"));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            decode(b"not json"),
            Err(StoreError::Serialization(_))
        ));
    }
}
