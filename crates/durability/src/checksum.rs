//! Per-entity content checksums.
//!
//! Every entity carries a `checksum:sha256:<hex>` tag computed over its
//! current tag set plus content, so silent corruption on read is
//! detectable rather than trusted.

use entitydb_core::{Entity, Tag};
use sha2::{Digest, Sha256};

/// Computes the checksum tag for `entity`'s current state. Excludes the
/// checksum tag itself from the hashed input (it wouldn't exist yet the
/// first time this is called, and a stale one must not affect the
/// recomputed value).
pub fn compute(entity: &Entity) -> Tag {
    let mut hasher = Sha256::new();
    let mut tags = entity.current_tags();
    tags.retain(|t| t.namespace() != "checksum");
    tags.sort();
    for tag in &tags {
        hasher.update(tag.as_str().as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(&entity.content);
    let digest = hasher.finalize();
    Tag::new(format!("checksum:sha256:{}", encode_hex(&digest)))
        .expect("computed checksum tags are always well-formed")
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Verifies that `entity`'s live `checksum:sha256:*` tag (if present)
/// matches its recomputed checksum.
pub fn verify(entity: &Entity) -> bool {
    let expected = compute(entity);
    let live = entity
        .current_tags()
        .into_iter()
        .find(|t| t.namespace() == "checksum");
    match live {
        Some(live) => live == expected,
        None => true, // no checksum tag recorded yet; nothing to violate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitydb_core::{EntityId, TimestampNs};

    #[test]
    fn checksum_is_stable_for_same_content() {
        let entity = Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            b"payload".to_vec(),
            TimestampNs(1),
        );
        assert_eq!(compute(&entity), compute(&entity));
    }

    #[test]
    fn checksum_changes_with_content() {
        let a = Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            b"one".to_vec(),
            TimestampNs(1),
        );
        let b = Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            b"two".to_vec(),
            TimestampNs(1),
        );
        assert_ne!(compute(&a), compute(&b));
    }

    #[test]
    fn verify_passes_without_a_recorded_checksum() {
        let entity = Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            b"payload".to_vec(),
            TimestampNs(1),
        );
        assert!(verify(&entity));
    }

    #[test]
    fn verify_fails_for_tampered_content() {
        let mut entity = Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            b"payload".to_vec(),
            TimestampNs(1),
        );
        let checksum = compute(&entity);
        entity.append_tags(vec![checksum], TimestampNs(2));
        entity.content = b"tampered".to_vec();
        assert!(!verify(&entity));
    }
}
