//! Fundamental identifier and timestamp types.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Entity identifier.
///
/// Represented as a fixed-size ASCII byte array rather than a `String` so
/// that on-disk index entries are fixed-width and comparable with a plain
/// byte-slice ordering. The value is the hex form of two concatenated
/// UUIDv4s (64 hex characters), which keeps collision probability
/// negligible without pulling in a wider identifier scheme.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId([u8; 64]);

impl EntityId {
    /// Generates a fresh, random entity id.
    pub fn generate() -> Self {
        let mut buf = [0u8; 64];
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let hex = format!("{}{}", a.simple(), b.simple());
        buf.copy_from_slice(hex.as_bytes());
        EntityId(buf)
    }

    /// Parses an entity id from its 64-character hex representation.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 64 || !bytes.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        let mut buf = [0u8; 64];
        buf.copy_from_slice(bytes);
        Some(EntityId(buf))
    }

    /// Returns the raw 64-byte fixed-width representation used in on-disk
    /// index entries.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Borrows the id as a `&str` (the bytes are always valid ASCII hex).
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("EntityId bytes are always ASCII hex")
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.as_str())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EntityId::parse(&s).ok_or_else(|| D::Error::custom(format!("invalid entity id {s:?}")))
    }
}

/// Nanosecond timestamp used for all temporal tag and entity metadata.
///
/// Kept as a newtype over `u64` rather than a wall-clock type so that
/// `entitydb-core` carries no time-zone or calendar dependency; callers at
/// the edges convert to/from whatever clock representation they use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimestampNs(pub u64);

impl TimestampNs {
    /// Returns the current wall-clock time as nanoseconds since the Unix
    /// epoch.
    pub fn now() -> Self {
        let dur = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        TimestampNs(dur.as_nanos() as u64)
    }

    /// The zero timestamp, used as a sentinel for "beginning of time" in
    /// range queries.
    pub const EPOCH: TimestampNs = TimestampNs(0);
}

impl fmt::Display for TimestampNs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_roundtrips_through_str() {
        let id = EntityId::generate();
        let parsed = EntityId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn entity_id_rejects_wrong_length() {
        assert!(EntityId::parse("abc").is_none());
    }

    #[test]
    fn entity_id_rejects_non_hex() {
        let bad = "z".repeat(64);
        assert!(EntityId::parse(&bad).is_none());
    }

    #[test]
    fn timestamps_order_naturally() {
        assert!(TimestampNs(1) < TimestampNs(2));
        assert_eq!(TimestampNs::EPOCH.0, 0);
    }
}
