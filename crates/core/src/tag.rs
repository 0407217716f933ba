//! Tags and temporal tags.
//!
//! A `Tag` is a validated, namespaced string of the form
//! `namespace:key:value` (one or more `:`-separated segments after the
//! namespace). A `TemporalTag` pairs a `Tag` with the nanosecond timestamp
//! at which it was written; an entity's tag stream is an append-only
//! sequence of `TemporalTag`s.

use crate::error::{Error, Result};
use crate::types::TimestampNs;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Reserved namespaces with system-assigned meaning. Closed set: entities
/// may still use other namespaces freely, but these carry specific
/// semantics elsewhere in the engine.
#[non_exhaustive]
pub struct ReservedNamespace;

impl ReservedNamespace {
    pub const TYPE: &'static str = "type";
    pub const DATASET: &'static str = "dataset";
    pub const STATUS: &'static str = "status";
    pub const RBAC: &'static str = "rbac";
    pub const IDENTITY: &'static str = "identity";
    pub const CHECKSUM: &'static str = "checksum";
    pub const CONTENT: &'static str = "content";
    pub const LIFECYCLE: &'static str = "lifecycle";
    pub const DELETED: &'static str = "deleted";
}

/// A validated tag string: `namespace:key(:value)+`.
///
/// Validation requires a lowercase-letter-led namespace segment followed
/// by at least one more `:`-separated segment, and forbids the `|`
/// character (reserved for the `TemporalTag` wire separator).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(String);

impl Tag {
    /// Validates and constructs a `Tag` from an owned string.
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Tag(s))
    }

    fn validate(s: &str) -> Result<()> {
        if s.contains('|') {
            return Err(Error::InvalidArgument(format!(
                "tag {s:?} must not contain '|'"
            )));
        }
        let mut segments = s.split(':');
        let namespace = segments.next().unwrap_or("");
        if namespace.is_empty()
            || !namespace
                .chars()
                .next()
                .map(|c| c.is_ascii_lowercase())
                .unwrap_or(false)
            || !namespace
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(Error::InvalidArgument(format!(
                "tag {s:?} has an invalid namespace segment"
            )));
        }
        if segments.next().is_none() {
            return Err(Error::InvalidArgument(format!(
                "tag {s:?} must have at least one key segment after the namespace"
            )));
        }
        Ok(())
    }

    /// The first `:`-separated segment.
    pub fn namespace(&self) -> &str {
        self.0.split(':').next().unwrap_or("")
    }

    /// The full tag minus its final `:value` segment — the prefix used to
    /// group temporal versions of "the same key" for `as_of` collapsing.
    pub fn key_prefix(&self) -> &str {
        match self.0.rfind(':') {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// The raw tag string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Tag::new(s.to_string())
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Tag::new(s).map_err(D::Error::custom)
    }
}

/// A tag together with the timestamp at which it was appended to an
/// entity's temporal tag stream.
///
/// Ordered by timestamp then tag, which gives `history`/`changes` a
/// natural chronological ordering without an extra sort key. Wire form is
/// `"<u64-ns>|<tag>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemporalTag {
    pub timestamp: TimestampNs,
    pub tag: Tag,
}

impl TemporalTag {
    pub fn new(timestamp: TimestampNs, tag: Tag) -> Self {
        TemporalTag { timestamp, tag }
    }
}

impl fmt::Display for TemporalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.timestamp.0, self.tag)
    }
}

impl FromStr for TemporalTag {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let (ts, tag) = s
            .split_once('|')
            .ok_or_else(|| Error::InvalidArgument(format!("malformed temporal tag {s:?}")))?;
        let ts: u64 = ts
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("malformed timestamp in {s:?}")))?;
        Ok(TemporalTag::new(TimestampNs(ts), Tag::from_str(tag)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_tag_parses() {
        let t = Tag::new("dataset:orders").unwrap();
        assert_eq!(t.namespace(), "dataset");
    }

    #[test]
    fn tag_rejects_missing_key_segment() {
        assert!(Tag::new("dataset").is_err());
    }

    #[test]
    fn tag_rejects_pipe() {
        assert!(Tag::new("dataset:a|b").is_err());
    }

    #[test]
    fn key_prefix_strips_final_segment() {
        let t = Tag::new("checksum:sha256:deadbeef").unwrap();
        assert_eq!(t.key_prefix(), "checksum:sha256");
    }

    #[test]
    fn temporal_tag_roundtrips() {
        let tag = Tag::new("status:active").unwrap();
        let tt = TemporalTag::new(TimestampNs(42), tag);
        let wire = tt.to_string();
        let parsed: TemporalTag = wire.parse().unwrap();
        assert_eq!(tt, parsed);
    }

    #[test]
    fn temporal_tags_order_by_timestamp_then_tag() {
        let a = TemporalTag::new(TimestampNs(1), Tag::new("type:order").unwrap());
        let b = TemporalTag::new(TimestampNs(2), Tag::new("type:order").unwrap());
        assert!(a < b);
    }
}
