//! Dataset identifiers.

use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dataset name, extracted from an entity's live `dataset:*` tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dataset(String);

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Dataset(name.into())
    }

    /// Extracts the value segment from a `dataset:<name>` tag.
    pub fn from_tag(tag: &Tag) -> Self {
        let value = tag
            .as_str()
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(tag.as_str());
        Dataset(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the live `dataset:<name>` tag for this dataset.
    pub fn to_tag(&self) -> Tag {
        Tag::new(format!("dataset:{}", self.0)).expect("dataset names produce valid tags")
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tag_extracts_value() {
        let tag = Tag::new("dataset:orders").unwrap();
        assert_eq!(Dataset::from_tag(&tag).as_str(), "orders");
    }

    #[test]
    fn to_tag_roundtrips() {
        let ds = Dataset::new("orders");
        assert_eq!(ds.to_tag().as_str(), "dataset:orders");
    }
}
