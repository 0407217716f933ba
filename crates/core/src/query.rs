//! Query request/response shapes shared between the repository and its
//! callers.

use crate::dataset::Dataset;
use crate::tag::Tag;

/// A tag-predicate query over the entity set.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub predicates: Vec<Tag>,
    /// `true`: intersect (AND) the predicates. `false`: union (OR) them.
    pub match_all: bool,
    pub dataset: Option<Dataset>,
    pub sort: SortKey,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for QueryRequest {
    fn default() -> Self {
        QueryRequest {
            predicates: Vec::new(),
            match_all: true,
            dataset: None,
            sort: SortKey::Id,
            limit: None,
            offset: 0,
        }
    }
}

/// Sort key applied to a query's result page before pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    CreatedAt,
    UpdatedAt,
    TagCount,
}

/// A page of results plus the total count before pagination was applied.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize) -> Self {
        Page { items, total }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
