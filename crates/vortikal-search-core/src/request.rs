//! Search request value object

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};
use crate::query::Query;
use crate::selection::PropertySelection;
use crate::sorting::Sorting;

/// Default maximum number of results per request
pub const DEFAULT_LIMIT: usize = 40_000;

/// Structural filters applied on top of the query and ACL check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterFlag {
    /// Drop resources that are not published
    UnpublishedExcluded,
    /// Drop resources located inside an unpublished collection
    UnpublishedCollectionsExcluded,
}

/// Everything describing one logical search.
///
/// Equality and hashing are structural over every field, so identical
/// requests can be cached or deduplicated by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchRequest {
    query: Option<Query>,
    sorting: Option<Sorting>,
    limit: usize,
    cursor: usize,
    selection: PropertySelection,
    filter_flags: BTreeSet<FilterFlag>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            sorting: Some(Sorting::default()),
            limit: DEFAULT_LIMIT,
            cursor: 0,
            selection: PropertySelection::ALL,
            filter_flags: [
                FilterFlag::UnpublishedExcluded,
                FilterFlag::UnpublishedCollectionsExcluded,
            ]
            .into_iter()
            .collect(),
        }
    }
}

fn non_negative(what: &str, value: i64) -> SearchResult<usize> {
    usize::try_from(value)
        .map_err(|_| SearchError::InvalidArgument(format!("{what} must be >= 0, got {value}")))
}

impl SearchRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request matching `query`, defaults elsewhere
    #[must_use]
    pub fn for_query(query: Query) -> Self {
        Self {
            query: Some(query),
            ..Self::default()
        }
    }

    // ── Accessors ──

    /// `None` means "match everything"
    #[must_use]
    pub const fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    #[must_use]
    pub const fn sorting(&self) -> Option<&Sorting> {
        self.sorting.as_ref()
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub const fn selection(&self) -> &PropertySelection {
        &self.selection
    }

    #[must_use]
    pub const fn filter_flags(&self) -> &BTreeSet<FilterFlag> {
        &self.filter_flags
    }

    // ── Mutators ──

    pub fn set_query(&mut self, query: Option<Query>) {
        self.query = query;
    }

    pub fn set_sorting(&mut self, sorting: Option<Sorting>) {
        self.sorting = sorting;
    }

    /// Set the window size.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidArgument`] for a negative limit.
    pub fn set_limit(&mut self, limit: i64) -> SearchResult<()> {
        self.limit = non_negative("limit", limit)?;
        Ok(())
    }

    /// Set the zero-based window offset.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidArgument`] for a negative cursor.
    pub fn set_cursor(&mut self, cursor: i64) -> SearchResult<()> {
        self.cursor = non_negative("cursor", cursor)?;
        Ok(())
    }

    pub fn set_selection(&mut self, selection: PropertySelection) {
        self.selection = selection;
    }

    /// Returns whether the flag was newly added
    pub fn add_filter_flag(&mut self, flag: FilterFlag) -> bool {
        self.filter_flags.insert(flag)
    }

    /// Returns whether the flag was present
    pub fn remove_filter_flag(&mut self, flag: FilterFlag) -> bool {
        self.filter_flags.remove(&flag)
    }

    pub fn clear_filter_flags(&mut self) {
        self.filter_flags.clear();
    }

    // ── Builders ──

    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    #[must_use]
    pub fn with_sorting(mut self, sorting: Option<Sorting>) -> Self {
        self.sorting = sorting;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    #[must_use]
    pub fn with_selection(mut self, selection: PropertySelection) -> Self {
        self.selection = selection;
        self
    }

    #[must_use]
    pub fn without_filter_flags(mut self) -> Self {
        self.filter_flags.clear();
        self
    }
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(query) => write!(f, "query: {query}")?,
            None => f.write_str("query: *")?,
        }
        if let Some(sorting) = &self.sorting {
            write!(f, "; sort: {sorting}")?;
        }
        write!(f, "; cursor: {}; limit: {}", self.cursor, self.limit)
    }
}
