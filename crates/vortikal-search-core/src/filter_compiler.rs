//! Structural and ACL filter compiler
//!
//! Compiles the request's [`FilterFlag`]s and the caller's [`Visibility`]
//! into tantivy clauses that restrict, but never score, the main query:
//! - `UnpublishedExcluded`: `published:"true"`
//! - `UnpublishedCollectionsExcluded`: `in_unpublished_collection:"false"`
//! - restricted visibility: `acl_read` intersects the caller's principals

use std::collections::BTreeSet;

use tantivy::Term;
use tantivy::query::{BooleanQuery, ConstScoreQuery, EmptyQuery, Occur, Query, TermQuery, TermSetQuery};
use tantivy::schema::{Field, IndexRecordOption};

use crate::auth::Visibility;
use crate::request::FilterFlag;
use crate::schema::{FALSE_TERM, FieldHandles, TRUE_TERM};

/// Compiled filter: `Must` clauses to be merged with the main query.
#[derive(Debug)]
pub struct CompiledFilters {
    clauses: Vec<Box<dyn Query>>,
}

impl CompiledFilters {
    /// Returns `true` if no filter clauses were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Number of filter clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Collapse the clauses into a single query, `None` when unfiltered.
    #[must_use]
    pub fn into_query(mut self) -> Option<Box<dyn Query>> {
        match self.clauses.len() {
            0 => None,
            1 => self.clauses.pop(),
            _ => Some(Box::new(BooleanQuery::new(
                self.clauses
                    .into_iter()
                    .map(|clause| (Occur::Must, clause))
                    .collect(),
            ))),
        }
    }
}

/// Compile visibility and filter flags into filter clauses.
#[must_use]
pub fn compile_filters(
    visibility: &Visibility,
    flags: &BTreeSet<FilterFlag>,
    handles: &FieldHandles,
) -> CompiledFilters {
    let mut clauses: Vec<Box<dyn Query>> = Vec::new();

    for flag in flags {
        match flag {
            FilterFlag::UnpublishedExcluded => {
                clauses.push(term_filter(handles.published, TRUE_TERM));
            }
            FilterFlag::UnpublishedCollectionsExcluded => {
                clauses.push(term_filter(handles.in_unpublished_collection, FALSE_TERM));
            }
        }
    }

    if let Visibility::Principals(principals) = visibility {
        if principals.is_empty() {
            clauses.push(Box::new(EmptyQuery));
        } else {
            let terms = principals
                .iter()
                .map(|p| Term::from_field_text(handles.acl_read, &p.to_string()));
            clauses.push(Box::new(TermSetQuery::new(terms)));
        }
    }

    CompiledFilters { clauses }
}

/// Restrict `query` by `filter` without altering relevance.
///
/// The filter becomes a zero-scored `Must` clause; with no filter the query
/// is returned unchanged.
#[must_use]
pub fn apply_filter(query: Box<dyn Query>, filter: Option<Box<dyn Query>>) -> Box<dyn Query> {
    match filter {
        None => query,
        Some(filter) => Box::new(BooleanQuery::new(vec![
            (Occur::Must, query),
            (Occur::Must, Box::new(ConstScoreQuery::new(filter, 0.0))),
        ])),
    }
}

/// Exact-match query on a STRING field.
pub(crate) fn term_filter(field: Field, value: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_text(field, value),
        IndexRecordOption::Basic,
    ))
}
