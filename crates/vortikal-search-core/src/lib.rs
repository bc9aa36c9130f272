//! Search execution core for the Vortikal repository
//!
//! Runs structured queries over a tantivy index of resources:
//! - [`Query`] / [`Sorting`] / [`SearchRequest`]: what to find and how to order it
//! - [`QueryCompiler`]: translation into tantivy queries, filters and sort keys
//! - [`IndexManager`] / [`IndexViewProvider`]: point-in-time index views
//! - [`PropertySetIndexer`]: writing resources into the index
//! - [`IndexSearcher`]: windowed `execute` and streaming `iterate_matching`
//! - [`PrincipalResolver`]: ACL visibility of the caller

#![forbid(unsafe_code)]

pub mod auth;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter_compiler;
pub mod index_manager;
pub mod indexer;
pub mod iteration;
pub mod live_docs;
pub mod metrics;
pub mod property_set;
pub mod query;
pub mod query_compiler;
pub mod request;
pub mod results;
pub mod schema;
pub mod searcher;
pub mod selection;
pub mod sorting;

// Re-export key types
pub use auth::{AuthToken, PrincipalResolver, StaticPrincipalResolver, Visibility};
pub use collector::SortedTopCollector;
pub use config::SearchConfig;
pub use engine::SearchEngine;
pub use error::{SearchError, SearchResult};
pub use filter_compiler::{CompiledFilters, apply_filter, compile_filters};
pub use index_manager::{IndexManager, IndexView, IndexViewProvider, ViewGuard};
pub use indexer::{IndexedResource, PropertySetIndexer};
pub use iteration::{Flow, Window};
pub use live_docs::{DocBitSet, LiveDocs};
pub use metrics::{SearcherMetrics, SearcherMetricsSnapshot};
pub use property_set::PropertySet;
pub use query::{ComparisonOp, Query, TypeOp};
pub use query_compiler::{CompiledSort, IndexQueryCompiler, QueryCompiler, SortKey, SortKeyKind};
pub use request::{DEFAULT_LIMIT, FilterFlag, SearchRequest};
pub use results::ResultSet;
pub use schema::{FieldHandles, FieldKind, IndexSchema, PropertyField};
pub use searcher::{IndexSearcher, SLOW_QUERY_TARGET};
pub use selection::PropertySelection;
pub use sorting::{SortDirection, SortField, SortTarget, Sorting};
