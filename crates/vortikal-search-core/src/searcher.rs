//! Request execution against checked-out index views
//!
//! Every call acquires exactly one [`IndexView`](crate::IndexView) through a
//! [`ViewGuard`] and releases it on every exit path, so concurrent callers
//! never share mutable state.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, EnableScoring, Occur, Query as TantivyQuery};
use tantivy::{DocAddress, Searcher};
use tracing::{debug, warn};

use crate::auth::{AuthToken, PrincipalResolver};
use crate::collector::SortedTopCollector;
use crate::config::SearchConfig;
use crate::engine::SearchEngine;
use crate::error::{SearchError, SearchResult};
use crate::filter_compiler::apply_filter;
use crate::index_manager::{IndexManager, IndexView, IndexViewProvider, ViewGuard};
use crate::iteration::{Flow, Window, field_order, natural_order};
use crate::metrics::SearcherMetrics;
use crate::property_set::PropertySet;
use crate::query_compiler::{IndexQueryCompiler, QueryCompiler, SortKey};
use crate::request::SearchRequest;
use crate::results::ResultSet;
use crate::selection::PropertySelection;
use crate::sorting::{SortDirection, Sorting};

/// Target of the slow-query warning event
pub const SLOW_QUERY_TARGET: &str = "vortikal.search.slow_query";

/// Thread-safe search executor
pub struct IndexSearcher {
    provider: Arc<dyn IndexViewProvider>,
    compiler: Arc<dyn QueryCompiler>,
    resolver: Arc<dyn PrincipalResolver>,
    config: SearchConfig,
    metrics: SearcherMetrics,
}

impl IndexSearcher {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IndexViewProvider>,
        compiler: Arc<dyn QueryCompiler>,
        resolver: Arc<dyn PrincipalResolver>,
        config: SearchConfig,
    ) -> Self {
        Self {
            provider,
            compiler,
            resolver,
            config,
            metrics: SearcherMetrics::new(),
        }
    }

    /// Searcher over `manager` with an [`IndexQueryCompiler`] for its schema
    /// and the manager's configuration.
    #[must_use]
    pub fn for_manager(manager: Arc<IndexManager>, resolver: Arc<dyn PrincipalResolver>) -> Self {
        let compiler = Arc::new(IndexQueryCompiler::new(Arc::clone(manager.schema())));
        let config = *manager.config();
        Self::new(manager, compiler, resolver, config)
    }

    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    #[must_use]
    pub const fn metrics(&self) -> &SearcherMetrics {
        &self.metrics
    }

    /// Run `request` and return the `[cursor, cursor + limit)` window of the
    /// ranked matches together with the total match count.
    ///
    /// At most `min(max_ranked_hits, cursor + limit)` matches are ranked, so
    /// a cursor past that ceiling yields an empty window; `total_hits` still
    /// counts every match.
    pub fn execute(
        &self,
        token: Option<&AuthToken>,
        request: &SearchRequest,
    ) -> SearchResult<ResultSet> {
        self.metrics.executions_total.inc();
        let started = Instant::now();
        let result = self.execute_in_view(token, request);
        self.metrics.record_latency(started.elapsed());
        if result.is_err() {
            self.metrics.errors_total.inc();
        }
        result
    }

    fn execute_in_view(
        &self,
        token: Option<&AuthToken>,
        request: &SearchRequest,
    ) -> SearchResult<ResultSet> {
        let guard = ViewGuard::acquire(self.provider.as_ref())?;
        let view = guard.view();
        let visibility = self.resolver.resolve(token)?;

        // slow-query clock covers compile through materialize
        let started = Instant::now();
        let query: Box<dyn TantivyQuery> = match request.query() {
            Some(query) => self.compiler.compile_query(query)?,
            None => Box::new(AllQuery),
        };
        let filter = self
            .compiler
            .compile_filter(&visibility, request.filter_flags())?;
        let sort = match request.sorting() {
            Some(sorting) if !sorting.is_empty() => Some(self.compiler.compile_sort(sorting)?),
            _ => None,
        };
        let query = apply_filter(query, filter);

        let need = request.cursor().saturating_add(request.limit());
        let cap = self.config.max_ranked_hits.min(need);
        let searcher = view.searcher();
        let (ranked, total_hits) = if cap == 0 {
            let total = searcher
                .search(query.as_ref(), &Count)
                .map_err(|e| SearchError::query("counting matches", e))?;
            (Vec::new(), total)
        } else if let Some(sort) = &sort {
            let uri_field = view.schema().fields().uri;
            let uri_field_name = view.schema().schema().get_field_name(uri_field);
            let collector = SortedTopCollector::new(&sort.keys, uri_field_name, cap);
            searcher
                .search(query.as_ref(), &(collector, Count))
                .map_err(|e| SearchError::query("executing sorted search", e))?
        } else {
            let (top, total) = searcher
                .search(query.as_ref(), &(TopDocs::with_limit(cap), Count))
                .map_err(|e| SearchError::query("executing ranked search", e))?;
            (top.into_iter().map(|(_, address)| address).collect(), total)
        };

        let results = ranked
            .into_iter()
            .skip(request.cursor())
            .take(request.limit())
            .map(|address| self.load(view, address, request.selection()))
            .collect::<SearchResult<Vec<_>>>()?;

        let elapsed = started.elapsed();
        if elapsed >= self.config.slow_query_warn {
            self.metrics.slow_queries_total.inc();
            warn!(
                target: SLOW_QUERY_TARGET,
                query = ?query,
                cap,
                total_hits,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "slow search query"
            );
        }
        debug!(
            generation = view.generation(),
            cap,
            total_hits,
            returned = results.len(),
            sorted = sort.is_some(),
            "search executed"
        );
        Ok(ResultSet::new(results, total_hits))
    }

    /// Stream matching property-sets to `callback` in natural index order or
    /// ascending order of one sort field.
    ///
    /// The first `cursor` matches are skipped without being loaded; at most
    /// `limit` are delivered. Returning `Ok(false)` from the callback stops
    /// traversal.
    ///
    /// # Errors
    /// [`SearchError::Unsupported`] for more than one sort field or a
    /// descending one, raised before the index is touched. Callback errors
    /// are returned as they are; engine errors are converted with `From`.
    pub fn iterate_matching<F, E>(
        &self,
        token: Option<&AuthToken>,
        request: &SearchRequest,
        mut callback: F,
    ) -> Result<(), E>
    where
        F: FnMut(PropertySet) -> Result<bool, E>,
        E: From<SearchError>,
    {
        self.metrics.iterations_total.inc();
        let result = self.iterate_in_view(token, request, &mut callback);
        if result.is_err() {
            self.metrics.errors_total.inc();
        }
        result
    }

    fn iterate_in_view<F, E>(
        &self,
        token: Option<&AuthToken>,
        request: &SearchRequest,
        callback: &mut F,
    ) -> Result<(), E>
    where
        F: FnMut(PropertySet) -> Result<bool, E>,
        E: From<SearchError>,
    {
        let sort_key = self.iteration_sort(request.sorting())?;
        if request.limit() == 0 {
            return Ok(());
        }

        let guard = ViewGuard::acquire(self.provider.as_ref())?;
        let view = guard.view();
        let weight = self.iteration_weight(view.searcher(), token, request)?;

        let mut window = Window::new(request.cursor(), request.limit());
        let mut deliver = |address: DocAddress| -> Result<Flow, E> {
            let set = self.load(view, address, request.selection())?;
            self.metrics.matches_delivered_total.inc();
            Ok(Flow::from_continue(callback(set)?))
        };
        match &sort_key {
            None => natural_order(
                view.searcher(),
                weight.as_deref(),
                &mut window,
                &mut deliver,
            ),
            Some(key) => field_order(
                view.searcher(),
                key.field,
                weight.as_deref(),
                &mut window,
                &mut deliver,
            ),
        }
    }

    /// Single ascending field, or `None` for natural order
    fn iteration_sort(&self, sorting: Option<&Sorting>) -> SearchResult<Option<SortKey>> {
        let Some(sorting) = sorting.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        if sorting.fields().len() > 1 {
            return Err(SearchError::Unsupported(format!(
                "iteration supports one sort field, got {}",
                sorting.fields().len()
            )));
        }
        if sorting
            .fields()
            .iter()
            .any(|field| field.direction == SortDirection::Descending)
        {
            return Err(SearchError::Unsupported(format!(
                "iteration supports ascending order only, got {sorting}"
            )));
        }
        let mut compiled = self.compiler.compile_sort(sorting)?;
        Ok(compiled.keys.pop())
    }

    /// Query and structural/ACL filter combined into one unscored weight
    fn iteration_weight(
        &self,
        searcher: &Searcher,
        token: Option<&AuthToken>,
        request: &SearchRequest,
    ) -> SearchResult<Option<Box<dyn tantivy::query::Weight>>> {
        let visibility = self.resolver.resolve(token)?;
        let query = request
            .query()
            .map(|query| self.compiler.compile_query(query))
            .transpose()?;
        let filter = self
            .compiler
            .compile_filter(&visibility, request.filter_flags())?;
        let combined: Option<Box<dyn TantivyQuery>> = match (query, filter) {
            (None, filter) => filter,
            (Some(query), None) => Some(query),
            (Some(query), Some(filter)) => Some(Box::new(BooleanQuery::new(vec![
                (Occur::Must, query),
                (Occur::Must, filter),
            ]))),
        };
        combined
            .map(|query| query.weight(EnableScoring::disabled_from_searcher(searcher)))
            .transpose()
            .map_err(|e| SearchError::query("building iteration filter", e))
    }

    fn load(
        &self,
        view: &IndexView,
        address: DocAddress,
        selection: &PropertySelection,
    ) -> SearchResult<PropertySet> {
        let set = PropertySet::load(view.searcher(), view.schema(), address, selection)?;
        self.metrics.documents_loaded_total.inc();
        Ok(set)
    }
}

impl SearchEngine for IndexSearcher {
    fn execute(
        &self,
        token: Option<&AuthToken>,
        request: &SearchRequest,
    ) -> SearchResult<ResultSet> {
        Self::execute(self, token, request)
    }

    fn iterate(
        &self,
        token: Option<&AuthToken>,
        request: &SearchRequest,
        callback: &mut dyn FnMut(PropertySet) -> SearchResult<bool>,
    ) -> SearchResult<()> {
        self.iterate_matching(token, request, callback)
    }
}

impl fmt::Debug for IndexSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSearcher")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
