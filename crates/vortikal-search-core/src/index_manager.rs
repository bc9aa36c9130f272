//! Index lifecycle and point-in-time views
//!
//! [`IndexManager`] owns the tantivy index and its reader. Searches check out
//! an [`IndexView`] (a segment snapshot) through the [`IndexViewProvider`]
//! seam and hand it back exactly once, normally via [`ViewGuard`].

use std::fmt;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tantivy::{Index, IndexReader, ReloadPolicy, Searcher};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};
use crate::indexer::PropertySetIndexer;
use crate::schema::{IndexSchema, register_tokenizer};

/// File tantivy writes on first commit; its presence marks an existing index
const META_FILE: &str = "meta.json";

/// A checked-out, point-in-time-consistent view of the index
pub struct IndexView {
    searcher: Searcher,
    schema: Arc<IndexSchema>,
}

impl IndexView {
    #[must_use]
    pub const fn new(searcher: Searcher, schema: Arc<IndexSchema>) -> Self {
        Self { searcher, schema }
    }

    #[must_use]
    pub const fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    #[must_use]
    pub const fn schema(&self) -> &Arc<IndexSchema> {
        &self.schema
    }

    /// Reader generation this view was taken from
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.searcher.generation().generation_id()
    }

    /// Live documents visible in this view
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }
}

impl fmt::Debug for IndexView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexView")
            .field("generation", &self.generation())
            .field("segments", &self.searcher.segment_readers().len())
            .field("num_docs", &self.num_docs())
            .finish()
    }
}

/// Source of index views.
///
/// Must tolerate concurrent acquisition from many threads. Every acquired
/// view is released exactly once.
pub trait IndexViewProvider: Send + Sync {
    fn acquire_view(&self) -> SearchResult<IndexView>;

    fn release_view(&self, view: &IndexView);
}

/// Releases its view back to the provider when dropped, on every exit path
/// including unwinding.
pub struct ViewGuard<'a> {
    provider: &'a dyn IndexViewProvider,
    view: IndexView,
}

impl<'a> ViewGuard<'a> {
    pub fn acquire(provider: &'a dyn IndexViewProvider) -> SearchResult<Self> {
        let view = provider.acquire_view()?;
        Ok(Self { provider, view })
    }

    #[must_use]
    pub const fn view(&self) -> &IndexView {
        &self.view
    }
}

impl Drop for ViewGuard<'_> {
    fn drop(&mut self) {
        self.provider.release_view(&self.view);
    }
}

/// Owner of the tantivy index, its reader and the outstanding-view count
pub struct IndexManager {
    index: Index,
    reader: IndexReader,
    schema: Arc<IndexSchema>,
    config: SearchConfig,
    outstanding: AtomicUsize,
}

impl IndexManager {
    /// Fresh in-memory index.
    pub fn create_in_ram(schema: IndexSchema, config: SearchConfig) -> SearchResult<Self> {
        let index = Index::create_in_ram(schema.schema().clone());
        Self::from_index(index, schema, config)
    }

    /// Open the index in `dir`, creating it when absent.
    ///
    /// # Errors
    /// [`SearchError::SchemaMismatch`] when the index was last committed with
    /// a different schema hash.
    pub fn open_or_create(
        dir: &FsPath,
        schema: IndexSchema,
        config: SearchConfig,
    ) -> SearchResult<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| SearchError::query("creating index directory", e))?;

        let index = if dir.join(META_FILE).exists() {
            let index = Index::open_in_dir(dir)
                .map_err(|e| SearchError::query("opening index", e))?;
            let metas = index
                .load_metas()
                .map_err(|e| SearchError::query("reading index metadata", e))?;
            match metas.payload.as_deref() {
                Some(found) if found == schema.hash() => {}
                Some(found) => {
                    return Err(SearchError::SchemaMismatch {
                        expected: schema.hash().to_owned(),
                        found: found.to_owned(),
                    });
                }
                None if metas.segments.is_empty() => {}
                None => {
                    return Err(SearchError::SchemaMismatch {
                        expected: schema.hash().to_owned(),
                        found: "<no schema hash>".to_owned(),
                    });
                }
            }
            index
        } else {
            Index::create_in_dir(dir, schema.schema().clone())
                .map_err(|e| SearchError::query("creating index", e))?
        };
        debug!(dir = %dir.display(), schema = schema.hash_short(), "index opened");
        Self::from_index(index, schema, config)
    }

    fn from_index(index: Index, schema: IndexSchema, config: SearchConfig) -> SearchResult<Self> {
        register_tokenizer(&index);
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::query("opening index reader", e))?;
        Ok(Self {
            index,
            reader,
            schema: Arc::new(schema),
            config,
            outstanding: AtomicUsize::new(0),
        })
    }

    /// Make the latest commit visible to views acquired from now on
    pub fn refresh(&self) -> SearchResult<()> {
        self.reader
            .reload()
            .map_err(|e| SearchError::query("reloading index reader", e))
    }

    /// Open a writer; only one may exist at a time.
    pub fn indexer(&self) -> SearchResult<PropertySetIndexer<'_>> {
        PropertySetIndexer::new(self)
    }

    #[must_use]
    pub(crate) const fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub const fn schema(&self) -> &Arc<IndexSchema> {
        &self.schema
    }

    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Views acquired but not yet released
    #[must_use]
    pub fn outstanding_views(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Generation of the reader's current snapshot
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.reader.searcher().generation().generation_id()
    }

    /// Live documents in the current snapshot
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

impl IndexViewProvider for IndexManager {
    fn acquire_view(&self) -> SearchResult<IndexView> {
        let view = IndexView::new(self.reader.searcher(), Arc::clone(&self.schema));
        let outstanding = self.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation = view.generation(), outstanding, "index view acquired");
        Ok(view)
    }

    fn release_view(&self, view: &IndexView) {
        let released = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if released.is_err() {
            warn!(
                generation = view.generation(),
                "index view released more times than acquired"
            );
        }
        debug_assert!(
            released.is_ok(),
            "index view released more times than acquired"
        );
    }
}

impl fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexManager")
            .field("schema", &self.schema.hash_short())
            .field("outstanding_views", &self.outstanding_views())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
