//! Shared fixtures: a segmented in-RAM index with tombstones, a counting
//! view provider and a fault-injecting compiler.

#![allow(dead_code, clippy::missing_const_for_fn)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use tantivy::TantivyError;
use tantivy::query::Query as TantivyQuery;
use vortikal_core::{
    Acl, Path, Principal, Privilege, Property, PropertyKey, PropertyType, PropertyTypeDefinition,
    PropertyValue, ResourceTypeTree,
};
use vortikal_search_core::{
    CompiledSort, FilterFlag, IndexManager, IndexQueryCompiler, IndexSchema, IndexSearcher,
    IndexView, IndexViewProvider, IndexedResource, PrincipalResolver, Query, QueryCompiler,
    ResultSet, SearchConfig, SearchError, SearchResult, Sorting, StaticPrincipalResolver,
    Visibility,
};

pub fn key(name: &str) -> PropertyKey {
    PropertyKey::new("resource", name).unwrap()
}

/// Registered property definitions of the fixture schema
pub struct Defs {
    pub title: Arc<PropertyTypeDefinition>,
    pub size: Arc<PropertyTypeDefinition>,
    pub body: Arc<PropertyTypeDefinition>,
    pub tags: Arc<PropertyTypeDefinition>,
    pub modified: Arc<PropertyTypeDefinition>,
}

impl Defs {
    pub fn new() -> Self {
        Self {
            title: Arc::new(PropertyTypeDefinition::new(key("title"), PropertyType::String)),
            size: Arc::new(PropertyTypeDefinition::new(key("size"), PropertyType::Integer)),
            body: Arc::new(PropertyTypeDefinition::new(key("body"), PropertyType::Text)),
            tags: Arc::new(PropertyTypeDefinition::multiple(
                key("tags"),
                PropertyType::String,
            )),
            modified: Arc::new(PropertyTypeDefinition::new(
                key("modified"),
                PropertyType::Timestamp,
            )),
        }
    }

    pub fn title(&self, value: &str) -> Property {
        Property::single(Arc::clone(&self.title), PropertyValue::String(value.into())).unwrap()
    }

    pub fn size(&self, value: i64) -> Property {
        Property::single(Arc::clone(&self.size), PropertyValue::Integer(value)).unwrap()
    }

    pub fn body(&self, value: &str) -> Property {
        Property::single(Arc::clone(&self.body), PropertyValue::Text(value.into())).unwrap()
    }

    pub fn tags(&self, values: &[&str]) -> Property {
        Property::new(
            Arc::clone(&self.tags),
            values
                .iter()
                .map(|v| PropertyValue::String((*v).to_owned()))
                .collect(),
        )
        .unwrap()
    }

    pub fn modified(&self, day: u32) -> Property {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();
        Property::single(Arc::clone(&self.modified), PropertyValue::Timestamp(ts)).unwrap()
    }
}

pub fn resource_types() -> ResourceTypeTree {
    ResourceTypeTree::new()
        .with_type("resource", None)
        .and_then(|t| t.with_type("collection", Some("resource")))
        .and_then(|t| t.with_type("file", Some("resource")))
        .and_then(|t| t.with_type("image", Some("file")))
        .unwrap()
}

pub fn schema() -> IndexSchema {
    let defs = Defs::new();
    IndexSchema::build(
        [&defs.title, &defs.size, &defs.body, &defs.tags, &defs.modified]
            .into_iter()
            .map(|d| (**d).clone()),
        resource_types(),
    )
    .unwrap()
}

/// Published resource readable by everyone
pub fn public(uri: &str, resource_type: &str) -> IndexedResource {
    IndexedResource::new(Path::parse(uri).unwrap(), resource_type)
        .with_acl(Acl::new().with(Privilege::Read, Principal::all()))
}

/// Numbered files `/docs/d01..` with title `Doc NN` and size `NN`
pub fn numbered(defs: &Defs, count: usize) -> Vec<IndexedResource> {
    (1..=count)
        .map(|n| {
            public(&format!("/docs/d{n:02}"), "file")
                .with_property(defs.title(&format!("Doc {n:02}")))
                .with_property(defs.size(i64::try_from(n).unwrap()))
        })
        .collect()
}

/// Index `resources` in segments of `per_segment`, each segment carrying a
/// document that is deleted afterwards.
pub fn build_index(
    resources: &[IndexedResource],
    per_segment: usize,
    config: SearchConfig,
) -> Arc<IndexManager> {
    let manager = IndexManager::create_in_ram(schema(), config).unwrap();
    {
        let mut indexer = manager.indexer().unwrap().without_merges();
        for (i, chunk) in resources.chunks(per_segment.max(1)).enumerate() {
            for resource in chunk {
                indexer.add(resource).unwrap();
            }
            indexer
                .add(&public(&format!("/tombstones/t{i}"), "file"))
                .unwrap();
            indexer.commit().unwrap();
        }
        indexer.delete_subtree(&Path::parse("/tombstones").unwrap());
        indexer.commit().unwrap();
    }
    Arc::new(manager)
}

pub fn resolver() -> Arc<StaticPrincipalResolver> {
    Arc::new(
        StaticPrincipalResolver::new()
            .with_session("s-alice", "alice", ["staff"])
            .with_session("s-bob", "bob", Vec::<String>::new())
            .with_root("s-root"),
    )
}

pub fn searcher_for(manager: &Arc<IndexManager>) -> IndexSearcher {
    IndexSearcher::for_manager(Arc::clone(manager), resolver())
}

pub fn uris(results: &ResultSet) -> Vec<String> {
    results.iter().map(|set| set.uri().to_string()).collect()
}

/// Wraps a manager and counts acquire/release calls
pub struct CountingProvider {
    pub inner: Arc<IndexManager>,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl CountingProvider {
    pub fn new(inner: Arc<IndexManager>) -> Self {
        Self {
            inner,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl IndexViewProvider for CountingProvider {
    fn acquire_view(&self) -> SearchResult<IndexView> {
        let view = self.inner.acquire_view()?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(view)
    }

    fn release_view(&self, view: &IndexView) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release_view(view);
    }
}

/// Which compiler stage throws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Query,
    Filter,
}

/// Delegating compiler that can be told to fail
pub struct FaultyCompiler {
    pub inner: IndexQueryCompiler,
    pub fault: std::sync::Mutex<Fault>,
}

impl FaultyCompiler {
    pub fn new(manager: &IndexManager) -> Self {
        Self {
            inner: IndexQueryCompiler::new(Arc::clone(manager.schema())),
            fault: std::sync::Mutex::new(Fault::None),
        }
    }

    pub fn set(&self, fault: Fault) {
        *self.fault.lock().unwrap() = fault;
    }

    fn injected(stage: &str) -> SearchError {
        SearchError::query(
            stage,
            TantivyError::InternalError(format!("injected {stage} failure")),
        )
    }
}

impl QueryCompiler for FaultyCompiler {
    fn compile_query(&self, query: &Query) -> SearchResult<Box<dyn TantivyQuery>> {
        if *self.fault.lock().unwrap() == Fault::Query {
            return Err(Self::injected("query"));
        }
        self.inner.compile_query(query)
    }

    fn compile_filter(
        &self,
        visibility: &Visibility,
        flags: &BTreeSet<FilterFlag>,
    ) -> SearchResult<Option<Box<dyn TantivyQuery>>> {
        if *self.fault.lock().unwrap() == Fault::Filter {
            return Err(Self::injected("filter"));
        }
        self.inner.compile_filter(visibility, flags)
    }

    fn compile_sort(&self, sorting: &Sorting) -> SearchResult<CompiledSort> {
        self.inner.compile_sort(sorting)
    }
}

/// Searcher wired through a counting provider and a faulty compiler
pub fn instrumented(
    manager: &Arc<IndexManager>,
) -> (IndexSearcher, Arc<CountingProvider>, Arc<FaultyCompiler>) {
    let provider = Arc::new(CountingProvider::new(Arc::clone(manager)));
    let compiler = Arc::new(FaultyCompiler::new(manager));
    let resolver: Arc<dyn PrincipalResolver> = resolver();
    let searcher = IndexSearcher::new(
        Arc::clone(&provider) as Arc<dyn IndexViewProvider>,
        Arc::clone(&compiler) as Arc<dyn QueryCompiler>,
        resolver,
        *manager.config(),
    );
    (searcher, provider, compiler)
}
