//! Every acquired index view is released exactly once, whatever the outcome.

mod common;

use std::sync::Arc;
use std::thread;

use vortikal_search_core::{
    AuthToken, IndexManager, Query, SearchConfig, SearchEngine, SearchError, SearchRequest,
    SortField, SortTarget, Sorting,
};

use common::{Defs, Fault, build_index, instrumented, key, numbered, schema, searcher_for};

fn fixture() -> Arc<IndexManager> {
    let defs = Defs::new();
    build_index(&numbered(&defs, 8), 3, SearchConfig::default())
}

#[test]
fn balanced_across_successes_and_failures() {
    let manager = fixture();
    let (searcher, provider, compiler) = instrumented(&manager);
    let request = SearchRequest::for_query(Query::type_eq("file"));

    assert_eq!(searcher.execute(None, &request).unwrap().total_hits(), 8);

    compiler.set(Fault::Query);
    let err = searcher.execute(None, &request).unwrap_err();
    assert!(matches!(err, SearchError::Query { .. }), "{err}");
    let natural = request.clone().with_sorting(None);
    let err = searcher
        .iterate_matching(None, &natural, |_| Ok::<_, SearchError>(true))
        .unwrap_err();
    assert!(matches!(err, SearchError::Query { .. }), "{err}");

    compiler.set(Fault::Filter);
    assert!(searcher.execute(None, &request).is_err());
    compiler.set(Fault::None);

    let forged = AuthToken::new("forged");
    assert!(matches!(
        searcher.execute(Some(&forged), &request),
        Err(SearchError::InvalidToken)
    ));

    let mut seen = 0;
    searcher
        .iterate_matching(None, &natural, |_| {
            seen += 1;
            Ok::<_, SearchError>(true)
        })
        .unwrap();
    assert_eq!(seen, 8);

    assert_eq!(provider.acquired(), 6);
    assert_eq!(provider.acquired(), provider.released());
    assert_eq!(manager.outstanding_views(), 0);
    assert_eq!(searcher.metrics().snapshot().errors_total, 4);
}

#[test]
fn rejected_iteration_sort_never_acquires() {
    let manager = fixture();
    let (searcher, provider, _) = instrumented(&manager);

    let two_fields = Sorting::by(SortField::ascending(SortTarget::Uri))
        .then_by(SortField::ascending(SortTarget::Property(key("size"))));
    let descending = Sorting::by(SortField::descending(SortTarget::Property(key("size"))));
    for sorting in [two_fields, descending] {
        let err = searcher
            .iterate_matching(
                None,
                &SearchRequest::new().with_sorting(Some(sorting)),
                |_| Ok::<_, SearchError>(true),
            )
            .unwrap_err();
        assert!(matches!(err, SearchError::Unsupported(_)), "{err}");
    }
    assert_eq!(provider.acquired(), 0);
    assert_eq!(provider.released(), 0);
}

#[test]
fn concurrent_searches_share_the_manager() {
    let manager = fixture();
    let searcher = searcher_for(&manager);
    let engine: &dyn SearchEngine = &searcher;

    thread::scope(|scope| {
        for worker in 0..4usize {
            scope.spawn(move || {
                for round in 0..10usize {
                    let cursor = (worker + round) % 8;
                    let results = engine
                        .execute(None, &SearchRequest::new().with_cursor(cursor).with_limit(2))
                        .unwrap();
                    assert_eq!(results.total_hits(), 8);
                    assert_eq!(results.len(), (8 - cursor).min(2));

                    let mut streamed = 0;
                    engine
                        .iterate(None, &SearchRequest::new().with_sorting(None), &mut |_| {
                            streamed += 1;
                            Ok(streamed < 5)
                        })
                        .unwrap();
                    assert_eq!(streamed, 5);
                }
            });
        }
    });

    assert_eq!(manager.outstanding_views(), 0);
    let snapshot = searcher.metrics().snapshot();
    assert_eq!(snapshot.executions_total, 40);
    assert_eq!(snapshot.iterations_total, 40);
}

#[test]
fn reopened_index_serves_searches() {
    let dir = tempfile::tempdir().unwrap();
    let defs = Defs::new();
    {
        let manager = IndexManager::open_or_create(dir.path(), schema(), SearchConfig::default())
            .unwrap();
        let mut indexer = manager.indexer().unwrap();
        for resource in numbered(&defs, 4) {
            indexer.add(&resource).unwrap();
        }
        indexer.commit().unwrap();
    }

    let manager = Arc::new(
        IndexManager::open_or_create(dir.path(), schema(), SearchConfig::default()).unwrap(),
    );
    let searcher = searcher_for(&manager);
    let results = searcher
        .execute(
            None,
            &SearchRequest::new()
                .with_sorting(Some(Sorting::by(SortField::descending(SortTarget::Property(
                    key("size"),
                )))))
                .with_limit(2),
        )
        .unwrap();
    assert_eq!(common::uris(&results), ["/docs/d04", "/docs/d03"]);
    assert_eq!(results.total_hits(), 4);
    assert_eq!(manager.outstanding_views(), 0);
}
