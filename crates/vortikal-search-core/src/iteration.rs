//! Streaming traversal of matching documents
//!
//! Two orders are supported:
//! - natural: segment by segment, document id ascending
//! - field: ascending byte order of one field's terms, merged across the
//!   per-segment term dictionaries with a k-way heap merge
//!
//! Both apply a cursor/limit [`Window`] and hand document addresses to a
//! delivery callback, which decides whether traversal continues. Documents
//! skipped by the cursor are never delivered, so they are never loaded.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tantivy::query::Weight;
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::termdict::TermStreamer;
use tantivy::{DocAddress, DocSet, InvertedIndexReader, Searcher, TERMINATED};
use tracing::debug;

use crate::error::SearchError;
use crate::live_docs::{DocBitSet, LiveDocs, for_each_candidate};

/// Whether traversal goes on after a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

impl Flow {
    #[must_use]
    pub const fn from_continue(keep_going: bool) -> Self {
        if keep_going { Self::Continue } else { Self::Stop }
    }
}

/// Cursor/limit window over a stream of matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    skip: usize,
    remaining: usize,
}

impl Window {
    #[must_use]
    pub const fn new(cursor: usize, limit: usize) -> Self {
        Self {
            skip: cursor,
            remaining: limit,
        }
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Count one match; `true` if it falls inside the window.
    pub const fn admit(&mut self) -> bool {
        if self.skip > 0 {
            self.skip -= 1;
            false
        } else if self.remaining > 0 {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }
}

/// Segment order, document id ascending within a segment
pub fn natural_order<E>(
    searcher: &Searcher,
    filter: Option<&dyn Weight>,
    window: &mut Window,
    deliver: &mut dyn FnMut(DocAddress) -> Result<Flow, E>,
) -> Result<(), E>
where
    E: From<SearchError>,
{
    debug!(
        segments = searcher.segment_readers().len(),
        filtered = filter.is_some(),
        "iterating in natural order"
    );
    for (ord, reader) in searcher.segment_readers().iter().enumerate() {
        if window.is_exhausted() {
            break;
        }
        let segment_ord = segment_ord(ord);
        let flow = for_each_candidate::<E>(reader, filter, |doc| {
            if !window.admit() {
                return Ok(Flow::Continue);
            }
            let flow = deliver(DocAddress::new(segment_ord, doc))?;
            Ok(if window.is_exhausted() { Flow::Stop } else { flow })
        })?;
        if flow == Flow::Stop {
            break;
        }
    }
    Ok(())
}

/// Ascending term order of `field`.
///
/// Documents without a term in `field` are not delivered. A document with
/// several terms is delivered once, at its smallest term. Equal terms from
/// different segments are delivered in segment order.
pub fn field_order<E>(
    searcher: &Searcher,
    field: Field,
    filter: Option<&dyn Weight>,
    window: &mut Window,
    deliver: &mut dyn FnMut(DocAddress) -> Result<Flow, E>,
) -> Result<(), E>
where
    E: From<SearchError>,
{
    let live = LiveDocs::compute(searcher, filter)?;
    debug!(
        segments = searcher.segment_readers().len(),
        candidates = live.count(),
        "iterating in field order"
    );
    if live.count() == 0 || window.is_exhausted() {
        return Ok(());
    }

    let readers: Vec<Arc<InvertedIndexReader>> = searcher
        .segment_readers()
        .iter()
        .map(|reader| reader.inverted_index(field))
        .collect::<tantivy::Result<_>>()
        .map_err(|e| SearchError::query("opening inverted index", e))?;
    let mut streams: Vec<TermStreamer<'_>> = readers
        .iter()
        .map(|reader| reader.terms().stream())
        .collect::<std::io::Result<_>>()
        .map_err(|e| SearchError::query("opening term dictionary", e))?;

    let mut heap: BinaryHeap<Reverse<(Vec<u8>, usize)>> = BinaryHeap::new();
    for (ord, stream) in streams.iter_mut().enumerate() {
        if stream.advance() {
            heap.push(Reverse((stream.key().to_vec(), ord)));
        }
    }

    let mut visited = DocBitSet::empty(live.capacity());
    while let Some(Reverse((_, ord))) = heap.pop() {
        let stream = &mut streams[ord];
        let mut postings = readers[ord]
            .read_postings_from_terminfo(stream.value(), IndexRecordOption::Basic)
            .map_err(|e| SearchError::query("reading postings", e))?;
        let mut doc = postings.doc();
        while doc != TERMINATED {
            if live.contains(ord, doc) && !visited.insert(live.global_id(ord, doc)) && window.admit()
            {
                let flow = deliver(DocAddress::new(segment_ord(ord), doc))?;
                if flow == Flow::Stop || window.is_exhausted() {
                    return Ok(());
                }
            }
            doc = postings.advance();
        }
        if stream.advance() {
            heap.push(Reverse((stream.key().to_vec(), ord)));
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
const fn segment_ord(ord: usize) -> u32 {
    ord as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::index_manager::{IndexManager, IndexViewProvider};
    use crate::indexer::IndexedResource;
    use crate::schema::IndexSchema;
    use tantivy::schema::Value;
    use tantivy::TantivyDocument;
    use vortikal_core::{
        Path, Property, PropertyKey, PropertyType, PropertyTypeDefinition, PropertyValue,
        ResourceTypeTree,
    };

    fn tags() -> PropertyTypeDefinition {
        PropertyTypeDefinition::multiple(
            PropertyKey::new("resource", "tags").unwrap(),
            PropertyType::String,
        )
    }

    /// Three segments; `/n1` is deleted, `/n9` carries no tags
    fn manager() -> IndexManager {
        let schema = IndexSchema::build(
            [tags()],
            ResourceTypeTree::new().with_type("file", None).unwrap(),
        )
        .unwrap();
        let manager = IndexManager::create_in_ram(schema, SearchConfig::default()).unwrap();
        let definition = Arc::new(tags());
        let mut indexer = manager.indexer().unwrap().without_merges();
        let batches = [
            vec![("/n3", vec!["c"]), ("/n1", vec!["a"]), ("/n5", vec!["e", "b"])],
            vec![("/n2", vec!["bb"]), ("/n9", vec![]), ("/n4", vec!["d"])],
            vec![("/n6", vec!["ba", "f"])],
        ];
        for batch in batches {
            for (uri, values) in batch {
                let mut resource = IndexedResource::new(Path::parse(uri).unwrap(), "file");
                if !values.is_empty() {
                    let values = values
                        .iter()
                        .map(|v| PropertyValue::String((*v).to_owned()))
                        .collect();
                    resource =
                        resource.with_property(Property::new(Arc::clone(&definition), values).unwrap());
                }
                indexer.add(&resource).unwrap();
            }
            indexer.commit().unwrap();
        }
        indexer.delete(&Path::parse("/n1").unwrap());
        indexer.commit().unwrap();
        manager
    }

    fn uris(
        manager: &IndexManager,
        by_tags: bool,
        window: Window,
        stop_after: Option<usize>,
    ) -> Vec<String> {
        let view = manager.acquire_view().unwrap();
        let uri_field = manager.schema().fields().uri;
        let tags_field = manager.schema().property(&tags().key).unwrap().field;
        let mut window = window;
        let mut seen = Vec::new();
        let mut deliver = |address: DocAddress| -> Result<Flow, SearchError> {
            let doc: TantivyDocument = view.searcher().doc(address).unwrap();
            seen.push(doc.get_first(uri_field).unwrap().as_str().unwrap().to_owned());
            Ok(Flow::from_continue(stop_after != Some(seen.len())))
        };
        if by_tags {
            field_order(view.searcher(), tags_field, None, &mut window, &mut deliver).unwrap();
        } else {
            natural_order(view.searcher(), None, &mut window, &mut deliver).unwrap();
        }
        manager.release_view(&view);
        seen
    }

    #[test]
    fn window_admits_after_skip() {
        let mut window = Window::new(2, 2);
        let admitted: Vec<bool> = (0..6).map(|_| window.admit()).collect();
        assert_eq!(admitted, vec![false, false, true, true, false, false]);
        assert!(window.is_exhausted());
    }

    #[test]
    fn natural_order_skips_deleted() {
        let m = manager();
        let all = uris(&m, false, Window::new(0, 100), None);
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["/n2", "/n3", "/n4", "/n5", "/n6", "/n9"]);
        assert_eq!(uris(&m, false, Window::new(2, 3), None), all[2..5]);
        assert_eq!(uris(&m, false, Window::new(5, 3), None), all[5..]);
    }

    #[test]
    fn field_order_merges_segments_and_dedupes() {
        let m = manager();
        // a: n1 (deleted); b: n5; ba: n6; bb: n2; c: n3; d: n4; e, f: already seen
        let all = uris(&m, true, Window::new(0, 100), None);
        assert_eq!(all, vec!["/n5", "/n6", "/n2", "/n3", "/n4"]);
        assert_eq!(uris(&m, true, Window::new(1, 2), None), vec!["/n6", "/n2"]);
        assert!(uris(&m, true, Window::new(5, 2), None).is_empty());
    }

    #[test]
    fn callback_stop_ends_traversal() {
        let m = manager();
        assert_eq!(uris(&m, true, Window::new(0, 100), Some(2)), vec!["/n5", "/n6"]);
        let natural = uris(&m, false, Window::new(0, 100), None);
        assert_eq!(uris(&m, false, Window::new(0, 100), Some(1)), natural[..1]);
    }
}
