//! Reader-global bitset of live, filter-accepted documents
//!
//! Global id of a document = base offset of its segment + its local id.
//! Bases are the running sum of `max_doc` over the view's segments, so every
//! document slot (deleted or not) has a bit.

use tantivy::query::Weight;
use tantivy::{DocId, DocSet, Searcher, SegmentReader, TERMINATED};

use crate::error::{SearchError, SearchResult};
use crate::iteration::Flow;

const WORD_BITS: u32 = 64;

/// Dense bitset over `u64` words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocBitSet {
    words: Vec<u64>,
    len: u32,
}

impl DocBitSet {
    /// All-zero bitset able to hold `len` bits
    #[must_use]
    pub fn empty(len: u32) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS) as usize],
            len,
        }
    }

    #[inline]
    const fn position(index: u32) -> (usize, u32) {
        ((index / WORD_BITS) as usize, index % WORD_BITS)
    }

    /// Set `index`; returns whether it was already set.
    #[inline]
    pub fn insert(&mut self, index: u32) -> bool {
        debug_assert!(index < self.len, "bit {index} out of bounds ({})", self.len);
        let (word, bit) = Self::position(index);
        let mask = 1u64 << bit;
        let was_set = self.words[word] & mask != 0;
        self.words[word] |= mask;
        was_set
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, bit) = Self::position(index);
        self.words[word] & (1u64 << bit) != 0
    }

    /// Number of set bits
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Capacity in bits
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set bits in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let base = i as u32 * WORD_BITS;
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros();
                rest &= rest - 1;
                Some(base + bit)
            })
        })
    }
}

/// Documents of one view that are alive and accepted by an optional filter
#[derive(Debug, Clone)]
pub struct LiveDocs {
    bits: DocBitSet,
    bases: Vec<u32>,
}

impl LiveDocs {
    /// One pass per segment. Without a filter every alive document is set.
    pub fn compute(searcher: &Searcher, filter: Option<&dyn Weight>) -> SearchResult<Self> {
        let (bases, total) = segment_bases(searcher)?;
        let mut bits = DocBitSet::empty(total);

        for (ord, reader) in searcher.segment_readers().iter().enumerate() {
            let base = bases[ord];
            for_each_candidate::<SearchError>(reader, filter, |doc| {
                bits.insert(base + doc);
                Ok(Flow::Continue)
            })?;
        }
        Ok(Self { bits, bases })
    }

    /// Global id of `doc` in segment `segment_ord`
    #[inline]
    #[must_use]
    pub fn global_id(&self, segment_ord: usize, doc: DocId) -> u32 {
        self.bases[segment_ord] + doc
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, segment_ord: usize, doc: DocId) -> bool {
        self.bits.contains(self.global_id(segment_ord, doc))
    }

    /// Number of live, accepted documents
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.count()
    }

    /// Total document slots across all segments
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.bits.len()
    }

    #[must_use]
    pub const fn bits(&self) -> &DocBitSet {
        &self.bits
    }
}

/// Base offset of every segment, plus the total slot count
fn segment_bases(searcher: &Searcher) -> SearchResult<(Vec<u32>, u32)> {
    let mut bases = Vec::with_capacity(searcher.segment_readers().len());
    let mut next: u32 = 0;
    for reader in searcher.segment_readers() {
        bases.push(next);
        next = next.checked_add(reader.max_doc()).ok_or_else(|| {
            SearchError::Unsupported("view holds more than u32::MAX document slots".into())
        })?;
    }
    Ok((bases, next))
}

/// Visit each alive document of `reader` the filter accepts, in doc-id
/// order, until `visit` returns [`Flow::Stop`].
///
/// Scorers do not skip deleted documents, so liveness is checked here.
pub(crate) fn for_each_candidate<E>(
    reader: &SegmentReader,
    filter: Option<&dyn Weight>,
    mut visit: impl FnMut(DocId) -> Result<Flow, E>,
) -> Result<Flow, E>
where
    E: From<SearchError>,
{
    let alive = reader.alive_bitset();
    let is_alive = |doc: DocId| alive.is_none_or(|bits| bits.is_alive(doc));
    match filter {
        None => {
            for doc in 0..reader.max_doc() {
                if is_alive(doc) && visit(doc)? == Flow::Stop {
                    return Ok(Flow::Stop);
                }
            }
        }
        Some(weight) => {
            let mut scorer = weight
                .scorer(reader, 1.0)
                .map_err(|e| SearchError::query("building filter scorer", e))?;
            let mut doc = scorer.doc();
            while doc != TERMINATED {
                if is_alive(doc) && visit(doc)? == Flow::Stop {
                    return Ok(Flow::Stop);
                }
                doc = scorer.advance();
            }
        }
    }
    Ok(Flow::Continue)
}
