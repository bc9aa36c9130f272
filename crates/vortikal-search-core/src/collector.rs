//! Top-N collector ranking by a composite sort key
//!
//! Each segment keeps a bounded heap keyed on segment-local values (string
//! ordinals, i64s); only the survivors are resolved to strings at harvest,
//! and the merge compares resolved keys. Missing values sort last in either
//! direction; ties fall back to the URI, then to the document address.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io;

use tantivy::collector::{Collector, SegmentCollector};
use tantivy::columnar::{Column, StrColumn};
use tantivy::{DocAddress, DocId, Score, SegmentOrdinal, SegmentReader};

use crate::query_compiler::{SortKey, SortKeyKind};
use crate::sorting::SortDirection;

#[derive(Debug, Clone)]
struct SlotSpec {
    field_name: String,
    kind: SortKeyKind,
    descending: bool,
}

/// Collects the addresses of the best `limit` documents in sort order
#[derive(Debug, Clone)]
pub struct SortedTopCollector {
    slots: Vec<SlotSpec>,
    limit: usize,
}

impl SortedTopCollector {
    /// `uri_field` is appended as an ascending tiebreak.
    #[must_use]
    pub fn new(keys: &[SortKey], uri_field: &str, limit: usize) -> Self {
        let mut slots: Vec<SlotSpec> = keys
            .iter()
            .map(|key| SlotSpec {
                field_name: key.field_name.clone(),
                kind: key.kind,
                descending: key.direction == SortDirection::Descending,
            })
            .collect();
        slots.push(SlotSpec {
            field_name: uri_field.to_owned(),
            kind: SortKeyKind::Str,
            descending: false,
        });
        Self { slots, limit }
    }
}

enum SlotReader {
    Str(Option<StrColumn>),
    I64(Option<Column<i64>>),
}

impl SlotReader {
    fn open(reader: &SegmentReader, spec: &SlotSpec) -> tantivy::Result<Self> {
        let fast = reader.fast_fields();
        Ok(match spec.kind {
            SortKeyKind::Str => Self::Str(fast.str(&spec.field_name)?),
            SortKeyKind::I64 => Self::I64(fast.column_opt::<i64>(&spec.field_name)?),
        })
    }

    /// Smallest of `doc`'s values, normalized so that ascending order of the
    /// result is the requested order.
    fn local_value(&self, doc: DocId, descending: bool) -> LocalValue {
        match self {
            Self::Str(Some(column)) => {
                column
                    .term_ords(doc)
                    .min()
                    .map_or(LocalValue::Missing, |ord| {
                        LocalValue::Ordinal(if descending { u64::MAX - ord } else { ord })
                    })
            }
            Self::I64(Some(column)) => column
                .values_for_doc(doc)
                .min()
                .map_or(LocalValue::Missing, |v| {
                    LocalValue::Int(if descending { !v } else { v })
                }),
            Self::Str(None) | Self::I64(None) => LocalValue::Missing,
        }
    }

    fn resolve(&self, value: &LocalValue, descending: bool) -> io::Result<SortValue> {
        Ok(match (self, value) {
            (Self::Str(Some(column)), LocalValue::Ordinal(stored)) => {
                let ord = if descending { u64::MAX - stored } else { *stored };
                let mut text = String::new();
                if !column.ord_to_str(ord, &mut text)? {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("term ordinal {ord} missing from dictionary"),
                    ));
                }
                if descending {
                    SortValue::Desc(Reverse(text))
                } else {
                    SortValue::Asc(text)
                }
            }
            (_, LocalValue::Int(v)) => SortValue::Int(*v),
            _ => SortValue::Missing,
        })
    }
}

/// Segment-local key component; derive order puts `Missing` last
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum LocalValue {
    Int(i64),
    Ordinal(u64),
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct LocalRanked {
    key: Vec<LocalValue>,
    doc: DocId,
}

/// Resolved key component, comparable across segments
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Int(i64),
    Asc(String),
    Desc(Reverse<String>),
    Missing,
}

/// A harvested hit with its resolved key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankedDoc {
    key: Vec<SortValue>,
    segment_ord: SegmentOrdinal,
    doc: DocId,
}

pub struct SortedSegmentCollector {
    segment_ord: SegmentOrdinal,
    readers: Vec<SlotReader>,
    descending: Vec<bool>,
    limit: usize,
    heap: BinaryHeap<LocalRanked>,
}

impl Collector for SortedTopCollector {
    type Fruit = Vec<DocAddress>;
    type Child = SortedSegmentCollector;

    fn for_segment(
        &self,
        segment_local_id: SegmentOrdinal,
        reader: &SegmentReader,
    ) -> tantivy::Result<Self::Child> {
        let readers = self
            .slots
            .iter()
            .map(|spec| SlotReader::open(reader, spec))
            .collect::<tantivy::Result<Vec<_>>>()?;
        Ok(SortedSegmentCollector {
            segment_ord: segment_local_id,
            readers,
            descending: self.slots.iter().map(|spec| spec.descending).collect(),
            limit: self.limit,
            heap: BinaryHeap::with_capacity(self.limit.min(1024) + 1),
        })
    }

    fn requires_scoring(&self) -> bool {
        false
    }

    fn merge_fruits(
        &self,
        segment_fruits: Vec<io::Result<Vec<RankedDoc>>>,
    ) -> tantivy::Result<Self::Fruit> {
        let mut all = Vec::new();
        for fruit in segment_fruits {
            all.extend(fruit?);
        }
        all.sort_unstable();
        all.truncate(self.limit);
        Ok(all
            .into_iter()
            .map(|ranked| DocAddress::new(ranked.segment_ord, ranked.doc))
            .collect())
    }
}

impl SegmentCollector for SortedSegmentCollector {
    type Fruit = io::Result<Vec<RankedDoc>>;

    fn collect(&mut self, doc: DocId, _score: Score) {
        if self.limit == 0 {
            return;
        }
        let key = self
            .readers
            .iter()
            .zip(&self.descending)
            .map(|(reader, &descending)| reader.local_value(doc, descending))
            .collect();
        self.heap.push(LocalRanked { key, doc });
        if self.heap.len() > self.limit {
            self.heap.pop();
        }
    }

    fn harvest(self) -> Self::Fruit {
        self.heap
            .into_iter()
            .map(|local| {
                let key = local
                    .key
                    .iter()
                    .zip(self.readers.iter().zip(&self.descending))
                    .map(|(value, (reader, &descending))| reader.resolve(value, descending))
                    .collect::<io::Result<Vec<_>>>()?;
                Ok(RankedDoc {
                    key,
                    segment_ord: self.segment_ord,
                    doc: local.doc,
                })
            })
            .collect()
    }
}
