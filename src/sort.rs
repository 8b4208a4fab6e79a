//! Sorting documents by join field values
//!
//! A document's values in scope are reduced to one `SortValue` (MIN or MAX).
//! Documents without a value get `SortValue::Missing`, which is placed first
//! or last in the final output whatever the direction: the sentinel's natural
//! position is inverted before the direction is applied.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{JoinIndexError, Result};
use crate::ordinals::{GlobalJoinFieldData, SegmentGlobalView};
use crate::segment::{DocNo, JoinKey, SegmentId};

/// How several values of one document collapse into one sort key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiValueMode {
    #[default]
    Min,
    Max,
}

impl MultiValueMode {
    /// Smallest or largest of `values`, `None` when empty
    pub fn pick<T: Ord>(self, values: impl IntoIterator<Item = T>) -> Option<T> {
        match self {
            MultiValueMode::Min => values.into_iter().min(),
            MultiValueMode::Max => values.into_iter().max(),
        }
    }
}

impl FromStr for MultiValueMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min" => Ok(MultiValueMode::Min),
            "max" => Ok(MultiValueMode::Max),
            other => Err(format!("unknown sort mode '{}', expected min or max", other)),
        }
    }
}

/// Placement of documents without a value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingValue {
    #[serde(rename = "_first")]
    First,
    #[default]
    #[serde(rename = "_last")]
    Last,
}

impl FromStr for MissingValue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_start_matches('_').to_ascii_lowercase().as_str() {
            "first" => Ok(MissingValue::First),
            "last" => Ok(MissingValue::Last),
            other => Err(format!("unknown missing policy '{}', expected _first or _last", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl SortDirection {
    pub fn is_descending(self) -> bool {
        self == SortDirection::Descending
    }

    /// Apply the direction to an ascending ordering
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort order '{}', expected asc or desc", other)),
        }
    }
}

/// Which join values take part in the reduction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinScope {
    /// Values of one join type, reduced over global ordinals
    Type(String),
    /// The whole join field: every value of every type
    AllTypes,
}

impl fmt::Display for JoinScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinScope::Type(t) => write!(f, "{}", t),
            JoinScope::AllTypes => write!(f, "_all"),
        }
    }
}

/// Reduced sort key of one document
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortValue {
    Missing,
    Key(JoinKey),
}

impl SortValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, SortValue::Missing)
    }

    pub fn key(&self) -> Option<&JoinKey> {
        match self {
            SortValue::Key(key) => Some(key),
            SortValue::Missing => None,
        }
    }
}

/// A document with its sort key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortedHit {
    pub segment_id: SegmentId,
    pub doc: DocNo,
    /// Snapshot-wide document number, the tie breaker
    pub global_doc: u64,
    pub value: SortValue,
}

/// Produces and compares sort keys over one snapshot's global data
pub struct SortKeyExtractor {
    global: Arc<GlobalJoinFieldData>,
    scope: JoinScope,
    mode: MultiValueMode,
    missing: MissingValue,
    direction: SortDirection,
}

impl SortKeyExtractor {
    pub fn new(
        global: Arc<GlobalJoinFieldData>,
        scope: JoinScope,
        mode: MultiValueMode,
        missing: MissingValue,
        direction: SortDirection,
    ) -> Self {
        Self {
            global,
            scope,
            mode,
            missing,
            direction,
        }
    }

    pub fn scope(&self) -> &JoinScope {
        &self.scope
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Reduced sort key of `doc` in `segment_id`
    pub fn sort_value(&self, segment_id: SegmentId, doc: DocNo) -> Result<SortValue> {
        let view = self
            .global
            .segment(segment_id)
            .ok_or(JoinIndexError::UnknownSegment(segment_id))?;
        self.value_in(&view, doc)
    }

    fn value_in(&self, view: &SegmentGlobalView<'_>, doc: DocNo) -> Result<SortValue> {
        match &self.scope {
            JoinScope::Type(join_type) => {
                if !view.leaf().has_value(join_type, doc)? {
                    return Ok(SortValue::Missing);
                }
                // global ordinals are in byte order, so reduce before resolving
                match self.mode.pick(view.ordinals(join_type, doc)?) {
                    Some(ord) => Ok(SortValue::Key(view.lookup_ord(join_type, ord)?)),
                    None => Ok(SortValue::Missing),
                }
            }
            JoinScope::AllTypes => {
                let leaf = view.leaf();
                if !leaf.has_any_value(doc)? {
                    return Ok(SortValue::Missing);
                }
                Ok(self
                    .mode
                    .pick(leaf.bytes_values(doc)?)
                    .map_or(SortValue::Missing, SortValue::Key))
            }
        }
    }

    /// Order of two sort keys in the final output
    pub fn compare_values(&self, a: &SortValue, b: &SortValue) -> Ordering {
        // where Missing sits before the direction is applied
        let missing_high = (self.missing == MissingValue::Last) != self.direction.is_descending();
        let natural = match (a, b) {
            (SortValue::Missing, SortValue::Missing) => Ordering::Equal,
            (SortValue::Missing, SortValue::Key(_)) => {
                if missing_high {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (SortValue::Key(_), SortValue::Missing) => {
                if missing_high {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (SortValue::Key(x), SortValue::Key(y)) => x.cmp(y),
        };
        self.direction.apply(natural)
    }

    /// Order of two hits in the final output, ties by snapshot-wide docno
    pub fn compare(&self, a: &SortedHit, b: &SortedHit) -> Ordering {
        self.compare_values(&a.value, &b.value)
            .then_with(|| a.global_doc.cmp(&b.global_doc))
    }

    /// Every document of the snapshot in output order
    pub fn sort_all(&self) -> Result<Vec<SortedHit>> {
        let mut hits = Vec::new();
        for view in self.global.segments() {
            for doc in 0..view.max_doc() {
                hits.push(self.hit(&view, DocNo(doc))?);
            }
        }
        hits.sort_by(|a, b| self.compare(a, b));
        Ok(hits)
    }

    /// First `n` documents in output order
    pub fn top_n(&self, n: usize) -> Result<Vec<SortedHit>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        // never reserve more than the snapshot can fill
        let docs = usize::try_from(self.global.total_docs()).unwrap_or(usize::MAX);
        let mut heap = BinaryHeap::with_capacity(n.min(docs).saturating_add(1));
        // max-heap on output order: the worst kept hit is on top
        for view in self.global.segments() {
            for doc in 0..view.max_doc() {
                let hit = self.hit(&view, DocNo(doc))?;
                if heap.len() < n {
                    heap.push(Ranked { hit, extractor: self });
                } else if let Some(worst) = heap.peek() {
                    if self.compare(&hit, &worst.hit) == Ordering::Less {
                        heap.pop();
                        heap.push(Ranked { hit, extractor: self });
                    }
                }
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| ranked.hit)
            .collect())
    }

    fn hit(&self, view: &SegmentGlobalView<'_>, doc: DocNo) -> Result<SortedHit> {
        Ok(SortedHit {
            segment_id: view.segment_id(),
            doc,
            global_doc: view.doc_base() + doc.as_u32() as u64,
            value: self.value_in(view, doc)?,
        })
    }
}

struct Ranked<'a> {
    hit: SortedHit,
    extractor: &'a SortKeyExtractor,
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked<'_> {}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.extractor.compare(&self.hit, &other.hit)
    }
}
