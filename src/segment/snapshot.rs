//! Point-in-time segment sets
//!
//! A `Snapshot` is immutable. Adding or removing a segment publishes a new
//! snapshot with the next generation id; readers holding the old one keep
//! a consistent view.

use std::sync::Arc;

use arc_swap::ArcSwap;

use super::reader::SegmentReader;
use super::types::{SegmentId, SnapshotId};

/// Immutable, ordered set of segments
#[derive(Clone, Debug)]
pub struct Snapshot {
    id: SnapshotId,
    segments: Vec<Arc<SegmentReader>>,
    /// Snapshot-wide number of each segment's first document
    doc_bases: Vec<u64>,
}

impl Snapshot {
    pub fn new(id: SnapshotId, segments: Vec<Arc<SegmentReader>>) -> Self {
        let mut doc_bases = Vec::with_capacity(segments.len());
        let mut base = 0u64;
        for segment in &segments {
            doc_bases.push(base);
            base += segment.max_doc() as u64;
        }
        Self {
            id,
            segments,
            doc_bases,
        }
    }

    pub fn empty() -> Self {
        Self::new(SnapshotId::new(0), Vec::new())
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn segments(&self) -> &[Arc<SegmentReader>] {
        &self.segments
    }

    /// Position of a segment within the snapshot
    pub fn position(&self, segment_id: SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| s.id() == segment_id)
    }

    pub fn segment(&self, segment_id: SegmentId) -> Option<&Arc<SegmentReader>> {
        self.position(segment_id).map(|pos| &self.segments[pos])
    }

    pub fn contains(&self, segment_id: SegmentId) -> bool {
        self.position(segment_id).is_some()
    }

    pub fn doc_bases(&self) -> &[u64] {
        &self.doc_bases
    }

    /// Total documents across all segments
    pub fn total_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.max_doc() as u64).sum()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Next generation with `segment` appended
    pub fn with_segment(&self, segment: Arc<SegmentReader>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self::new(self.id.next(), segments)
    }

    /// Next generation without `segment_id`, or `None` if it is not present
    pub fn without_segment(&self, segment_id: SegmentId) -> Option<Self> {
        let pos = self.position(segment_id)?;
        let mut segments = self.segments.clone();
        segments.remove(pos);
        Some(Self::new(self.id.next(), segments))
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Thread-safe holder of the current snapshot with atomic replacement
pub struct SnapshotHolder {
    inner: ArcSwap<Snapshot>,
}

impl SnapshotHolder {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Get the current snapshot
    pub fn load(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }

    /// Publish a new snapshot including `segment`.
    ///
    /// Returns the previous snapshot. The segment was added only if the
    /// previous snapshot did not already contain its id.
    pub fn add_segment(&self, segment: Arc<SegmentReader>) -> Arc<Snapshot> {
        let id = segment.id();
        self.inner.rcu(|current| {
            if current.contains(id) {
                current.clone()
            } else {
                Arc::new(current.with_segment(segment.clone()))
            }
        })
    }

    /// Publish a new snapshot without `segment_id`. Returns the previous snapshot.
    pub fn remove_segment(&self, segment_id: SegmentId) -> Arc<Snapshot> {
        self.inner.rcu(|current| match current.without_segment(segment_id) {
            Some(next) => Arc::new(next),
            None => current.clone(),
        })
    }

    /// Atomically replace the snapshot
    pub fn store(&self, snapshot: Snapshot) {
        self.inner.store(Arc::new(snapshot));
    }
}

impl Default for SnapshotHolder {
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}
