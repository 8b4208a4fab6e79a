//! Segment reader with lazily loaded join field data
//!
//! The leaf data is loaded on first access and shared by every snapshot that
//! contains the segment. A failed load is not remembered.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::Result;
use crate::metrics::JoinIndexMetrics;
use crate::ordinals::LeafJoinFieldData;

use super::source::SegmentSource;
use super::types::SegmentId;

/// Reader over one physical segment
pub struct SegmentReader {
    source: Arc<dyn SegmentSource>,
    join_field_prefix: String,
    leaf: OnceCell<Arc<LeafJoinFieldData>>,
    metrics: Option<JoinIndexMetrics>,
}

impl SegmentReader {
    pub fn new(source: Arc<dyn SegmentSource>, join_field_prefix: impl Into<String>) -> Self {
        Self {
            source,
            join_field_prefix: join_field_prefix.into(),
            leaf: OnceCell::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: JoinIndexMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn id(&self) -> SegmentId {
        self.source.id()
    }

    pub fn max_doc(&self) -> u32 {
        self.source.max_doc()
    }

    pub fn source(&self) -> &Arc<dyn SegmentSource> {
        &self.source
    }

    /// Join field data for this segment, loaded on first call
    pub fn leaf_data(&self) -> Result<Arc<LeafJoinFieldData>> {
        self.leaf
            .get_or_try_init(|| {
                let leaf = LeafJoinFieldData::load(self.source.as_ref(), &self.join_field_prefix)?;
                debug!(
                    segment = %self.id(),
                    max_doc = leaf.max_doc(),
                    bytes = leaf.size_in_bytes(),
                    "loaded join field data"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_leaf_load();
                }
                Ok(Arc::new(leaf))
            })
            .cloned()
    }

    /// Whether the leaf data has been loaded
    pub fn is_loaded(&self) -> bool {
        self.leaf.get().is_some()
    }
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("id", &self.id())
            .field("max_doc", &self.max_doc())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
