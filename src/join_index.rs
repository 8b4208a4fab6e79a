//! Join index facade
//!
//! Ties settings, the published snapshot, the global ordinals cache and
//! metrics together. Query execution talks to this type only.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::JoinIndexSettings;
use crate::error::{JoinIndexError, Result};
use crate::metrics::JoinIndexMetrics;
use crate::ordinals::{GlobalJoinFieldData, GlobalOrdinalsCache, LeafJoinFieldData};
use crate::segment::{
    DocNo, GlobalOrdinal, LocalOrdinal, SegmentId, SegmentReader, SegmentSource, SegmentWriter,
    Snapshot, SnapshotHolder, SnapshotId,
};
use crate::sort::{JoinScope, MissingValue, MultiValueMode, SortDirection, SortKeyExtractor};

/// Parent/child join index over a changing set of segments
pub struct JoinIndex {
    settings: JoinIndexSettings,
    snapshots: SnapshotHolder,
    cache: GlobalOrdinalsCache,
    metrics: Option<JoinIndexMetrics>,
}

impl JoinIndex {
    pub fn new(settings: JoinIndexSettings) -> Result<Self> {
        settings.validate()?;

        let metrics = if settings.metrics_enabled {
            Some(JoinIndexMetrics::new()?)
        } else {
            None
        };

        let cache = match &metrics {
            Some(metrics) => GlobalOrdinalsCache::new().with_metrics(metrics.clone()),
            None => GlobalOrdinalsCache::new(),
        };

        info!(
            join_types = settings.mapping.join_types().len(),
            prefix = %settings.join_field_prefix,
            "join index created"
        );

        Ok(Self {
            settings,
            snapshots: SnapshotHolder::default(),
            cache,
            metrics,
        })
    }

    pub fn settings(&self) -> &JoinIndexSettings {
        &self.settings
    }

    pub fn metrics(&self) -> Option<&JoinIndexMetrics> {
        self.metrics.as_ref()
    }

    /// Writer for a new segment using this index's mapping and field prefix
    pub fn writer(&self, segment_id: SegmentId) -> SegmentWriter {
        SegmentWriter::new(segment_id, self.settings.mapping.clone())
            .with_join_field_prefix(self.settings.join_field_prefix.clone())
    }

    /// Publish a snapshot including `source`. Returns the new snapshot id.
    pub fn add_segment(&self, source: Arc<dyn SegmentSource>) -> Result<SnapshotId> {
        let segment_id = source.id();
        let mut reader = SegmentReader::new(source, self.settings.join_field_prefix.clone());
        if let Some(metrics) = &self.metrics {
            reader = reader.with_metrics(metrics.clone());
        }

        let previous = self.snapshots.add_segment(Arc::new(reader));
        if previous.contains(segment_id) {
            return Err(JoinIndexError::DuplicateSegment(segment_id));
        }

        let snapshot_id = previous.id().next();
        debug!(segment = %segment_id, snapshot = %snapshot_id, "segment added");
        Ok(snapshot_id)
    }

    /// Publish a snapshot without `segment_id`. Returns the new snapshot id.
    pub fn remove_segment(&self, segment_id: SegmentId) -> Result<SnapshotId> {
        let previous = self.snapshots.remove_segment(segment_id);
        if !previous.contains(segment_id) {
            return Err(JoinIndexError::UnknownSegment(segment_id));
        }

        let snapshot_id = previous.id().next();
        debug!(segment = %segment_id, snapshot = %snapshot_id, "segment removed");
        Ok(snapshot_id)
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.load()
    }

    pub fn leaf_data(&self, segment_id: SegmentId) -> Result<Arc<LeafJoinFieldData>> {
        let snapshot = self.snapshot();
        let segment = snapshot
            .segment(segment_id)
            .ok_or(JoinIndexError::UnknownSegment(segment_id))?;
        segment.leaf_data()
    }

    /// Local ordinals of `doc` for `join_type`
    pub fn leaf_values(
        &self,
        segment_id: SegmentId,
        join_type: &str,
        doc: DocNo,
    ) -> Result<Vec<LocalOrdinal>> {
        self.check_join_type(join_type)?;
        let leaf = self.leaf_data(segment_id)?;
        let values = leaf.ordinals(join_type, doc)?.collect();
        Ok(values)
    }

    /// Global data for the current snapshot, built on first request
    pub fn global_data(&self) -> Result<Arc<GlobalJoinFieldData>> {
        self.cache.get_or_build(&self.snapshot())
    }

    /// Global data for a snapshot the caller holds
    pub fn global_data_for(&self, snapshot: &Snapshot) -> Result<Arc<GlobalJoinFieldData>> {
        self.cache.get_or_build(snapshot)
    }

    /// Global ordinals of `doc` for `join_type` in the current snapshot
    pub fn global_values(
        &self,
        segment_id: SegmentId,
        join_type: &str,
        doc: DocNo,
    ) -> Result<Vec<GlobalOrdinal>> {
        self.check_join_type(join_type)?;
        let global = self.global_data()?;
        let view = global
            .segment(segment_id)
            .ok_or(JoinIndexError::UnknownSegment(segment_id))?;
        let values = view.ordinals(join_type, doc)?.collect();
        Ok(values)
    }

    /// Sort key extractor over the current snapshot
    pub fn sort_extractor(
        &self,
        scope: JoinScope,
        mode: MultiValueMode,
        missing: MissingValue,
        direction: SortDirection,
    ) -> Result<SortKeyExtractor> {
        if let JoinScope::Type(join_type) = &scope {
            self.check_join_type(join_type)?;
        }
        let global = self.global_data()?;
        Ok(SortKeyExtractor::new(global, scope, mode, missing, direction))
    }

    fn check_join_type(&self, join_type: &str) -> Result<()> {
        if self.settings.mapping.contains(join_type) {
            Ok(())
        } else {
            Err(JoinIndexError::UnknownJoinType(join_type.to_string()))
        }
    }
}

impl std::fmt::Debug for JoinIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinIndex")
            .field("settings", &self.settings)
            .field("snapshot", &self.snapshot().id())
            .field("cached", &self.cache.cached_snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JoinMapping;
    use crate::segment::JoinDocument;

    fn index() -> JoinIndex {
        let mapping = JoinMapping::new().with_root("parent").with_child("child", "parent");
        JoinIndex::new(JoinIndexSettings::new(mapping).with_metrics(true)).unwrap()
    }

    #[test]
    fn test_add_and_remove_segments() {
        let index = index();
        let mut writer = index.writer(SegmentId::new(1));
        writer.add_document(&JoinDocument::new("parent", "1")).unwrap();
        let segment: Arc<dyn SegmentSource> = Arc::new(writer.finish());

        assert_eq!(index.add_segment(segment.clone()).unwrap(), SnapshotId::new(1));
        assert!(matches!(
            index.add_segment(segment),
            Err(JoinIndexError::DuplicateSegment(_))
        ));
        assert_eq!(index.snapshot().id(), SnapshotId::new(1));

        assert_eq!(
            index.leaf_values(SegmentId::new(1), "parent", DocNo(0)).unwrap(),
            vec![LocalOrdinal(0)]
        );

        assert_eq!(index.remove_segment(SegmentId::new(1)).unwrap(), SnapshotId::new(2));
        assert!(matches!(
            index.remove_segment(SegmentId::new(1)),
            Err(JoinIndexError::UnknownSegment(_))
        ));
        assert!(index.leaf_data(SegmentId::new(1)).is_err());
    }

    #[test]
    fn test_unknown_join_type() {
        let index = index();
        let mut writer = index.writer(SegmentId::new(1));
        writer.add_document(&JoinDocument::new("parent", "1")).unwrap();
        index.add_segment(Arc::new(writer.finish())).unwrap();

        assert!(matches!(
            index.global_values(SegmentId::new(1), "nope", DocNo(0)),
            Err(JoinIndexError::UnknownJoinType(_))
        ));
        assert!(matches!(
            index.sort_extractor(
                JoinScope::Type("nope".to_string()),
                MultiValueMode::Min,
                MissingValue::Last,
                SortDirection::Ascending,
            ),
            Err(JoinIndexError::UnknownJoinType(_))
        ));
        // declared but never a parent: no values, not an error
        assert!(index
            .global_values(SegmentId::new(1), "child", DocNo(0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_global_data_follows_snapshot() {
        let index = index();
        for id in 1..=2 {
            let mut writer = index.writer(SegmentId::new(id));
            writer
                .add_document(&JoinDocument::new("parent", id.to_string()))
                .unwrap();
            index.add_segment(Arc::new(writer.finish())).unwrap();
            assert_eq!(index.global_data().unwrap().value_count("parent"), id as usize);
        }

        let metrics = index.metrics().unwrap();
        assert_eq!(metrics.global_builds.get(), 2.0);
        assert_eq!(
            index.global_values(SegmentId::new(2), "parent", DocNo(0)).unwrap(),
            vec![GlobalOrdinal(1)]
        );
        assert_eq!(metrics.cache_hits.get(), 1.0);
    }
}
