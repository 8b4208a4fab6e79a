//! Global ordinals across a snapshot
//!
//! Every segment's per-type dictionary is already sorted, so the snapshot-wide
//! dictionary is a k-way union of sorted streams. The fst union yields each
//! distinct key once together with the `(segment, local ordinal)` pairs that
//! hold it; the next global ordinal is assigned and written into each
//! segment's remap table. Remap tables are monotonic because both sides are in
//! byte order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use fst::map::OpBuilder;
use fst::Streamer;
use tracing::info;

use crate::config::JoinMapping;
use crate::error::{JoinIndexError, Result};
use crate::segment::{DocNo, GlobalOrdinal, JoinKey, SegmentId, Snapshot, SnapshotId};

use super::dictionary::{OrdinalDictionary, SortedDictionaryWriter};
use super::leaf::{LeafJoinFieldData, LocalOrdinals};

/// Snapshot-wide dictionary and remap tables for one join type
pub struct GlobalTypeOrdinals {
    join_type: String,
    dictionary: OrdinalDictionary,
    /// Indexed by snapshot position, then local ordinal. Empty for segments
    /// without this type.
    segment_maps: Vec<Vec<u32>>,
}

impl GlobalTypeOrdinals {
    pub fn join_type(&self) -> &str {
        &self.join_type
    }

    pub fn dictionary(&self) -> &OrdinalDictionary {
        &self.dictionary
    }

    pub fn value_count(&self) -> usize {
        self.dictionary.len()
    }

    fn segment_map(&self, position: usize) -> &[u32] {
        self.segment_maps
            .get(position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Immutable global join field data for one snapshot
pub struct GlobalJoinFieldData {
    snapshot_id: SnapshotId,
    leaves: Vec<Arc<LeafJoinFieldData>>,
    doc_bases: Vec<u64>,
    /// Union of the segments' mappings
    mapping: JoinMapping,
    /// Top-level type first
    types: Vec<GlobalTypeOrdinals>,
}

impl GlobalJoinFieldData {
    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }

    pub fn mapping(&self) -> &JoinMapping {
        &self.mapping
    }

    pub fn join_types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(GlobalTypeOrdinals::join_type)
    }

    pub fn type_ordinals(&self, join_type: &str) -> Option<&GlobalTypeOrdinals> {
        self.types.iter().find(|t| t.join_type == join_type)
    }

    /// Distinct keys of `join_type` across the snapshot
    pub fn value_count(&self, join_type: &str) -> usize {
        self.type_ordinals(join_type)
            .map(GlobalTypeOrdinals::value_count)
            .unwrap_or(0)
    }

    /// Distinct keys summed over all types
    pub fn total_ordinals(&self) -> usize {
        self.types.iter().map(GlobalTypeOrdinals::value_count).sum()
    }

    pub fn lookup_ord(&self, join_type: &str, ordinal: GlobalOrdinal) -> Result<JoinKey> {
        match self.type_ordinals(join_type) {
            Some(t) => t.dictionary.lookup_ord(ordinal.as_u32()),
            None => Err(JoinIndexError::ordinal_out_of_range(ordinal.as_u32(), 0)),
        }
    }

    pub fn ordinal_of(&self, join_type: &str, key: &[u8]) -> Option<GlobalOrdinal> {
        self.type_ordinals(join_type)?
            .dictionary
            .ordinal_of(key)
            .map(GlobalOrdinal)
    }

    /// Number of segments in the snapshot
    pub fn segment_count(&self) -> usize {
        self.leaves.len()
    }

    /// Documents across all segments
    pub fn total_docs(&self) -> u64 {
        self.leaves.iter().map(|leaf| u64::from(leaf.max_doc())).sum()
    }

    /// Per-segment view by segment id
    pub fn segment(&self, segment_id: SegmentId) -> Option<SegmentGlobalView<'_>> {
        let position = self
            .leaves
            .iter()
            .position(|leaf| leaf.segment_id() == segment_id)?;
        Some(SegmentGlobalView {
            global: self,
            position,
        })
    }

    /// Per-segment view by snapshot position
    pub fn segment_at(&self, position: usize) -> Option<SegmentGlobalView<'_>> {
        if position < self.leaves.len() {
            Some(SegmentGlobalView {
                global: self,
                position,
            })
        } else {
            None
        }
    }

    /// Views of all segments in snapshot order
    pub fn segments(&self) -> impl Iterator<Item = SegmentGlobalView<'_>> {
        (0..self.leaves.len()).map(move |position| SegmentGlobalView {
            global: self,
            position,
        })
    }
}

impl std::fmt::Debug for GlobalJoinFieldData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalJoinFieldData")
            .field("snapshot_id", &self.snapshot_id)
            .field("segments", &self.leaves.len())
            .field("types", &self.join_types().collect::<Vec<_>>())
            .field("ordinals", &self.total_ordinals())
            .finish()
    }
}

/// Global ordinals of one document and type: local ordinals mapped through
/// the segment's remap table
#[derive(Clone, Debug)]
pub struct GlobalOrdinals<'a> {
    local: LocalOrdinals<'a>,
    remap: &'a [u32],
}

impl Iterator for GlobalOrdinals<'_> {
    type Item = GlobalOrdinal;

    fn next(&mut self) -> Option<GlobalOrdinal> {
        let local = self.local.next()?;
        Some(GlobalOrdinal(self.remap[local.as_usize()]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.local.size_hint()
    }
}

impl ExactSizeIterator for GlobalOrdinals<'_> {}

/// One segment's face of the global data
#[derive(Clone, Copy)]
pub struct SegmentGlobalView<'a> {
    global: &'a GlobalJoinFieldData,
    position: usize,
}

impl<'a> SegmentGlobalView<'a> {
    pub fn segment_id(&self) -> SegmentId {
        self.leaf().segment_id()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn max_doc(&self) -> u32 {
        self.leaf().max_doc()
    }

    /// Snapshot-wide number of this segment's first document
    pub fn doc_base(&self) -> u64 {
        self.global.doc_bases[self.position]
    }

    pub fn leaf(&self) -> &'a LeafJoinFieldData {
        &self.global.leaves[self.position]
    }

    pub fn global(&self) -> &'a GlobalJoinFieldData {
        self.global
    }

    pub fn ordinals(&self, join_type: &str, doc: DocNo) -> Result<GlobalOrdinals<'a>> {
        let local = self.leaf().ordinals(join_type, doc)?;
        let remap = self
            .global
            .type_ordinals(join_type)
            .map(|t| t.segment_map(self.position))
            .unwrap_or(&[]);
        Ok(GlobalOrdinals { local, remap })
    }

    pub fn value_count(&self, join_type: &str) -> usize {
        self.global.value_count(join_type)
    }

    pub fn lookup_ord(&self, join_type: &str, ordinal: GlobalOrdinal) -> Result<JoinKey> {
        self.global.lookup_ord(join_type, ordinal)
    }
}

impl std::fmt::Debug for SegmentGlobalView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentGlobalView")
            .field("segment_id", &self.segment_id())
            .field("position", &self.position)
            .finish()
    }
}

/// Builds `GlobalJoinFieldData` from a snapshot
pub struct GlobalOrdinalsBuilder;

impl GlobalOrdinalsBuilder {
    /// Load every segment's leaf data and merge the dictionaries.
    ///
    /// Fails with `SchemaMismatch` when two segments record different parents
    /// for the same type.
    pub fn build(snapshot: &Snapshot) -> Result<GlobalJoinFieldData> {
        let start = Instant::now();

        let leaves = snapshot
            .segments()
            .iter()
            .map(|segment| segment.leaf_data())
            .collect::<Result<Vec<_>>>()?;

        let mapping = Self::reconcile(&leaves)?;

        let types = mapping
            .join_types()
            .into_iter()
            .map(|join_type| Self::merge_type(join_type, &leaves))
            .collect::<Result<Vec<_>>>()?;

        let global = GlobalJoinFieldData {
            snapshot_id: snapshot.id(),
            leaves,
            doc_bases: snapshot.doc_bases().to_vec(),
            mapping,
            types,
        };

        info!(
            snapshot = %global.snapshot_id,
            segments = global.leaves.len(),
            types = global.types.len(),
            ordinals = global.total_ordinals(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built global ordinals"
        );

        Ok(global)
    }

    /// Union of the segments' mappings; disagreement on a parent is fatal
    fn reconcile(leaves: &[Arc<LeafJoinFieldData>]) -> Result<JoinMapping> {
        let mut seen: BTreeMap<String, (Option<String>, SegmentId)> = BTreeMap::new();

        for leaf in leaves {
            for (join_type, parent) in leaf.mapping().iter() {
                match seen.get(join_type) {
                    Some((expected, reference)) if expected.as_deref() != parent => {
                        return Err(JoinIndexError::SchemaMismatch {
                            join_type: join_type.to_string(),
                            reference: *reference,
                            expected: expected.clone(),
                            segment: leaf.segment_id(),
                            found: parent.map(str::to_string),
                        });
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(
                            join_type.to_string(),
                            (parent.map(str::to_string), leaf.segment_id()),
                        );
                    }
                }
            }
        }

        Ok(seen
            .into_iter()
            .map(|(join_type, (parent, _))| (join_type, parent))
            .collect())
    }

    fn merge_type(join_type: &str, leaves: &[Arc<LeafJoinFieldData>]) -> Result<GlobalTypeOrdinals> {
        let mut segment_maps: Vec<Vec<u32>> = vec![Vec::new(); leaves.len()];
        // union stream index -> snapshot position
        let mut members = Vec::new();
        let mut op = OpBuilder::new();

        for (position, leaf) in leaves.iter().enumerate() {
            if let Some(type_ords) = leaf.type_ordinals(join_type) {
                if type_ords.value_count() == 0 {
                    continue;
                }
                segment_maps[position] = vec![0; type_ords.value_count()];
                members.push(position);
                op.push(type_ords.dictionary().as_fst());
            }
        }

        let mut writer = SortedDictionaryWriter::new();
        let mut union = op.union();
        while let Some((key, holders)) = union.next() {
            let global = writer.insert(key)?;
            for holder in holders {
                segment_maps[members[holder.index]][holder.value as usize] = global;
            }
        }

        Ok(GlobalTypeOrdinals {
            join_type: join_type.to_string(),
            dictionary: writer.finish(),
            segment_maps,
        })
    }
}
