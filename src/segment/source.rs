//! Segment abstraction consumed by the join index
//!
//! The storage layer owns segments; the join index only needs ordered
//! document access, per-field sorted byte values, the join mapping the
//! segment was written with, and a stable id to key caches on.

use std::collections::HashMap;

use crate::config::JoinMapping;

use super::types::{DocNo, JoinKey, SegmentId};

/// Read-only view of one physical segment
pub trait SegmentSource: Send + Sync {
    /// Stable id, used as the per-segment cache key
    fn id(&self) -> SegmentId;

    /// Number of documents (docnos are `0..max_doc`)
    fn max_doc(&self) -> u32;

    /// Type hierarchy recorded when the segment was written
    fn join_mapping(&self) -> &JoinMapping;

    /// Values of `field` for `doc`, sorted and deduplicated. Empty when the
    /// document has no value for the field.
    fn values(&self, field: &str, doc: DocNo) -> &[JoinKey];
}

/// In-memory segment holding per-field multi-valued byte strings
#[derive(Clone, Debug)]
pub struct MemorySegment {
    id: SegmentId,
    max_doc: u32,
    mapping: JoinMapping,
    /// field -> values per docno (shorter than max_doc when trailing docs lack the field)
    fields: HashMap<String, Vec<Vec<JoinKey>>>,
}

impl MemorySegment {
    pub fn new(id: SegmentId, mapping: JoinMapping) -> Self {
        Self {
            id,
            max_doc: 0,
            mapping,
            fields: HashMap::new(),
        }
    }

    /// Append a document with the given (field, value) pairs
    pub fn push_document<I>(&mut self, values: I) -> DocNo
    where
        I: IntoIterator<Item = (String, JoinKey)>,
    {
        let docno = DocNo::new(self.max_doc);
        self.max_doc += 1;

        for (field, value) in values {
            let column = self.fields.entry(field).or_default();
            if column.len() < self.max_doc as usize {
                column.resize(self.max_doc as usize, Vec::new());
            }
            column[docno.as_usize()].push(value);
        }

        for column in self.fields.values_mut() {
            if let Some(doc_values) = column.get_mut(docno.as_usize()) {
                doc_values.sort();
                doc_values.dedup();
            }
        }

        docno
    }
}

impl SegmentSource for MemorySegment {
    fn id(&self) -> SegmentId {
        self.id
    }

    fn max_doc(&self) -> u32 {
        self.max_doc
    }

    fn join_mapping(&self) -> &JoinMapping {
        &self.mapping
    }

    fn values(&self, field: &str, doc: DocNo) -> &[JoinKey] {
        self.fields
            .get(field)
            .and_then(|column| column.get(doc.as_usize()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
