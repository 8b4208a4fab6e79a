//! Segment writer: materializes join chains at write time
//!
//! Each document's ancestor chain is flattened into `(type, key)` pairs,
//! top-level type first, and written to one join field per type. Readers
//! never walk the hierarchy again.

use serde::{Deserialize, Serialize};

use crate::config::{join_field_name, JoinMapping, DEFAULT_JOIN_FIELD_PREFIX};
use crate::error::{JoinIndexError, Result};

use super::source::{MemorySegment, SegmentSource};
use super::types::{DocNo, JoinKey, SegmentId};

/// A document as seen by the join index writer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinDocument {
    /// Document type
    pub doc_type: String,
    /// The document's own id
    pub id: String,
    /// Parent id first, then grandparent, ... A shorter list than the type's
    /// ancestry leaves the upper levels without a value.
    #[serde(default)]
    pub ancestors: Vec<String>,
}

impl JoinDocument {
    pub fn new(doc_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            id: id.into(),
            ancestors: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.ancestors = vec![parent_id.into()];
        self
    }

    pub fn with_ancestors<I, S>(mut self, ancestors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ancestors = ancestors.into_iter().map(Into::into).collect();
        self
    }
}

/// Flatten a document's chain into `(join type, key)` pairs, top-level first.
///
/// The document's own id is included only when its type is a join type.
/// Types outside the mapping produce no pairs.
pub fn materialize(mapping: &JoinMapping, doc: &JoinDocument) -> Result<Vec<(String, JoinKey)>> {
    if doc.id.is_empty() {
        return Err(JoinIndexError::InvalidDocument(format!(
            "document of type '{}' has an empty id",
            doc.doc_type
        )));
    }

    if !mapping.contains(&doc.doc_type) {
        if !doc.ancestors.is_empty() {
            return Err(JoinIndexError::InvalidDocument(format!(
                "type '{}' has no parent type but document {} names ancestors",
                doc.doc_type, doc.id
            )));
        }
        return Ok(Vec::new());
    }

    let chain = mapping.ancestors(&doc.doc_type);
    if doc.ancestors.len() > chain.len() {
        return Err(JoinIndexError::InvalidDocument(format!(
            "document {} of type '{}' names {} ancestors, type has {}",
            doc.id,
            doc.doc_type,
            doc.ancestors.len(),
            chain.len()
        )));
    }

    let mut pairs = Vec::with_capacity(doc.ancestors.len() + 1);
    for (join_type, key) in chain.iter().zip(doc.ancestors.iter()).rev() {
        if key.is_empty() {
            return Err(JoinIndexError::InvalidDocument(format!(
                "document {} has an empty '{}' ancestor id",
                doc.id, join_type
            )));
        }
        pairs.push((join_type.to_string(), JoinKey::from(key.clone())));
    }

    if mapping.is_join_type(&doc.doc_type) {
        pairs.push((doc.doc_type.clone(), JoinKey::from(doc.id.clone())));
    }

    Ok(pairs)
}

/// Writes documents into an in-memory segment
pub struct SegmentWriter {
    segment: MemorySegment,
    mapping: JoinMapping,
    join_field_prefix: String,
}

impl SegmentWriter {
    pub fn new(segment_id: SegmentId, mapping: JoinMapping) -> Self {
        Self {
            segment: MemorySegment::new(segment_id, mapping.clone()),
            mapping,
            join_field_prefix: DEFAULT_JOIN_FIELD_PREFIX.to_string(),
        }
    }

    pub fn with_join_field_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.join_field_prefix = prefix.into();
        self
    }

    /// Add a document, returning its docno
    pub fn add_document(&mut self, doc: &JoinDocument) -> Result<DocNo> {
        let pairs = materialize(&self.mapping, doc)?;
        let prefix = &self.join_field_prefix;
        Ok(self.segment.push_document(
            pairs
                .into_iter()
                .map(|(join_type, key)| (join_field_name(prefix, &join_type), key)),
        ))
    }

    /// Add a document that carries no join field
    pub fn add_unrelated(&mut self) -> DocNo {
        self.segment.push_document(Vec::new())
    }

    pub fn doc_count(&self) -> u32 {
        self.segment.max_doc()
    }

    /// Finish writing and hand back the segment
    pub fn finish(self) -> MemorySegment {
        self.segment
    }
}
