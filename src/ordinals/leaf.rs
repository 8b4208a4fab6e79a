//! Per-segment join field data
//!
//! For every join type the segment's documents reference, the distinct keys
//! are dictionary encoded and each document keeps a compact list of local
//! ordinals (CSR layout: `doc_offsets` into one flat `ordinals` array).
//! A roaring bitmap tracks which documents have at least one value.

use roaring::RoaringBitmap;

use crate::config::{join_field_name, JoinMapping};
use crate::error::{JoinIndexError, Result};
use crate::segment::{DocNo, JoinKey, LocalOrdinal, SegmentId, SegmentSource};

use super::dictionary::{OrdinalDictionary, OrdinalDictionaryBuilder};

const NO_ORDINALS: &[u32] = &[];

/// Restartable sequence of local ordinals for one document and type.
///
/// Clone it to iterate again from the start.
#[derive(Clone, Debug)]
pub struct LocalOrdinals<'a> {
    inner: std::slice::Iter<'a, u32>,
}

impl<'a> LocalOrdinals<'a> {
    fn new(ordinals: &'a [u32]) -> Self {
        Self {
            inner: ordinals.iter(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(NO_ORDINALS)
    }
}

impl Iterator for LocalOrdinals<'_> {
    type Item = LocalOrdinal;

    fn next(&mut self) -> Option<LocalOrdinal> {
        self.inner.next().map(|&ord| LocalOrdinal(ord))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for LocalOrdinals<'_> {}

/// Dictionary plus per-document ordinals for one join type in one segment
pub struct TypeOrdinals {
    join_type: String,
    dictionary: OrdinalDictionary,
    /// `doc_offsets[doc]..doc_offsets[doc + 1]` indexes `ordinals`
    doc_offsets: Vec<u32>,
    ordinals: Vec<u32>,
    docs_with_value: RoaringBitmap,
}

impl TypeOrdinals {
    /// Two passes over the segment: collect distinct keys, then encode docs
    fn load(source: &dyn SegmentSource, join_type: &str, field: &str) -> Result<Self> {
        let max_doc = source.max_doc();

        let mut builder = OrdinalDictionaryBuilder::new();
        for doc in 0..max_doc {
            for value in source.values(field, DocNo(doc)) {
                builder.add(value.clone());
            }
        }
        let dictionary = builder.build()?;

        let mut doc_offsets = Vec::with_capacity(max_doc as usize + 1);
        let mut ordinals = Vec::new();
        let mut docs_with_value = RoaringBitmap::new();
        doc_offsets.push(0);

        for doc in 0..max_doc {
            let values = source.values(field, DocNo(doc));
            if !values.is_empty() {
                docs_with_value.insert(doc);
            }
            for value in values {
                let ord = dictionary.ordinal_of(value).ok_or_else(|| {
                    JoinIndexError::InvalidDocument(format!(
                        "value of {} in doc {} changed while loading",
                        field, doc
                    ))
                })?;
                ordinals.push(ord);
            }
            doc_offsets.push(ordinals.len() as u32);
        }

        Ok(Self {
            join_type: join_type.to_string(),
            dictionary,
            doc_offsets,
            ordinals,
            docs_with_value,
        })
    }

    pub fn join_type(&self) -> &str {
        &self.join_type
    }

    pub fn dictionary(&self) -> &OrdinalDictionary {
        &self.dictionary
    }

    /// Number of distinct keys of this type in the segment
    pub fn value_count(&self) -> usize {
        self.dictionary.len()
    }

    /// Ordinals of `doc`; callers bound-check `doc` first
    fn ordinals(&self, doc: DocNo) -> LocalOrdinals<'_> {
        let start = self.doc_offsets[doc.as_usize()] as usize;
        let end = self.doc_offsets[doc.as_usize() + 1] as usize;
        LocalOrdinals::new(&self.ordinals[start..end])
    }

    /// Whether `doc` has at least one value of this type
    pub fn has_value(&self, doc: DocNo) -> bool {
        self.docs_with_value.contains(doc.as_u32())
    }

    pub fn lookup_ord(&self, ordinal: LocalOrdinal) -> Result<JoinKey> {
        self.dictionary.lookup_ord(ordinal.as_u32())
    }

    fn size_in_bytes(&self) -> usize {
        self.dictionary.size_in_bytes()
            + (self.doc_offsets.len() + self.ordinals.len()) * 4
            + self.docs_with_value.serialized_size()
    }
}

/// Join field data of one segment across all join types
pub struct LeafJoinFieldData {
    segment_id: SegmentId,
    max_doc: u32,
    /// Hierarchy recorded by the segment
    mapping: JoinMapping,
    /// Top-level type first
    types: Vec<TypeOrdinals>,
}

impl LeafJoinFieldData {
    /// Load the join fields of every join type in the segment's mapping
    pub fn load(source: &dyn SegmentSource, join_field_prefix: &str) -> Result<Self> {
        let mapping = source.join_mapping().clone();
        let types = mapping
            .join_types()
            .into_iter()
            .map(|join_type| {
                let field = join_field_name(join_field_prefix, join_type);
                TypeOrdinals::load(source, join_type, &field)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            segment_id: source.id(),
            max_doc: source.max_doc(),
            mapping,
            types,
        })
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn mapping(&self) -> &JoinMapping {
        &self.mapping
    }

    /// Join types present in this segment, top-level first
    pub fn join_types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.join_type())
    }

    pub fn type_ordinals(&self, join_type: &str) -> Option<&TypeOrdinals> {
        self.types.iter().find(|t| t.join_type == join_type)
    }

    /// Dictionary of `join_type`, if the segment has the type
    pub fn dictionary(&self, join_type: &str) -> Option<&OrdinalDictionary> {
        self.type_ordinals(join_type).map(TypeOrdinals::dictionary)
    }

    /// Whether `doc` has a value of `join_type`, without decoding ordinals
    pub fn has_value(&self, join_type: &str, doc: DocNo) -> Result<bool> {
        self.check_doc(doc)?;
        Ok(self
            .type_ordinals(join_type)
            .map_or(false, |t| t.has_value(doc)))
    }

    /// Whether `doc` has a value of any join type
    pub fn has_any_value(&self, doc: DocNo) -> Result<bool> {
        self.check_doc(doc)?;
        Ok(self.types.iter().any(|t| t.has_value(doc)))
    }

    /// Local ordinals of `doc` for `join_type`. Empty when the document has no
    /// value or the segment never saw the type.
    pub fn ordinals(&self, join_type: &str, doc: DocNo) -> Result<LocalOrdinals<'_>> {
        self.check_doc(doc)?;
        Ok(self
            .type_ordinals(join_type)
            .map(|t| t.ordinals(doc))
            .unwrap_or_else(LocalOrdinals::empty))
    }

    /// Every `(join type, ordinal)` of `doc`, top-level type first
    pub fn join_values(
        &self,
        doc: DocNo,
    ) -> Result<impl Iterator<Item = (&str, LocalOrdinal)> + Clone + '_> {
        self.check_doc(doc)?;
        Ok(self.types.iter().flat_map(move |t| {
            let join_type = t.join_type();
            t.ordinals(doc).map(move |ord| (join_type, ord))
        }))
    }

    /// All join keys of `doc` across types, sorted and deduplicated
    pub fn bytes_values(&self, doc: DocNo) -> Result<Vec<JoinKey>> {
        self.check_doc(doc)?;
        let mut values = Vec::new();
        for t in &self.types {
            for ord in t.ordinals(doc) {
                values.push(t.lookup_ord(ord)?);
            }
        }
        values.sort_unstable();
        values.dedup();
        Ok(values)
    }

    /// Number of distinct keys of `join_type` in this segment
    pub fn value_count(&self, join_type: &str) -> usize {
        self.type_ordinals(join_type)
            .map(TypeOrdinals::value_count)
            .unwrap_or(0)
    }

    pub fn lookup_ord(&self, join_type: &str, ordinal: LocalOrdinal) -> Result<JoinKey> {
        match self.type_ordinals(join_type) {
            Some(t) => t.lookup_ord(ordinal),
            None => Err(JoinIndexError::ordinal_out_of_range(ordinal.as_u32(), 0)),
        }
    }

    /// Approximate heap usage
    pub fn size_in_bytes(&self) -> usize {
        self.types.iter().map(TypeOrdinals::size_in_bytes).sum()
    }

    fn check_doc(&self, doc: DocNo) -> Result<()> {
        if doc.as_u32() >= self.max_doc {
            return Err(JoinIndexError::DocumentOutOfRange {
                doc: doc.as_u32(),
                max_doc: self.max_doc,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for LeafJoinFieldData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafJoinFieldData")
            .field("segment_id", &self.segment_id)
            .field("max_doc", &self.max_doc)
            .field("types", &self.join_types().collect::<Vec<_>>())
            .finish()
    }
}
