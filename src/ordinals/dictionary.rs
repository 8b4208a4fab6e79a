//! Ordinal dictionary backed by an FST
//!
//! Distinct join keys are stored sorted in one contiguous buffer. The ordinal
//! of a key is its rank, so ordinal order is byte order. Key -> ordinal goes
//! through the FST; ordinal -> key is an offset lookup returning a zero-copy
//! slice of the shared buffer.

use bytes::{Bytes, BytesMut};
use fst::{Map, MapBuilder};

use crate::error::{JoinIndexError, Result};
use crate::segment::JoinKey;

/// Sorted, deduplicated join keys with ordinal lookup in both directions
pub struct OrdinalDictionary {
    /// key -> ordinal
    fst: Map<Vec<u8>>,
    /// All keys back to back, in ordinal order
    data: Bytes,
    /// `offsets[ord]..offsets[ord + 1]` is the key for `ord`
    offsets: Vec<u64>,
}

impl OrdinalDictionary {
    pub fn empty() -> Self {
        Self {
            fst: MapBuilder::memory().into_map(),
            data: Bytes::new(),
            offsets: vec![0],
        }
    }

    /// Build from keys that are already strictly increasing
    pub fn from_sorted<I, K>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut writer = SortedDictionaryWriter::new();
        for key in keys {
            writer.insert(key.as_ref())?;
        }
        Ok(writer.finish())
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key bytes for an ordinal
    pub fn lookup_bytes(&self, ordinal: u32) -> Result<&[u8]> {
        let (start, end) = self.bounds(ordinal)?;
        Ok(&self.data[start..end])
    }

    /// Key for an ordinal, sharing the dictionary buffer
    pub fn lookup_ord(&self, ordinal: u32) -> Result<JoinKey> {
        let (start, end) = self.bounds(ordinal)?;
        Ok(self.data.slice(start..end))
    }

    /// Ordinal of a key, if present
    pub fn ordinal_of(&self, key: &[u8]) -> Option<u32> {
        self.fst.get(key).map(|ord| ord as u32)
    }

    /// Iterate `(ordinal, key)` in ordinal order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> + '_ {
        self.offsets
            .windows(2)
            .enumerate()
            .map(move |(ord, w)| (ord as u32, &self.data[w[0] as usize..w[1] as usize]))
    }

    pub(crate) fn as_fst(&self) -> &Map<Vec<u8>> {
        &self.fst
    }

    /// Approximate heap usage
    pub fn size_in_bytes(&self) -> usize {
        self.fst.as_fst().size() + self.data.len() + self.offsets.len() * 8
    }

    fn bounds(&self, ordinal: u32) -> Result<(usize, usize)> {
        let ord = ordinal as usize;
        if ord >= self.len() {
            return Err(JoinIndexError::ordinal_out_of_range(ordinal, self.len()));
        }
        Ok((self.offsets[ord] as usize, self.offsets[ord + 1] as usize))
    }
}

impl Default for OrdinalDictionary {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for OrdinalDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdinalDictionary")
            .field("len", &self.len())
            .field("bytes", &self.size_in_bytes())
            .finish()
    }
}

/// Appends strictly increasing keys, assigning consecutive ordinals
pub struct SortedDictionaryWriter {
    fst: MapBuilder<Vec<u8>>,
    data: BytesMut,
    offsets: Vec<u64>,
}

impl SortedDictionaryWriter {
    pub fn new() -> Self {
        Self {
            fst: MapBuilder::memory(),
            data: BytesMut::new(),
            offsets: vec![0],
        }
    }

    /// Append a key. Fails if it does not sort after the previous key.
    pub fn insert(&mut self, key: &[u8]) -> Result<u32> {
        let ordinal = (self.offsets.len() - 1) as u32;
        self.fst.insert(key, ordinal as u64)?;
        self.data.extend_from_slice(key);
        self.offsets.push(self.data.len() as u64);
        Ok(ordinal)
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> OrdinalDictionary {
        OrdinalDictionary {
            fst: self.fst.into_map(),
            data: self.data.freeze(),
            offsets: self.offsets,
        }
    }
}

impl Default for SortedDictionaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects keys in any order and builds a dictionary
#[derive(Debug, Default)]
pub struct OrdinalDictionaryBuilder {
    keys: Vec<JoinKey>,
}

impl OrdinalDictionaryBuilder {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, key: JoinKey) {
        self.keys.push(key);
    }

    pub fn build(mut self) -> Result<OrdinalDictionary> {
        self.keys.sort_unstable();
        self.keys.dedup();
        OrdinalDictionary::from_sorted(&self.keys)
    }
}
