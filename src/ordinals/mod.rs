//! Ordinal structures for join fields
//!
//! - `dictionary`: sorted, deduplicated keys with ordinal lookup (FST backed)
//! - `leaf`: per-segment, per-document local ordinals
//! - `global`: snapshot-wide dictionaries and local -> global remap tables
//! - `cache`: builds global data once per snapshot

mod dictionary;
mod leaf;
mod global;
mod cache;

pub use dictionary::*;
pub use leaf::*;
pub use global::*;
pub use cache::*;
