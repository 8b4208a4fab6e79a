//! Segments as consumed by the join index
//!
//! # Architecture
//!
//! - `SegmentSource`: read-only per-segment field values (storage owns these)
//! - `SegmentWriter`: materializes join chains into a `MemorySegment`
//! - `SegmentReader`: wraps a source and lazily loads its join field data
//! - `SnapshotHolder`: publishes immutable `Snapshot`s of the segment set

mod types;
mod source;
mod writer;
mod reader;
mod snapshot;

pub use types::*;
pub use source::*;
pub use writer::*;
pub use reader::*;
pub use snapshot::*;
