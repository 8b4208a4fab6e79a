pub mod config;
pub mod error;
pub mod join_index;
pub mod metrics;
pub mod ordinals;
pub mod segment;
pub mod sort;

pub use config::{JoinIndexSettings, JoinMapping, DEFAULT_JOIN_FIELD_PREFIX};
pub use error::{JoinIndexError, Result};
pub use join_index::JoinIndex;
pub use metrics::JoinIndexMetrics;
pub use ordinals::{
    GlobalJoinFieldData, GlobalOrdinalsBuilder, GlobalOrdinalsCache, LeafJoinFieldData,
    OrdinalDictionary,
};
pub use segment::*;
pub use sort::{
    JoinScope, MissingValue, MultiValueMode, SortDirection, SortKeyExtractor, SortValue,
    SortedHit,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
