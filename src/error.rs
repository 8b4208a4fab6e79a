use thiserror::Error;

use crate::segment::SegmentId;

/// Main error type for join index operations
#[derive(Error, Debug)]
pub enum JoinIndexError {
    #[error(
        "Schema mismatch on join type '{join_type}': {segment} records parent {found:?}, \
         {reference} records parent {expected:?}"
    )]
    SchemaMismatch {
        join_type: String,
        reference: SegmentId,
        expected: Option<String>,
        segment: SegmentId,
        found: Option<String>,
    },

    #[error("Ordinal {ordinal} out of range, dictionary holds {count} values")]
    OrdinalOutOfRange { ordinal: u64, count: usize },

    #[error("Document {doc} out of range, segment holds {max_doc} documents")]
    DocumentOutOfRange { doc: u32, max_doc: u32 },

    #[error("Unknown join type: {0}")]
    UnknownJoinType(String),

    #[error("Unknown segment: {0}")]
    UnknownSegment(SegmentId),

    #[error("Segment already present in snapshot: {0}")]
    DuplicateSegment(SegmentId),

    #[error("Invalid join mapping: {0}")]
    InvalidMapping(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Dictionary error: {0}")]
    Dictionary(#[from] fst::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Result type alias for join index operations
pub type Result<T> = std::result::Result<T, JoinIndexError>;

impl JoinIndexError {
    /// Check if a later request against a fresh snapshot may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, JoinIndexError::SchemaMismatch { .. })
    }

    pub(crate) fn ordinal_out_of_range(ordinal: impl Into<u64>, count: usize) -> Self {
        JoinIndexError::OrdinalOutOfRange {
            ordinal: ordinal.into(),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JoinIndexError::ordinal_out_of_range(7u32, 3);
        assert_eq!(
            err.to_string(),
            "Ordinal 7 out of range, dictionary holds 3 values"
        );

        let err = JoinIndexError::SchemaMismatch {
            join_type: "child".to_string(),
            reference: SegmentId::new(1),
            expected: Some("parent".to_string()),
            segment: SegmentId::new(4),
            found: None,
        };
        assert_eq!(
            err.to_string(),
            "Schema mismatch on join type 'child': segment_4 records parent None, \
             segment_1 records parent Some(\"parent\")"
        );
    }

    #[test]
    fn test_retriable_errors() {
        let mismatch = JoinIndexError::SchemaMismatch {
            join_type: "child".to_string(),
            reference: SegmentId::new(0),
            expected: None,
            segment: SegmentId::new(1),
            found: Some("parent".to_string()),
        };
        assert!(mismatch.is_retriable());
        assert!(!JoinIndexError::ordinal_out_of_range(1u32, 0).is_retriable());
        assert!(!JoinIndexError::UnknownJoinType("x".to_string()).is_retriable());
    }
}
