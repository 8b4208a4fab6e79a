//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use joinindex::{
    DocNo, JoinDocument, JoinIndex, JoinIndexSettings, JoinKey, JoinMapping, SegmentId,
};

pub fn family() -> JoinMapping {
    JoinMapping::new()
        .with_root("parent")
        .with_child("child", "parent")
        .with_child("grand-child", "child")
}

/// Eight documents over three segments:
///
/// | doc | segment | type        | id | ancestors |
/// |-----|---------|-------------|----|-----------|
/// | 0   | 0       | parent      | 1  |           |
/// | 1   | 0       | child       | 2  | 1         |
/// | 2   | 1       | child       | 3  | 1         |
/// | 3   | 1       | parent      | 2  |           |
/// | 4   | 1       | child       | 4  | 2         |
/// | 5   | 1       | child       | 5  | 1         |
/// | 6   | 2       | grand-child | 6  | 2         |
/// | 7   | 2       | other-type  | 7  |           |
pub fn scenario_segments() -> Vec<Vec<JoinDocument>> {
    vec![
        vec![
            JoinDocument::new("parent", "1"),
            JoinDocument::new("child", "2").with_parent("1"),
        ],
        vec![
            JoinDocument::new("child", "3").with_parent("1"),
            JoinDocument::new("parent", "2"),
            JoinDocument::new("child", "4").with_parent("2"),
            JoinDocument::new("child", "5").with_parent("1"),
        ],
        vec![
            JoinDocument::new("grand-child", "6").with_parent("2"),
            JoinDocument::new("other-type", "7"),
        ],
    ]
}

pub fn scenario_index() -> JoinIndex {
    let index = JoinIndex::new(JoinIndexSettings::new(family())).unwrap();
    for (seg, docs) in scenario_segments().into_iter().enumerate() {
        let mut writer = index.writer(SegmentId::new(seg as u64));
        for doc in &docs {
            writer.add_document(doc).unwrap();
        }
        index.add_segment(Arc::new(writer.finish())).unwrap();
    }
    index
}

/// Segment and segment-local docno of a snapshot-wide docno
pub fn locate(index: &JoinIndex, global_doc: u64) -> (SegmentId, DocNo) {
    let snapshot = index.snapshot();
    let bases = snapshot.doc_bases();
    let position = bases.iter().rposition(|&base| base <= global_doc).unwrap();
    let segment = &snapshot.segments()[position];
    (segment.id(), DocNo((global_doc - bases[position]) as u32))
}

pub fn text(values: &[JoinKey]) -> Vec<String> {
    values
        .iter()
        .map(|v| String::from_utf8(v.to_vec()).unwrap())
        .collect()
}
