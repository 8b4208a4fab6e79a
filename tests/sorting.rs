//! Sorting by join field values across segments

mod common;

use common::{locate, scenario_index};
use joinindex::{
    JoinIndex, JoinKey, JoinScope, MissingValue, MultiValueMode, SortDirection, SortValue,
};

fn sorted(
    index: &JoinIndex,
    scope: JoinScope,
    mode: MultiValueMode,
    missing: MissingValue,
    direction: SortDirection,
) -> Vec<u64> {
    index
        .sort_extractor(scope, mode, missing, direction)
        .unwrap()
        .top_n(100)
        .unwrap()
        .into_iter()
        .map(|hit| hit.global_doc)
        .collect()
}

#[test]
fn test_min_missing_last_ascending() {
    let index = scenario_index();
    let order = sorted(
        &index,
        JoinScope::AllTypes,
        MultiValueMode::Min,
        MissingValue::Last,
        SortDirection::Ascending,
    );
    assert_eq!(order, vec![0, 1, 2, 5, 3, 4, 6, 7]);
}

#[test]
fn test_min_missing_last_descending() {
    let index = scenario_index();
    let order = sorted(
        &index,
        JoinScope::AllTypes,
        MultiValueMode::Min,
        MissingValue::Last,
        SortDirection::Descending,
    );
    // missing stays last when the direction flips
    assert_eq!(order, vec![3, 4, 6, 0, 1, 2, 5, 7]);
}

#[test]
fn test_missing_first() {
    let index = scenario_index();
    for direction in [SortDirection::Ascending, SortDirection::Descending] {
        let order = sorted(
            &index,
            JoinScope::AllTypes,
            MultiValueMode::Min,
            MissingValue::First,
            direction,
        );
        assert_eq!(order[0], 7, "{:?}", direction);
    }
}

#[test]
fn test_max_reduction() {
    let index = scenario_index();
    let order = sorted(
        &index,
        JoinScope::AllTypes,
        MultiValueMode::Max,
        MissingValue::Last,
        SortDirection::Ascending,
    );
    // max values: 0:1 1:2 2:3 3:2 4:4 5:5 6:2
    assert_eq!(order, vec![0, 1, 3, 6, 2, 4, 5, 7]);
}

#[test]
fn test_single_type_scope() {
    let index = scenario_index();
    let order = sorted(
        &index,
        JoinScope::Type("child".to_string()),
        MultiValueMode::Min,
        MissingValue::Last,
        SortDirection::Ascending,
    );
    // child keys: 1:2 2:3 4:4 5:5 6:2; parents and the unrelated doc have none
    assert_eq!(order, vec![1, 6, 2, 4, 5, 0, 3, 7]);
}

#[test]
fn test_sort_value_per_document() {
    let index = scenario_index();
    let extractor = index
        .sort_extractor(
            JoinScope::Type("parent".to_string()),
            MultiValueMode::Min,
            MissingValue::Last,
            SortDirection::Ascending,
        )
        .unwrap();

    let (segment, doc) = locate(&index, 4);
    assert_eq!(
        extractor.sort_value(segment, doc).unwrap(),
        SortValue::Key(JoinKey::from("2"))
    );
    let (segment, doc) = locate(&index, 6);
    assert_eq!(extractor.sort_value(segment, doc).unwrap(), SortValue::Missing);
}

#[test]
fn test_top_n_is_a_prefix() {
    let index = scenario_index();
    let extractor = index
        .sort_extractor(
            JoinScope::AllTypes,
            MultiValueMode::Min,
            MissingValue::Last,
            SortDirection::Descending,
        )
        .unwrap();
    let top: Vec<_> = extractor
        .top_n(3)
        .unwrap()
        .into_iter()
        .map(|hit| hit.global_doc)
        .collect();
    assert_eq!(top, vec![3, 4, 6]);
}

#[test]
fn test_top_n_larger_than_index() {
    let index = scenario_index();
    let extractor = index
        .sort_extractor(
            JoinScope::AllTypes,
            MultiValueMode::Min,
            MissingValue::Last,
            SortDirection::Ascending,
        )
        .unwrap();
    let all: Vec<_> = extractor
        .top_n(usize::MAX)
        .unwrap()
        .into_iter()
        .map(|hit| hit.global_doc)
        .collect();
    assert_eq!(all, vec![0, 1, 2, 5, 3, 4, 6, 7]);
}
