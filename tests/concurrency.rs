//! Concurrent access to global ordinals

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::scenario_index;
use joinindex::{
    GlobalJoinFieldData, GlobalOrdinal, GlobalOrdinalsBuilder, GlobalOrdinalsCache,
    JoinIndexError, Result, Snapshot,
};

const READERS: usize = 8;

/// Every `(type, ordinal, key)` of the global dictionaries
fn dump(global: &GlobalJoinFieldData) -> Vec<(String, u32, Vec<u8>)> {
    let mut out = Vec::new();
    for join_type in global.join_types() {
        for ord in 0..global.value_count(join_type) as u32 {
            let key = global.lookup_ord(join_type, GlobalOrdinal(ord)).unwrap();
            out.push((join_type.to_string(), ord, key.to_vec()));
        }
    }
    out
}

#[test]
fn test_concurrent_first_access_builds_once() {
    let index = scenario_index();
    let barrier = Barrier::new(READERS);

    let results: Vec<Arc<GlobalJoinFieldData>> = thread::scope(|s| {
        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    index.global_data().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for global in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], global));
    }
    let metrics = index.metrics().unwrap();
    assert_eq!(metrics.global_builds.get(), 1.0);
    // threads that waited on the build are not counted as hits
    assert!(metrics.cache_hits.get() < READERS as f64);
}

#[test]
fn test_readers_observe_identical_mappings() {
    let index = scenario_index();
    let expected = dump(&index.global_data().unwrap());
    let barrier = Barrier::new(READERS);

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                barrier.wait();
                for _ in 0..200 {
                    let global = index.global_data().unwrap();
                    assert_eq!(dump(&global), expected);
                }
            });
        }
    });
}

#[test]
fn test_failed_build_is_retried() {
    let index = scenario_index();
    let snapshot = index.snapshot();
    let cache = GlobalOrdinalsCache::new();
    let barrier = Barrier::new(READERS);

    let failing = |_: &Snapshot| -> Result<GlobalJoinFieldData> {
        Err(JoinIndexError::InvalidDocument("segment unreadable".to_string()))
    };

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                barrier.wait();
                assert!(cache.get_or_build_with(&snapshot, failing).is_err());
            });
        }
    });
    assert!(cache.cached().is_none());

    let global = cache.get_or_build(&snapshot).unwrap();
    assert_eq!(global.snapshot_id(), snapshot.id());
    assert!(cache.cached().is_some());
}

#[test]
fn test_snapshot_change_rebuilds() {
    let index = scenario_index();
    let before = index.global_data().unwrap();
    let before_dump = dump(&before);

    index.remove_segment(joinindex::SegmentId::new(2)).unwrap();
    let after = index.global_data().unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before.segment_count(), 3);
    assert_eq!(after.segment_count(), 2);
    // the superseded structure is untouched
    assert_eq!(dump(&before), before_dump);
    // grand-child "6" pointed at child "2", which segment 0 still holds
    assert_eq!(after.value_count("child"), 4);
    assert_eq!(before.value_count("child"), 4);

    let rebuilt = GlobalOrdinalsBuilder::build(&index.snapshot()).unwrap();
    assert_eq!(dump(&rebuilt), dump(&after));
}

#[test]
fn test_stale_snapshot_is_shared_across_readers() {
    let index = scenario_index();
    let stale = index.snapshot();
    index.global_data().unwrap();
    index.remove_segment(joinindex::SegmentId::new(2)).unwrap();
    let current = index.global_data().unwrap();

    let metrics = index.metrics().unwrap();
    let builds = metrics.global_builds.get();
    let barrier = Barrier::new(READERS);

    let results: Vec<Arc<GlobalJoinFieldData>> = thread::scope(|s| {
        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    (0..5)
                        .map(|_| index.global_data_for(&stale).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_eq!(results.len(), READERS * 5);
    for global in &results {
        assert!(Arc::ptr_eq(&results[0], global));
    }
    assert_eq!(results[0].snapshot_id(), stale.id());
    assert_eq!(results[0].segment_count(), 3);
    assert_eq!(metrics.global_builds.get(), builds + 1.0);

    // the current snapshot keeps its cached data
    assert!(Arc::ptr_eq(&current, &index.global_data().unwrap()));
}
