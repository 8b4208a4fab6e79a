//! Build-once cache of global join field data
//!
//! The cache holds slots keyed by snapshot id, oldest first. Slots are inserted
//! with `rcu` and filled through a `OnceCell`: concurrent first requests for a
//! snapshot block on a single build, later requests are an atomic load plus a
//! cell read. A failed build leaves the cell empty.
//!
//! Readers still holding an older snapshot share one slot for it. Slots older
//! than a snapshot are dropped once that snapshot's build publishes.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::Result;
use crate::metrics::JoinIndexMetrics;
use crate::segment::{Snapshot, SnapshotId};

use super::global::{GlobalJoinFieldData, GlobalOrdinalsBuilder};

struct CacheSlot {
    snapshot_id: SnapshotId,
    global: OnceCell<Arc<GlobalJoinFieldData>>,
}

impl CacheSlot {
    fn new(snapshot_id: SnapshotId) -> Self {
        Self {
            snapshot_id,
            global: OnceCell::new(),
        }
    }
}

/// Global join field data per snapshot, newest last
pub struct GlobalOrdinalsCache {
    slots: ArcSwap<Vec<Arc<CacheSlot>>>,
    metrics: Option<JoinIndexMetrics>,
}

impl GlobalOrdinalsCache {
    pub fn new() -> Self {
        Self {
            slots: ArcSwap::from_pointee(Vec::new()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: JoinIndexMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Global data for `snapshot`, building it on first request
    pub fn get_or_build(&self, snapshot: &Snapshot) -> Result<Arc<GlobalJoinFieldData>> {
        self.get_or_build_with(snapshot, GlobalOrdinalsBuilder::build)
    }

    /// Like `get_or_build` with a caller supplied build function
    pub fn get_or_build_with<F>(
        &self,
        snapshot: &Snapshot,
        build: F,
    ) -> Result<Arc<GlobalJoinFieldData>>
    where
        F: FnOnce(&Snapshot) -> Result<GlobalJoinFieldData>,
    {
        let slot = self.slot_for(snapshot.id());

        if let Some(global) = slot.global.get() {
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit();
            }
            return Ok(global.clone());
        }

        let global = slot
            .global
            .get_or_try_init(|| self.timed_build(snapshot, build).map(Arc::new))?
            .clone();
        self.prune_older_than(snapshot.id());
        Ok(global)
    }

    /// Data of the newest slot, if it has been filled
    pub fn cached(&self) -> Option<Arc<GlobalJoinFieldData>> {
        self.slots.load().last()?.global.get().cloned()
    }

    /// Snapshot id of the newest slot, filled or not
    pub fn cached_snapshot(&self) -> Option<SnapshotId> {
        self.slots.load().last().map(|slot| slot.snapshot_id)
    }

    /// Number of snapshots holding a slot
    pub fn slot_count(&self) -> usize {
        self.slots.load().len()
    }

    /// Drop every slot
    pub fn clear(&self) {
        self.slots.store(Arc::new(Vec::new()));
    }

    /// Slot for `snapshot_id`, inserting an empty one if none exists
    fn slot_for(&self, snapshot_id: SnapshotId) -> Arc<CacheSlot> {
        if let Some(slot) = find(&self.slots.load(), snapshot_id) {
            return slot;
        }

        self.slots.rcu(|slots| {
            if find(slots, snapshot_id).is_some() {
                return Arc::clone(slots);
            }
            let mut next = Vec::with_capacity(slots.len() + 1);
            next.extend(slots.iter().cloned());
            let at = next.partition_point(|slot| slot.snapshot_id < snapshot_id);
            next.insert(at, Arc::new(CacheSlot::new(snapshot_id)));
            Arc::new(next)
        });
        debug!(snapshot = %snapshot_id, "installed global ordinals slot");

        // pruned by a concurrent newer build: serve this request uncached
        match find(&self.slots.load(), snapshot_id) {
            Some(slot) => slot,
            None => Arc::new(CacheSlot::new(snapshot_id)),
        }
    }

    /// Drop slots of snapshots older than `snapshot_id`
    fn prune_older_than(&self, snapshot_id: SnapshotId) {
        let stale = |slots: &[Arc<CacheSlot>]| {
            slots.first().map_or(false, |slot| slot.snapshot_id < snapshot_id)
        };
        if !stale(self.slots.load().as_slice()) {
            return;
        }
        self.slots.rcu(|slots| {
            if !stale(slots.as_slice()) {
                return Arc::clone(slots);
            }
            let kept: Vec<_> = slots
                .iter()
                .filter(|slot| slot.snapshot_id >= snapshot_id)
                .cloned()
                .collect();
            Arc::new(kept)
        });
        debug!(snapshot = %snapshot_id, "dropped superseded global ordinals slots");
    }

    fn timed_build<F>(&self, snapshot: &Snapshot, build: F) -> Result<GlobalJoinFieldData>
    where
        F: FnOnce(&Snapshot) -> Result<GlobalJoinFieldData>,
    {
        let start = Instant::now();
        match build(snapshot) {
            Ok(global) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_build(start.elapsed().as_secs_f64(), global.total_ordinals());
                }
                Ok(global)
            }
            Err(e) => {
                warn!(snapshot = %snapshot.id(), error = %e, "global ordinals build failed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_build_failure();
                }
                Err(e)
            }
        }
    }
}

fn find(slots: &[Arc<CacheSlot>], snapshot_id: SnapshotId) -> Option<Arc<CacheSlot>> {
    slots
        .binary_search_by(|slot| slot.snapshot_id.cmp(&snapshot_id))
        .ok()
        .map(|at| Arc::clone(&slots[at]))
}

impl Default for GlobalOrdinalsCache {
    fn default() -> Self {
        Self::new()
    }
}
