//! Slot storage for a [`ReadPolicy`]: unsynchronized and sharded variants.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{HitRecord, HitStore, ReadPolicy};
use crate::result_set::ResultSet;

/// Buckets per worker thread in a [`SyncPerReadStore`].
const BUCKETS_PER_THREAD: usize = 64;

/// Single-threaded store: one slot per id, no locking.
pub struct PerReadStore<P: ReadPolicy> {
    policy: P,
    num_slots: usize,
    slots: Vec<P::Slots>,
}

impl<P: ReadPolicy> PerReadStore<P> {
    /// Creates an uninitialized store.
    #[must_use]
    pub fn new(policy: P, num_slots: usize) -> Self {
        Self { policy, num_slots, slots: Vec::new() }
    }

    fn slot(&self, slot_id: i32) -> Option<&P::Slots> {
        usize::try_from(slot_id).ok().and_then(|i| self.slots.get(i))
    }
}

impl<P: ReadPolicy> HitStore for PerReadStore<P> {
    fn initialize(&mut self) {
        self.slots = (0..self.num_slots).map(|_| P::Slots::default()).collect();
    }

    fn is_initialized(&self) -> bool {
        self.slots.len() == self.num_slots
    }

    fn process(&mut self, slot_id: i32, hit: HitRecord) {
        debug_assert!(
            usize::try_from(slot_id).is_ok_and(|i| i < self.num_slots),
            "slot id {slot_id} out of range"
        );
        let Some(slot) = usize::try_from(slot_id).ok().and_then(|i| self.slots.get_mut(i)) else {
            return;
        };
        self.policy.offer(slot, slot_id, hit);
    }

    fn set_results(&self, results: &mut ResultSet, slot_id: i32) {
        if let Some(slot) = self.slot(slot_id) {
            for record in self.policy.records(slot) {
                record.append_to(results, slot_id);
            }
        }
    }

    fn records(&self, slot_id: i32) -> Vec<HitRecord> {
        self.slot(slot_id).map(|s| self.policy.records(s).to_vec()).unwrap_or_default()
    }

    fn result_count(&self, slot_id: i32) -> u32 {
        self.slot(slot_id).map_or(0, |s| self.policy.result_count(s))
    }

    fn num_slots(&self) -> usize {
        self.num_slots
    }

    fn share(&self) -> Option<Box<dyn HitStore>> {
        None
    }
}

/// Thread-safe store: slots sharded across mutex-protected buckets.
///
/// Slot `id` lives in bucket `id % buckets` at index `id / buckets`, so a lock
/// is only held for one slot update and contention scales with read count.
pub struct SyncPerReadStore<P: ReadPolicy> {
    policy: P,
    num_slots: usize,
    buckets: Vec<Mutex<Vec<P::Slots>>>,
    initialized: AtomicBool,
}

impl<P: ReadPolicy> SyncPerReadStore<P> {
    /// Creates an uninitialized store sized for `threads` workers.
    #[must_use]
    pub fn new(policy: P, num_slots: usize, threads: usize) -> Self {
        let bucket_count = (threads.max(1) * BUCKETS_PER_THREAD).min(num_slots).max(1);
        let buckets = (0..bucket_count).map(|_| Mutex::new(Vec::new())).collect();
        Self { policy, num_slots, buckets, initialized: AtomicBool::new(false) }
    }

    /// Number of lock buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Allocates slots in every bucket.
    pub fn initialize(&self) {
        let k = self.buckets.len();
        for (b, bucket) in self.buckets.iter().enumerate() {
            let len = self.num_slots.saturating_sub(b).div_ceil(k);
            *bucket.lock() = (0..len).map(|_| P::Slots::default()).collect();
        }
        self.initialized.store(true, Ordering::Release);
    }

    /// Runs `f` on the slot for `slot_id` while holding its bucket lock.
    fn with_slot<R>(&self, slot_id: i32, f: impl FnOnce(&mut P::Slots) -> R) -> Option<R> {
        let id = usize::try_from(slot_id).ok().filter(|&i| i < self.num_slots)?;
        let k = self.buckets.len();
        let mut bucket = self.buckets[id % k].lock();
        bucket.get_mut(id / k).map(f)
    }

    /// Offers one hit; see [`ReadPolicy::offer`].
    pub fn process(&self, slot_id: i32, hit: HitRecord) {
        debug_assert!(
            usize::try_from(slot_id).is_ok_and(|i| i < self.num_slots),
            "slot id {slot_id} out of range"
        );
        self.with_slot(slot_id, |slot| self.policy.offer(slot, slot_id, hit));
    }

    /// Appends every retained record for `slot_id` to `results`.
    pub fn set_results(&self, results: &mut ResultSet, slot_id: i32) {
        for record in self.records(slot_id) {
            record.append_to(results, slot_id);
        }
    }

    /// Copies of the retained records for `slot_id`.
    #[must_use]
    pub fn records(&self, slot_id: i32) -> Vec<HitRecord> {
        self.with_slot(slot_id, |slot| self.policy.records(slot).to_vec()).unwrap_or_default()
    }

    /// See [`ReadPolicy::result_count`].
    #[must_use]
    pub fn result_count(&self, slot_id: i32) -> u32 {
        self.with_slot(slot_id, |slot| self.policy.result_count(slot)).unwrap_or(0)
    }
}

impl<P: ReadPolicy + 'static> HitStore for Arc<SyncPerReadStore<P>>
where
    P::Slots: 'static,
{
    fn initialize(&mut self) {
        (**self).initialize();
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn process(&mut self, slot_id: i32, hit: HitRecord) {
        (**self).process(slot_id, hit);
    }

    fn set_results(&self, results: &mut ResultSet, slot_id: i32) {
        (**self).set_results(results, slot_id);
    }

    fn records(&self, slot_id: i32) -> Vec<HitRecord> {
        (**self).records(slot_id)
    }

    fn result_count(&self, slot_id: i32) -> u32 {
        (**self).result_count(slot_id)
    }

    fn num_slots(&self) -> usize {
        self.num_slots
    }

    fn share(&self) -> Option<Box<dyn HitStore>> {
        Some(Box::new(Arc::clone(self)))
    }
}
