//! Bounded per-read candidate-hit stores.
//!
//! Every store keeps, for each read slot, the hits its [`ReadPolicy`] decides
//! are worth reporting:
//!
//! - [`TopNPolicy`]: the best `n` distinct placements by score, first-seen wins ties
//! - [`TopRandomPolicy`]: one placement drawn uniformly among the best-score ties
//! - [`DedupPolicy`]: distinct placements up to a cap, in arrival order
//!
//! [`PerReadStore`] is the lock-free single-threaded store; [`SyncPerReadStore`]
//! shards slots across mutex-protected buckets so worker threads can share it.
//! Both are used through the object-safe [`HitStore`] trait.
//!
//! Slot ids are whatever the caller keys the store by: read ids for single-end
//! and mated stores, encoded `read_id * 2 + arm` ids for per-arm stores.
//! [`HitStore::set_results`] appends single-arm records under their slot id and
//! mated records as two entries, one per arm, under `slot * 2` and `slot * 2 + 1`.

mod dedup;
mod sync;
mod top_n;
mod top_random;

use std::sync::Arc;

use crate::errors::{MapMergeError, Result};
use crate::read::ReadEncoder;
use crate::result_set::ResultSet;

pub use dedup::DedupPolicy;
pub use sync::{PerReadStore, SyncPerReadStore};
pub use top_n::TopNPolicy;
pub use top_random::{TopRandomPolicy, tie_break_seed};

/// Coordinates and orientation of a mate arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MateInfo {
    /// Zero-based start of the mate on the same template
    pub template_start: i32,
    /// Whether the mate is reverse complemented
    pub reverse: bool,
}

/// Identity of a placement, ignoring score: template, start, orientation and mate.
pub type Placement = (i64, i32, bool, Option<MateInfo>);

/// One retained candidate for a read slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitRecord {
    /// Template the hit lies on
    pub template_id: i64,
    /// Zero-based start on the template (first arm for mated records)
    pub template_start: i32,
    /// Whether the hit (first arm for mated records) is reverse complemented
    pub reverse: bool,
    /// Alignment score, lower is better (summed over both arms for mated records)
    pub combo_score: i32,
    /// Second arm of a mated record
    pub mate: Option<MateInfo>,
}

impl HitRecord {
    /// Creates a single-arm record.
    #[must_use]
    pub fn single(template_id: i64, template_start: i32, reverse: bool, score: i32) -> Self {
        Self { template_id, template_start, reverse, combo_score: score, mate: None }
    }

    /// Creates a mated record from the first arm's placement and the second arm's.
    #[must_use]
    pub fn mated(template_id: i64, first: (i32, bool), second: (i32, bool), combo: i32) -> Self {
        Self {
            template_id,
            template_start: first.0,
            reverse: first.1,
            combo_score: combo,
            mate: Some(MateInfo { template_start: second.0, reverse: second.1 }),
        }
    }

    /// The placement this record describes.
    #[must_use]
    pub fn placement(&self) -> Placement {
        (self.template_id, self.template_start, self.reverse, self.mate)
    }

    /// Whether two records describe the same placement, ignoring score.
    #[must_use]
    pub fn same_placement(&self, other: &HitRecord) -> bool {
        self.placement() == other.placement()
    }

    /// Appends this record to a result set under `slot_id`.
    pub fn append_to(&self, results: &mut ResultSet, slot_id: i32) {
        match self.mate {
            None => results.append(self.template_id, self.template_start, slot_id, self.reverse),
            Some(mate) => {
                let first = ReadEncoder::PairedFirst.encode(slot_id);
                let second = ReadEncoder::PairedSecond.encode(slot_id);
                results.append(self.template_id, self.template_start, first, self.reverse);
                results.append(self.template_id, mate.template_start, second, mate.reverse);
            }
        }
    }
}

/// A replacement policy for one read slot.
pub trait ReadPolicy: Send + Sync {
    /// Per-slot state; `Default` is the empty slot.
    type Slots: Default + Send + Sync;

    /// Offers a hit for `read_id`, updating at most one retained record.
    fn offer(&self, slots: &mut Self::Slots, read_id: i32, hit: HitRecord);

    /// Retained records for the slot.
    fn records<'a>(&self, slots: &'a Self::Slots) -> &'a [HitRecord];

    /// Saturating count used for uniqueness and blocking decisions: the number
    /// of distinct placements seen at the best score (or distinct placements
    /// seen at all, for deduplicating stores).
    fn result_count(&self, slots: &Self::Slots) -> u32;
}

/// A per-read store usable through a trait object.
pub trait HitStore: Send + Sync {
    /// Allocates slots. Before this, every query answers "empty".
    fn initialize(&mut self);

    /// Whether [`HitStore::initialize`] has been called.
    fn is_initialized(&self) -> bool;

    /// Offers one hit for a slot. Out-of-range slot ids are ignored.
    fn process(&mut self, slot_id: i32, hit: HitRecord);

    /// Appends every retained record for `slot_id` to `results`.
    fn set_results(&self, results: &mut ResultSet, slot_id: i32);

    /// Copies of the retained records for `slot_id`.
    fn records(&self, slot_id: i32) -> Vec<HitRecord>;

    /// See [`ReadPolicy::result_count`].
    fn result_count(&self, slot_id: i32) -> u32;

    /// Number of slots.
    fn num_slots(&self) -> usize;

    /// Returns a handle to the same underlying store for another worker, or
    /// `None` if the store is not synchronized.
    fn share(&self) -> Option<Box<dyn HitStore>>;
}

/// Sizes used to allocate and sanity-check a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreDimensions {
    /// Number of reads (slot ids are `0..num_reads`, doubled for per-arm stores)
    pub num_reads: usize,
    /// Number of template sequences
    pub num_templates: usize,
    /// Length of the longest template
    pub template_max_length: i64,
}

impl StoreDimensions {
    /// Creates dimensions.
    #[must_use]
    pub fn new(num_reads: usize, num_templates: usize, template_max_length: i64) -> Self {
        Self { num_reads, num_templates, template_max_length }
    }

    /// Checks that the dimensions describe a non-empty problem.
    ///
    /// # Errors
    /// Returns an error if any dimension is zero or does not fit a slot id.
    pub fn validate(&self) -> Result<()> {
        if self.num_reads == 0 || self.num_reads > (i32::MAX as usize) / 2 {
            return Err(MapMergeError::InvalidParameter {
                parameter: "num_reads".to_string(),
                reason: format!("must be in 1..={}, got {}", i32::MAX / 2, self.num_reads),
            });
        }
        if self.num_templates == 0 {
            return Err(MapMergeError::InvalidParameter {
                parameter: "num_templates".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.template_max_length <= 0 || self.template_max_length > i64::from(i32::MAX) {
            return Err(MapMergeError::InvalidParameter {
                parameter: "template_max_length".to_string(),
                reason: format!("must fit a 32-bit position, got {}", self.template_max_length),
            });
        }
        Ok(())
    }

    /// Whether a hit lies inside the reference described by these dimensions.
    #[must_use]
    pub fn accepts(&self, hit: &HitRecord) -> bool {
        (0..self.num_templates as i64).contains(&hit.template_id)
            && (0..self.template_max_length).contains(&i64::from(hit.template_start))
    }
}

/// Which replacement policy a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePolicy {
    /// Best `n` distinct placements
    TopN {
        /// Records kept per slot
        n: usize,
    },
    /// One uniformly random placement among best-score ties
    TopRandom {
        /// Run seed mixed into each slot's tie-break draw
        seed: u64,
    },
    /// Distinct placements up to `cap`
    Dedup {
        /// Records kept per slot
        cap: usize,
    },
}

/// Builds a store with `num_slots` slots: the unsynchronized variant for a
/// single thread, the sharded [`SyncPerReadStore`] otherwise. The store is
/// returned initialized.
#[must_use]
pub fn build_store(policy: StorePolicy, num_slots: usize, threads: usize) -> Box<dyn HitStore> {
    fn boxed<P: ReadPolicy + 'static>(
        policy: P,
        num_slots: usize,
        threads: usize,
    ) -> Box<dyn HitStore>
    where
        P::Slots: 'static,
    {
        let mut store: Box<dyn HitStore> = if threads > 1 {
            Box::new(Arc::new(SyncPerReadStore::new(policy, num_slots, threads)))
        } else {
            Box::new(PerReadStore::new(policy, num_slots))
        };
        store.initialize();
        store
    }

    match policy {
        StorePolicy::TopN { n } => boxed(TopNPolicy::new(n), num_slots, threads),
        StorePolicy::TopRandom { seed } => boxed(TopRandomPolicy::new(seed), num_slots, threads),
        StorePolicy::Dedup { cap } => boxed(DedupPolicy::new(cap), num_slots, threads),
    }
}
