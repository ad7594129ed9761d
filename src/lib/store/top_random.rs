//! One uniformly random winner among the best-score ties.

use ahash::AHashSet;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use super::{HitRecord, Placement, ReadPolicy};

/// Keeps exactly one record per slot using reservoir sampling over ties.
///
/// A strictly better score always replaces the winner. The `k`-th distinct
/// placement seen at the best score replaces it with probability `1/k`, drawn
/// from an RNG seeded by [`tie_break_seed`]. Resubmitting a placement already
/// seen at the best score neither counts nor draws, whether or not it is the
/// current winner. The same delivery order into a slot therefore always yields
/// the same winner, and the tie count never depends on the draws.
#[derive(Debug, Clone, Copy)]
pub struct TopRandomPolicy {
    seed: u64,
}

/// The current winner and the saturating number of distinct best-score
/// placements seen.
#[derive(Debug, Clone, Default)]
pub struct TopRandomSlot {
    winner: Option<HitRecord>,
    best_seen: AHashSet<Placement>,
    ties: u16,
}

impl TopRandomSlot {
    fn reset(&mut self, hit: HitRecord) {
        self.winner = Some(hit);
        self.best_seen.clear();
        self.best_seen.insert(hit.placement());
        self.ties = 1;
    }
}

impl TopRandomPolicy {
    /// Creates a policy with a run seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

/// Seed for the draw made on the `tie_number`-th tie of a slot.
///
/// Pure function of its inputs (a splitmix64 finalizer over the combined value).
#[must_use]
pub fn tie_break_seed(seed: u64, read_id: i32, tie_number: u16) -> u64 {
    let mut z = seed
        ^ (u64::from(read_id as u32) << 16)
        ^ u64::from(tie_number)
        ^ 0x9E37_79B9_7F4A_7C15;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl ReadPolicy for TopRandomPolicy {
    type Slots = TopRandomSlot;

    fn offer(&self, slot: &mut TopRandomSlot, read_id: i32, hit: HitRecord) {
        let Some(winner) = slot.winner else {
            slot.reset(hit);
            return;
        };
        if hit.combo_score < winner.combo_score {
            slot.reset(hit);
        } else if hit.combo_score == winner.combo_score {
            if slot.ties == u16::MAX || !slot.best_seen.insert(hit.placement()) {
                return;
            }
            slot.ties += 1;
            let mut rng = StdRng::seed_from_u64(tie_break_seed(self.seed, read_id, slot.ties));
            if rng.random_range(0..slot.ties) == 0 {
                slot.winner = Some(hit);
            }
        }
    }

    fn records<'a>(&self, slot: &'a TopRandomSlot) -> &'a [HitRecord] {
        slot.winner.as_slice()
    }

    fn result_count(&self, slot: &TopRandomSlot) -> u32 {
        u32::from(slot.ties)
    }
}
