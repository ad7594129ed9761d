//! Deterministic best-`n` retention.

use ahash::AHashSet;

use super::{HitRecord, Placement, ReadPolicy};

/// Keeps up to `n` distinct placements with the lowest scores.
///
/// Records stay sorted by score; among equal scores the first seen is kept
/// ahead of later ones. A repeated placement only improves its own score.
#[derive(Debug, Clone, Copy)]
pub struct TopNPolicy {
    n: usize,
}

/// Retained records plus the saturating count of distinct placements seen at
/// the best score.
#[derive(Debug, Clone, Default)]
pub struct TopNSlots {
    kept: Vec<HitRecord>,
    best_seen: AHashSet<Placement>,
    best_ties: u8,
}

impl TopNSlots {
    /// Keeps `hit` if it is a new placement better than the worst kept one, or
    /// improves the score of a kept placement.
    fn keep(&mut self, n: usize, hit: HitRecord) {
        if let Some(idx) = self.kept.iter().position(|r| r.same_placement(&hit)) {
            if hit.combo_score < self.kept[idx].combo_score {
                self.kept.remove(idx);
                insert_sorted(&mut self.kept, hit);
            }
        } else if self.kept.len() < n {
            insert_sorted(&mut self.kept, hit);
        } else if self.kept.last().is_some_and(|worst| hit.combo_score < worst.combo_score) {
            self.kept.pop();
            insert_sorted(&mut self.kept, hit);
        }
    }

    fn reset_best(&mut self, hit: &HitRecord) {
        self.best_seen.clear();
        self.best_seen.insert(hit.placement());
        self.best_ties = 1;
    }

    /// Counts `hit` as a best-score tie the first time its placement is seen.
    /// Tracking stops once the counter saturates.
    fn note_best_tie(&mut self, hit: &HitRecord) {
        if self.best_ties < u8::MAX && self.best_seen.insert(hit.placement()) {
            self.best_ties += 1;
        }
    }
}

impl TopNPolicy {
    /// Creates a policy keeping `n` records per slot; zero is treated as one.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self { n: n.max(1) }
    }

    /// Records kept per slot.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }
}

impl ReadPolicy for TopNPolicy {
    type Slots = TopNSlots;

    fn offer(&self, slots: &mut TopNSlots, _read_id: i32, hit: HitRecord) {
        let best = slots.kept.first().map(|r| r.combo_score);
        slots.keep(self.n, hit);
        match best {
            Some(b) if hit.combo_score > b => {}
            Some(b) if hit.combo_score == b => slots.note_best_tie(&hit),
            _ => slots.reset_best(&hit),
        }
    }

    fn records<'a>(&self, slots: &'a TopNSlots) -> &'a [HitRecord] {
        &slots.kept
    }

    fn result_count(&self, slots: &TopNSlots) -> u32 {
        u32::from(slots.best_ties)
    }
}

/// Inserts after every record with a score `<=` the new one.
fn insert_sorted(kept: &mut Vec<HitRecord>, hit: HitRecord) {
    let at = kept.partition_point(|r| r.combo_score <= hit.combo_score);
    kept.insert(at, hit);
}
