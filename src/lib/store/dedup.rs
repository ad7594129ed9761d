//! Deduplicate-then-cap retention.

use super::{HitRecord, ReadPolicy};

/// Keeps distinct placements in arrival order, up to a cap.
///
/// A placement's identity is `(template_id, template_start, reverse)`.
/// Resubmitting a kept identity keeps the lower score; identities arriving
/// after the cap is reached are dropped.
#[derive(Debug, Clone, Copy)]
pub struct DedupPolicy {
    cap: usize,
}

/// Retained records plus a saturating count of distinct identities offered.
#[derive(Debug, Clone, Default)]
pub struct DedupSlots {
    kept: Vec<HitRecord>,
    distinct: u16,
}

impl DedupPolicy {
    /// Creates a policy keeping at most `cap` records per slot; zero is treated as one.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self { cap: cap.max(1) }
    }
}

fn same_identity(a: &HitRecord, b: &HitRecord) -> bool {
    a.template_id == b.template_id && a.template_start == b.template_start && a.reverse == b.reverse
}

impl ReadPolicy for DedupPolicy {
    type Slots = DedupSlots;

    fn offer(&self, slots: &mut DedupSlots, _read_id: i32, hit: HitRecord) {
        if let Some(kept) = slots.kept.iter_mut().find(|r| same_identity(r, &hit)) {
            if hit.combo_score < kept.combo_score {
                *kept = hit;
            }
            return;
        }
        slots.distinct = slots.distinct.saturating_add(1);
        if slots.kept.len() < self.cap {
            slots.kept.push(hit);
        }
    }

    fn records<'a>(&self, slots: &'a DedupSlots) -> &'a [HitRecord] {
        &slots.kept
    }

    fn result_count(&self, slots: &DedupSlots) -> u32 {
        u32::from(slots.distinct)
    }
}
