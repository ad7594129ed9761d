//! Per-read mapping status bitmasks.
//!
//! Each read carries a `u16` of facts learned while mapping it. Bits are only
//! ever OR-ed in, never cleared, which is what lets [`ReadStatusTrackerSync`]
//! update them with a single atomic `fetch_or` and no locks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use mapmerge_metrics::{MapCategory, MapStatistics, StatsArm, UnmappedReason};

use crate::read::Arm;

/// Status bit constants.
pub mod flags {
    /// First arm had at least one hit
    pub const MATCHED_FIRST: u16 = 0x0001;
    /// Second arm had at least one hit
    pub const MATCHED_SECOND: u16 = 0x0002;
    /// The arms were paired in a window
    pub const MATED: u16 = 0x0004;
    /// A mated combination passed the mated score threshold
    pub const MATED_ALIGN_SCORE: u16 = 0x0008;
    /// An unmated alignment was computed for the first arm
    pub const UNMATED_COMPUTE_ALIGNMENT_FIRST: u16 = 0x0010;
    /// An unmated alignment was computed for the second arm
    pub const UNMATED_COMPUTE_ALIGNMENT_SECOND: u16 = 0x0020;
    /// An unmated first-arm hit passed the search score threshold
    pub const UNMATED_ALIGN_SCORE_FIRST: u16 = 0x0040;
    /// An unmated second-arm hit passed the search score threshold
    pub const UNMATED_ALIGN_SCORE_SECOND: u16 = 0x0080;
    /// First arm had too many equally good hits
    pub const BLOCKED_FIRST: u16 = 0x0100;
    /// Second arm had too many equally good hits
    pub const BLOCKED_SECOND: u16 = 0x0200;
    /// First arm was reported with a unique best placement
    pub const UNIQUELY_MAPPED_FIRST: u16 = 0x0400;
    /// Second arm was reported with a unique best placement
    pub const UNIQUELY_MAPPED_SECOND: u16 = 0x0800;
    /// First arm was written to the mated or unmated output
    pub const REPORTED_FIRST: u16 = 0x1000;
    /// Second arm was written to the mated or unmated output
    pub const REPORTED_SECOND: u16 = 0x2000;
}

/// The per-arm variant of a status bit pair.
#[must_use]
pub fn for_arm(arm: Arm, first: u16, second: u16) -> u16 {
    match arm {
        Arm::First => first,
        Arm::Second => second,
    }
}

/// Derives the unmapped reason for one arm from its accumulated bits.
///
/// Precedence, highest first: blocked, unmated alignment computed, unmated
/// alignment passed, mated alignment passed, mated. Anything else, including
/// a read with only `MATCHED_*` bits, has no information.
#[must_use]
pub fn xc_code(status: u16, arm: Arm) -> UnmappedReason {
    use flags::*;
    let has = |bits: u16| status & bits == bits;
    if has(for_arm(arm, BLOCKED_FIRST, BLOCKED_SECOND)) {
        UnmappedReason::Blocked
    } else if has(for_arm(arm, UNMATED_COMPUTE_ALIGNMENT_FIRST, UNMATED_COMPUTE_ALIGNMENT_SECOND)) {
        UnmappedReason::UnmatedComputeAlignment
    } else if has(for_arm(arm, UNMATED_ALIGN_SCORE_FIRST, UNMATED_ALIGN_SCORE_SECOND)) {
        UnmappedReason::UnmatedAlignScore
    } else if has(MATED_ALIGN_SCORE) {
        UnmappedReason::MatedAlignScore
    } else if has(MATED) {
        UnmappedReason::Mated
    } else {
        UnmappedReason::NoInformation
    }
}

/// Per-read status bitmasks shared by every worker of a run.
pub trait StatusTracker: Send + Sync {
    /// ORs `bits` into the read's status.
    fn add_status(&mut self, read_id: i32, bits: u16);

    /// The read's accumulated status; zero for out-of-range ids.
    fn status(&self, read_id: i32) -> u16;

    /// Number of reads tracked.
    fn num_reads(&self) -> usize;

    /// Returns a handle to the same tracker for another worker, or `None` if
    /// the tracker is not synchronized.
    fn share(&self) -> Option<Box<dyn StatusTracker>>;

    /// Whether every bit of `mask` is set for the read.
    fn get_status(&self, read_id: i32, mask: u16) -> bool {
        self.status(read_id) & mask == mask
    }

    /// The `XC` character for one arm of a read.
    fn get_xc_attribute(&self, read_id: i32, first_arm: bool) -> char {
        let arm = if first_arm { Arm::First } else { Arm::Second };
        xc_code(self.status(read_id), arm).code()
    }
}

/// Unsynchronized tracker for single-threaded runs.
#[derive(Debug, Clone)]
pub struct ReadStatusTracker {
    status: Vec<u16>,
}

impl ReadStatusTracker {
    /// Creates a tracker with every read's status clear.
    #[must_use]
    pub fn new(num_reads: usize) -> Self {
        Self { status: vec![0; num_reads] }
    }
}

impl StatusTracker for ReadStatusTracker {
    fn add_status(&mut self, read_id: i32, bits: u16) {
        debug_assert!(usize::try_from(read_id).is_ok_and(|i| i < self.status.len()));
        if let Some(s) = usize::try_from(read_id).ok().and_then(|i| self.status.get_mut(i)) {
            *s |= bits;
        }
    }

    fn status(&self, read_id: i32) -> u16 {
        usize::try_from(read_id).ok().and_then(|i| self.status.get(i)).copied().unwrap_or(0)
    }

    fn num_reads(&self) -> usize {
        self.status.len()
    }

    fn share(&self) -> Option<Box<dyn StatusTracker>> {
        None
    }
}

/// Lock-free tracker shared across worker threads.
#[derive(Debug)]
pub struct ReadStatusTrackerSync {
    status: Vec<AtomicU16>,
}

impl ReadStatusTrackerSync {
    /// Creates a tracker with every read's status clear.
    #[must_use]
    pub fn new(num_reads: usize) -> Self {
        Self { status: (0..num_reads).map(|_| AtomicU16::new(0)).collect() }
    }

    fn entry(&self, read_id: i32) -> Option<&AtomicU16> {
        usize::try_from(read_id).ok().and_then(|i| self.status.get(i))
    }

    /// ORs `bits` into the read's status atomically.
    pub fn add_status(&self, read_id: i32, bits: u16) {
        debug_assert!(usize::try_from(read_id).is_ok_and(|i| i < self.status.len()));
        if let Some(entry) = self.entry(read_id) {
            entry.fetch_or(bits, Ordering::AcqRel);
        }
    }

    /// The read's accumulated status.
    #[must_use]
    pub fn status(&self, read_id: i32) -> u16 {
        self.entry(read_id).map_or(0, |e| e.load(Ordering::Acquire))
    }
}

impl StatusTracker for Arc<ReadStatusTrackerSync> {
    fn add_status(&mut self, read_id: i32, bits: u16) {
        (**self).add_status(read_id, bits);
    }

    fn status(&self, read_id: i32) -> u16 {
        (**self).status(read_id)
    }

    fn num_reads(&self) -> usize {
        self.status.len()
    }

    fn share(&self) -> Option<Box<dyn StatusTracker>> {
        Some(Box::new(Arc::clone(self)))
    }
}

/// Builds the unsynchronized tracker for one thread and the atomic one otherwise.
#[must_use]
pub fn build_tracker(num_reads: usize, threads: usize) -> Box<dyn StatusTracker> {
    if threads > 1 {
        Box::new(Arc::new(ReadStatusTrackerSync::new(num_reads)))
    } else {
        Box::new(ReadStatusTracker::new(num_reads))
    }
}

/// Classifies one arm of a read for the final statistics.
///
/// A reported arm is mated when the read passed the mated threshold, since a
/// passing pair is always reported or blocked; otherwise it is unmated.
#[must_use]
pub fn map_category(status: u16, arm: Arm) -> MapCategory {
    use flags::*;
    let has = |bits: u16| status & bits == bits;
    let unique = has(for_arm(arm, UNIQUELY_MAPPED_FIRST, UNIQUELY_MAPPED_SECOND));
    if has(for_arm(arm, BLOCKED_FIRST, BLOCKED_SECOND)) {
        MapCategory::Unmapped(UnmappedReason::Blocked)
    } else if !has(for_arm(arm, REPORTED_FIRST, REPORTED_SECOND)) {
        MapCategory::Unmapped(xc_code(status, arm))
    } else if has(MATED_ALIGN_SCORE) {
        if unique { MapCategory::MatedUnique } else { MapCategory::MatedAmbiguous }
    } else if unique {
        MapCategory::UnmatedUnique
    } else {
        MapCategory::UnmatedAmbiguous
    }
}

/// Terminal pass counting every arm of every read into `stats`.
///
/// Must not run concurrently with further `add_status` calls.
pub fn calculate_statistics(tracker: &dyn StatusTracker, paired: bool, stats: &mut MapStatistics) {
    for read_id in 0..tracker.num_reads() {
        let status = tracker.status(read_id as i32);
        stats.increment(StatsArm::First, map_category(status, Arm::First));
        if paired {
            stats.increment(StatsArm::Second, map_category(status, Arm::Second));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::flags::*;
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::thread;

    #[test]
    fn test_xc_reflects_mated_align_score_in_either_order() {
        let mut tracker = ReadStatusTracker::new(2);
        tracker.add_status(0, MATED);
        tracker.add_status(0, MATED_ALIGN_SCORE);
        tracker.add_status(1, MATED_ALIGN_SCORE);
        tracker.add_status(1, MATED);
        assert_eq!(tracker.get_xc_attribute(0, false), 'D');
        assert_eq!(tracker.get_xc_attribute(1, false), 'D');
        assert_eq!(tracker.get_xc_attribute(0, true), 'D');
    }

    #[rstest]
    #[case(0, true, 'A')]
    #[case(MATCHED_FIRST | MATCHED_SECOND, true, 'A')]
    #[case(MATED, true, 'C')]
    #[case(MATED | MATED_ALIGN_SCORE, true, 'D')]
    #[case(MATED_ALIGN_SCORE | UNMATED_ALIGN_SCORE_FIRST, true, 'E')]
    #[case(MATED_ALIGN_SCORE | UNMATED_ALIGN_SCORE_FIRST, false, 'D')]
    #[case(UNMATED_ALIGN_SCORE_SECOND | UNMATED_COMPUTE_ALIGNMENT_SECOND, false, 'F')]
    #[case(UNMATED_COMPUTE_ALIGNMENT_FIRST | BLOCKED_FIRST, true, 'B')]
    #[case(BLOCKED_FIRST, false, 'A')]
    fn test_xc_precedence(#[case] bits: u16, #[case] first: bool, #[case] expected: char) {
        let mut tracker = ReadStatusTracker::new(1);
        tracker.add_status(0, bits);
        assert_eq!(tracker.get_xc_attribute(0, first), expected);
    }

    #[test]
    fn test_get_status_requires_all_bits() {
        let mut tracker = ReadStatusTracker::new(1);
        tracker.add_status(0, MATED);
        assert!(tracker.get_status(0, MATED));
        assert!(!tracker.get_status(0, MATED | MATED_ALIGN_SCORE));
        assert!(tracker.get_status(0, 0));
    }

    #[test]
    fn test_out_of_range_reads_are_clear() {
        let tracker = ReadStatusTracker::new(1);
        assert_eq!(tracker.status(5), 0);
        assert_eq!(tracker.status(-1), 0);
    }

    #[test]
    fn test_sync_concurrent_or() {
        let tracker = Arc::new(ReadStatusTrackerSync::new(4));
        let bits = [MATCHED_FIRST, MATCHED_SECOND, MATED, MATED_ALIGN_SCORE, BLOCKED_FIRST];
        let handles: Vec<_> = bits
            .iter()
            .map(|&b| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for read in 0..4 {
                        ReadStatusTrackerSync::add_status(&tracker, read, b);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let all = bits.iter().fold(0, |acc, b| acc | b);
        for read in 0..4 {
            assert_eq!(ReadStatusTrackerSync::status(&tracker, read), all);
        }
    }

    #[test]
    fn test_shared_tracker_handles() {
        let tracker = build_tracker(3, 2);
        let mut other = tracker.share().unwrap();
        other.add_status(2, UNIQUELY_MAPPED_FIRST);
        assert!(tracker.get_status(2, UNIQUELY_MAPPED_FIRST));
        assert!(build_tracker(3, 1).share().is_none());
    }

    #[test]
    fn test_calculate_statistics() {
        let reported = REPORTED_FIRST | REPORTED_SECOND;
        let mut tracker = ReadStatusTracker::new(4);
        tracker.add_status(0, MATED | MATED_ALIGN_SCORE | UNIQUELY_MAPPED_FIRST | reported);
        tracker.add_status(1, UNMATED_ALIGN_SCORE_FIRST | UNMATED_ALIGN_SCORE_SECOND | reported);
        tracker.add_status(2, BLOCKED_SECOND | UNMATED_ALIGN_SCORE_SECOND);
        tracker.add_status(3, UNMATED_ALIGN_SCORE_FIRST);

        let mut stats = MapStatistics::new(true);
        calculate_statistics(&tracker, true, &mut stats);

        let first = stats.arm(StatsArm::First);
        assert_eq!(first.total, 4);
        assert_eq!(first.mated_unique, 1);
        assert_eq!(first.unmated_ambiguous, 1);
        assert_eq!(first.unmapped_unmated_align_score, 1);
        assert_eq!(first.unmapped_no_information, 1);

        let second = stats.arm(StatsArm::Second);
        assert_eq!(second.mated_ambiguous, 1);
        assert_eq!(second.unmated_ambiguous, 1);
        assert_eq!(second.unmapped_blocked, 1);
        assert_eq!(second.unmapped_no_information, 1);
        assert_eq!(stats.arm(StatsArm::First).unmapped(), 2);
    }

    proptest! {
        #[test]
        fn prop_bits_never_cleared(updates in prop::collection::vec((0i32..8, any::<u16>()), 0..100)) {
            let mut tracker = ReadStatusTracker::new(8);
            let mut expected = [0u16; 8];
            for (read, bits) in updates {
                let before = tracker.status(read);
                tracker.add_status(read, bits);
                prop_assert_eq!(tracker.status(read) & before, before);
                expected[read as usize] |= bits;
            }
            for read in 0..8 {
                prop_assert_eq!(tracker.status(read), expected[read as usize]);
            }
        }
    }
}
