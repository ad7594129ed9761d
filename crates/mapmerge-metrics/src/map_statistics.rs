//! Per-arm mapping outcome counts.
//!
//! [`MapStatistics`] is filled once, at the end of a run, from the read status
//! tracker. Each arm of each read lands in exactly one [`MapCategory`].

use serde::{Deserialize, Serialize};

use crate::unmapped::UnmappedReason;
use crate::{Metric, format_float};

/// Which arm a statistic row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsArm {
    /// Single-end reads, or the first arm of a pair
    First,
    /// The second arm of a pair
    Second,
}

/// The outcome of one arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapCategory {
    /// Reported as part of a mate pair with a single best placement
    MatedUnique,
    /// Reported as part of a mate pair chosen among equally good placements
    MatedAmbiguous,
    /// Reported without a mate with a single best placement
    UnmatedUnique,
    /// Reported without a mate, chosen among equally good placements
    UnmatedAmbiguous,
    /// Not reported
    Unmapped(UnmappedReason),
}

/// Mapping outcome counts for one arm, one TSV row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmMapStatistics {
    /// Arm label (`single`, `first` or `second`)
    pub arm: String,
    /// Total number of arms counted
    pub total: u64,
    /// Mated with a unique best placement
    pub mated_unique: u64,
    /// Mated, chosen among ties
    pub mated_ambiguous: u64,
    /// Unmated with a unique best placement
    pub unmated_unique: u64,
    /// Unmated, chosen among ties
    pub unmated_ambiguous: u64,
    /// Unmapped with no information (`XC:A`)
    pub unmapped_no_information: u64,
    /// Unmapped after mating (`XC:C`)
    pub unmapped_mated: u64,
    /// Unmapped with a passing mated alignment (`XC:D`)
    pub unmapped_mated_align_score: u64,
    /// Unmapped with a passing unmated alignment (`XC:E`)
    pub unmapped_unmated_align_score: u64,
    /// Unmapped after computing an unmated alignment (`XC:F`)
    pub unmapped_unmated_compute_alignment: u64,
    /// Unmapped because blocked (`XC:B`)
    pub unmapped_blocked: u64,
}

impl Metric for ArmMapStatistics {
    fn metric_name() -> &'static str {
        "mapping statistics"
    }
}

impl ArmMapStatistics {
    /// Creates an empty row with the given arm label.
    #[must_use]
    pub fn new(arm: &str) -> Self {
        Self { arm: arm.to_string(), ..Default::default() }
    }

    /// Counts one arm in the given category.
    pub fn increment(&mut self, category: MapCategory) {
        self.total += 1;
        let counter = match category {
            MapCategory::MatedUnique => &mut self.mated_unique,
            MapCategory::MatedAmbiguous => &mut self.mated_ambiguous,
            MapCategory::UnmatedUnique => &mut self.unmated_unique,
            MapCategory::UnmatedAmbiguous => &mut self.unmated_ambiguous,
            MapCategory::Unmapped(reason) => match reason {
                UnmappedReason::NoInformation => &mut self.unmapped_no_information,
                UnmappedReason::Mated => &mut self.unmapped_mated,
                UnmappedReason::MatedAlignScore => &mut self.unmapped_mated_align_score,
                UnmappedReason::UnmatedAlignScore => &mut self.unmapped_unmated_align_score,
                UnmappedReason::UnmatedComputeAlignment => {
                    &mut self.unmapped_unmated_compute_alignment
                }
                UnmappedReason::Blocked => &mut self.unmapped_blocked,
            },
        };
        *counter += 1;
    }

    /// Number of arms reported as part of a mate pair.
    #[must_use]
    pub fn mated(&self) -> u64 {
        self.mated_unique + self.mated_ambiguous
    }

    /// Number of arms reported without a mate.
    #[must_use]
    pub fn unmated(&self) -> u64 {
        self.unmated_unique + self.unmated_ambiguous
    }

    /// Number of arms not reported.
    #[must_use]
    pub fn unmapped(&self) -> u64 {
        self.total - self.mated() - self.unmated()
    }

    /// Fraction of arms reported (mated or unmated), formatted for metrics output.
    #[must_use]
    pub fn mapped_fraction(&self) -> String {
        if self.total == 0 {
            return format_float(0.0);
        }
        #[expect(clippy::cast_precision_loss, reason = "read counts never exceed 2^53")]
        let fraction = (self.mated() + self.unmated()) as f64 / self.total as f64;
        format_float(fraction)
    }
}

/// Mapping outcome counts for a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapStatistics {
    paired: bool,
    first: ArmMapStatistics,
    second: ArmMapStatistics,
}

impl MapStatistics {
    /// Creates empty statistics for a paired or single-end run.
    #[must_use]
    pub fn new(paired: bool) -> Self {
        let first = ArmMapStatistics::new(if paired { "first" } else { "single" });
        Self { paired, first, second: ArmMapStatistics::new("second") }
    }

    /// Whether the run was paired-end.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.paired
    }

    /// Counts one arm.
    pub fn increment(&mut self, arm: StatsArm, category: MapCategory) {
        self.arm_mut(arm).increment(category);
    }

    /// Statistics for one arm.
    #[must_use]
    pub fn arm(&self, arm: StatsArm) -> &ArmMapStatistics {
        match arm {
            StatsArm::First => &self.first,
            StatsArm::Second => &self.second,
        }
    }

    fn arm_mut(&mut self, arm: StatsArm) -> &mut ArmMapStatistics {
        match arm {
            StatsArm::First => &mut self.first,
            StatsArm::Second => &mut self.second,
        }
    }

    /// Rows for TSV output: one for single-end runs, two for paired runs.
    #[must_use]
    pub fn rows(&self) -> Vec<ArmMapStatistics> {
        if self.paired { vec![self.first.clone(), self.second.clone()] } else { vec![self.first.clone()] }
    }
}
