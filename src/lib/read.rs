//! Read arms, strand frames, and the read-id encoding stored in result sets.

use std::fmt;
use std::str::FromStr;

use crate::errors::MapMergeError;

/// One of the two reads of a paired-end fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arm {
    /// Left arm (also used for single-end reads)
    First,
    /// Right arm
    Second,
}

impl Arm {
    /// The opposite arm.
    #[must_use]
    pub fn mate(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    /// Index usable for per-arm arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

/// Strand a hit was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frame {
    /// Forward strand (`F`)
    Forward,
    /// Reverse strand (`R`)
    Reverse,
}

impl Frame {
    /// Whether the hit is reverse complemented.
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse)
    }

    /// The frame for a reverse flag.
    #[must_use]
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse { Self::Reverse } else { Self::Forward }
    }
}

impl FromStr for Frame {
    type Err = MapMergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "F" => Ok(Self::Forward),
            "R" => Ok(Self::Reverse),
            other => Err(MapMergeError::InvalidParameter {
                parameter: "frame".to_string(),
                reason: format!("expected 'F' or 'R', got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "F",
            Self::Reverse => "R",
        })
    }
}

/// Packs a read id and arm into the `encoded_read_id` column of a result set.
///
/// Paired ids interleave the arms (`read_id * 2 + arm`) so that both arms of a
/// read sort next to each other; single-end ids are the read id itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEncoder {
    /// Single-end reads
    SingleEnd,
    /// First arm of a pair
    PairedFirst,
    /// Second arm of a pair
    PairedSecond,
}

impl ReadEncoder {
    /// The paired encoder for an arm.
    #[must_use]
    pub fn for_arm(arm: Arm) -> Self {
        match arm {
            Arm::First => Self::PairedFirst,
            Arm::Second => Self::PairedSecond,
        }
    }

    /// Encodes a read id.
    #[must_use]
    pub fn encode(self, read_id: i32) -> i32 {
        match self {
            Self::SingleEnd => read_id,
            Self::PairedFirst => read_id * 2,
            Self::PairedSecond => read_id * 2 + 1,
        }
    }

    /// Decodes an id produced by [`ReadEncoder::encode`] into the read id and arm.
    #[must_use]
    pub fn decode(paired: bool, encoded: i32) -> (i32, Arm) {
        if !paired {
            return (encoded, Arm::First);
        }
        let arm = if encoded & 1 == 0 { Arm::First } else { Arm::Second };
        (encoded >> 1, arm)
    }
}
