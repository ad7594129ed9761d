//! Reasons an arm ends up unmapped.
//!
//! Each reason carries the single-character code written as the `XC` attribute
//! of an unmapped record. The codes are ordered by reporting precedence: when
//! several facts are known about an arm, the one furthest along the mapping
//! pipeline wins, and a blocked arm outranks everything.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an arm was not reported as mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnmappedReason {
    /// Nothing is known about the arm
    NoInformation,
    /// The arm was paired with its mate but no combination passed
    Mated,
    /// A mated combination passed the score threshold but was not reported
    MatedAlignScore,
    /// An unmated hit passed the search score threshold but was not reported
    UnmatedAlignScore,
    /// An unmated alignment was computed for the arm
    UnmatedComputeAlignment,
    /// The arm had too many equally good hits
    Blocked,
}

impl UnmappedReason {
    /// All reasons, lowest precedence first.
    pub const ALL: [UnmappedReason; 6] = [
        Self::NoInformation,
        Self::Mated,
        Self::MatedAlignScore,
        Self::UnmatedAlignScore,
        Self::UnmatedComputeAlignment,
        Self::Blocked,
    ];

    /// The `XC` attribute character for this reason.
    #[must_use]
    pub fn code(&self) -> char {
        match self {
            Self::NoInformation => 'A',
            Self::Mated => 'C',
            Self::MatedAlignScore => 'D',
            Self::UnmatedAlignScore => 'E',
            Self::UnmatedComputeAlignment => 'F',
            Self::Blocked => 'B',
        }
    }

    /// Parses an `XC` attribute character.
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    /// Returns a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoInformation => "No mapping information for the arm",
            Self::Mated => "Arm was mated but no mated alignment passed",
            Self::MatedAlignScore => "Mated alignment passed but was not reported",
            Self::UnmatedAlignScore => "Unmated hit passed the search score but was not reported",
            Self::UnmatedComputeAlignment => "Unmated alignment computed but not reported",
            Self::Blocked => "Arm had too many equally good hits",
        }
    }
}

impl fmt::Display for UnmappedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use mapmerge_metrics::unmapped::format_count;
///
/// assert_eq!(format_count(1234567), "1,234,567");
/// assert_eq!(format_count(123), "123");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
