//! Online sliding-window mate pairing.
//!
//! A [`PairWindow`] receives one worker's hits in non-decreasing coordinate
//! order. Each hit is matched against the opposite arm's buffered hits for the
//! same read; compatible pairs are emitted as [`WindowEvent::Mated`]. Hits that
//! fall too far behind the leading edge to ever pair are evicted, and those
//! that never mated are emitted as [`WindowEvent::Unmated`].

use std::collections::VecDeque;
use std::str::FromStr;

use crate::errors::{MapMergeError, Result};
use crate::read::Arm;
use crate::validation::{validate_fragment_lengths, validate_positive};

/// Expected relative orientation of the arms of a proper pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineOrientation {
    /// Leftmost arm forward, rightmost arm reverse (Illumina paired-end)
    #[default]
    ForwardReverse,
    /// Leftmost arm reverse, rightmost arm forward (mate-pair libraries)
    ReverseForward,
    /// Any orientation
    Any,
}

impl MachineOrientation {
    /// Whether a leftmost/rightmost orientation pair is acceptable.
    #[must_use]
    pub fn accepts(self, left_reverse: bool, right_reverse: bool) -> bool {
        match self {
            Self::ForwardReverse => !left_reverse && right_reverse,
            Self::ReverseForward => left_reverse && !right_reverse,
            Self::Any => true,
        }
    }
}

impl FromStr for MachineOrientation {
    type Err = MapMergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FR" => Ok(Self::ForwardReverse),
            "RF" => Ok(Self::ReverseForward),
            "ANY" => Ok(Self::Any),
            other => Err(MapMergeError::InvalidParameter {
                parameter: "orientation".to_string(),
                reason: format!("expected FR, RF or ANY, got '{other}'"),
            }),
        }
    }
}

/// Fragment-length window and orientation for mate pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingConfig {
    /// Shortest accepted fragment, inclusive
    pub min_fragment_length: i32,
    /// Longest accepted fragment, inclusive
    pub max_fragment_length: i32,
    /// Length of each arm
    pub read_length: i32,
    /// Accepted arm orientation
    pub orientation: MachineOrientation,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            min_fragment_length: 0,
            max_fragment_length: 1000,
            read_length: 100,
            orientation: MachineOrientation::ForwardReverse,
        }
    }
}

impl PairingConfig {
    /// Checks the fragment bounds are monotonic and the read length is positive.
    ///
    /// # Errors
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        validate_fragment_lengths(self.min_fragment_length, self.max_fragment_length)?;
        validate_positive(self.read_length, "read-length")
    }

    /// Fragment length spanned by a left arm at `left` and a right arm at `right`.
    /// Widened so positions near the end of a 32-bit template cannot overflow.
    #[must_use]
    pub fn fragment_length(&self, left: i32, right: i32) -> i64 {
        i64::from(right) - i64::from(left) + i64::from(self.read_length)
    }
}

/// A hit buffered in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Read the hit belongs to
    pub read_id: i32,
    /// Zero-based start on the window's template
    pub position: i32,
    /// Whether the hit is reverse complemented
    pub reverse: bool,
    /// Search score, lower is better
    pub score: i32,
    /// Indel penalty estimated by the search
    pub indel_score: i32,
}

/// Output of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// Two arms of a read paired within the fragment window
    Mated {
        /// Template the pair lies on
        template_id: i64,
        /// First-arm hit
        first: WindowHit,
        /// Second-arm hit
        second: WindowHit,
    },
    /// A hit that left the window without pairing
    Unmated {
        /// Template the hit lies on
        template_id: i64,
        /// Arm of the hit
        arm: Arm,
        /// The hit
        hit: WindowHit,
    },
}

#[derive(Debug, Clone, Copy)]
struct Buffered {
    hit: WindowHit,
    mated: bool,
}

/// Per-worker sliding window over both arms.
#[derive(Debug)]
pub struct PairWindow {
    config: PairingConfig,
    template_id: Option<i64>,
    last_position: i32,
    arms: [VecDeque<Buffered>; 2],
}

impl PairWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new(config: PairingConfig) -> Self {
        Self {
            config,
            template_id: None,
            last_position: i32::MIN,
            arms: [VecDeque::new(), VecDeque::new()],
        }
    }

    /// Number of hits currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.arms[0].len() + self.arms[1].len()
    }

    /// Adds a hit, emitting any pairings it completes and any evictions it causes.
    pub fn push(
        &mut self,
        template_id: i64,
        arm: Arm,
        hit: WindowHit,
        emit: &mut impl FnMut(WindowEvent),
    ) {
        if self.template_id != Some(template_id) {
            self.flush(emit);
            self.template_id = Some(template_id);
        }
        debug_assert!(hit.position >= self.last_position, "hits must arrive in coordinate order");
        self.last_position = hit.position;

        self.evict_before(hit.position, emit);

        let mut mated = false;
        let config = self.config;
        for buffered in self.arms[arm.mate().index()].iter_mut() {
            if buffered.hit.read_id != hit.read_id {
                continue;
            }
            let fragment = config.fragment_length(buffered.hit.position, hit.position);
            if fragment < i64::from(config.min_fragment_length)
                || !config.orientation.accepts(buffered.hit.reverse, hit.reverse)
            {
                continue;
            }
            let (first, second) = match arm {
                Arm::First => (hit, buffered.hit),
                Arm::Second => (buffered.hit, hit),
            };
            emit(WindowEvent::Mated { template_id, first, second });
            buffered.mated = true;
            mated = true;
        }
        self.arms[arm.index()].push_back(Buffered { hit, mated });
    }

    /// Evicts every hit that can no longer pair with a hit at or after `position`.
    fn evict_before(&mut self, position: i32, emit: &mut impl FnMut(WindowEvent)) {
        let Some(template_id) = self.template_id else { return };
        let config = self.config;
        for arm in [Arm::First, Arm::Second] {
            let queue = &mut self.arms[arm.index()];
            while let Some(front) = queue.front() {
                if config.fragment_length(front.hit.position, position)
                    <= i64::from(config.max_fragment_length)
                {
                    break;
                }
                if let Some(evicted) = queue.pop_front() {
                    if !evicted.mated {
                        emit(WindowEvent::Unmated { template_id, arm, hit: evicted.hit });
                    }
                }
            }
        }
    }

    /// Emits every buffered hit that never mated and empties the window.
    pub fn flush(&mut self, emit: &mut impl FnMut(WindowEvent)) {
        if let Some(template_id) = self.template_id {
            for arm in [Arm::First, Arm::Second] {
                for buffered in self.arms[arm.index()].drain(..) {
                    if !buffered.mated {
                        emit(WindowEvent::Unmated { template_id, arm, hit: buffered.hit });
                    }
                }
            }
        }
        self.template_id = None;
        self.last_position = i32::MIN;
    }
}
