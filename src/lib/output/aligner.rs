//! The base-level aligner seam.

use crate::read::Frame;

/// A raw hit as delivered by the search stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateHit {
    /// Template the hit lies on
    pub template_id: i64,
    /// Strand of the hit
    pub frame: Frame,
    /// Read id (arm-encoded for paired runs)
    pub read_id: i32,
    /// Zero-based start on the template
    pub template_start: i32,
    /// Search score, lower is better
    pub score: i32,
    /// Indel penalty estimated by the search
    pub indel_score: i32,
}

/// A computed alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    /// Zero-based start of the aligned read
    pub template_start: i32,
    /// Alignment score, lower is better
    pub score: i32,
}

/// Computes a precise alignment for a candidate position.
pub trait Aligner: Send + Sync {
    /// Aligns the hit, or returns `None` if no alignment exists at this position.
    fn align(&self, hit: &CandidateHit) -> Option<Alignment>;
}

/// Scores a hit from the search stage alone: `score + indel_score`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchScoreAligner;

impl Aligner for SearchScoreAligner {
    fn align(&self, hit: &CandidateHit) -> Option<Alignment> {
        Some(Alignment {
            template_start: hit.template_start,
            score: hit.score.saturating_add(hit.indel_score),
        })
    }
}
