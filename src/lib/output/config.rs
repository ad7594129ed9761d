//! Output processor configuration.

use std::path::PathBuf;
use std::sync::Arc;

use super::aligner::{Aligner, SearchScoreAligner};
use crate::errors::{MapMergeError, Result};
use crate::pairing::PairingConfig;
use crate::store::StoreDimensions;
use crate::validation::{validate_positive, validate_threads};

/// Which outputs a processor produces and how hits are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Every aligned hit, written as it arrives; no retention policy or mating
    Unfiltered,
    /// Single-end: distinct placements per read, up to `cap`
    SingleEndDedup {
        /// Placements kept per read
        cap: usize,
    },
    /// Single-end: the `n` best distinct placements per read
    SingleEndTopN {
        /// Placements kept per read
        n: usize,
    },
    /// Single-end: one random placement among the best-score ties
    SingleEndTopRandom,
    /// Paired-end: mated output, plus optional unmated and unmapped outputs
    Mated {
        /// Write arms with no reported mate pair
        unmated: bool,
        /// Write arms that were not reported at all
        unmapped: bool,
    },
}

impl OutputKind {
    /// Whether hits are retained in per-read stores until `finish`.
    #[must_use]
    pub fn uses_stores(&self) -> bool {
        !matches!(self, Self::Unfiltered)
    }
}

/// Configuration for a [`super::RegionOutputProcessor`].
#[derive(Clone)]
pub struct OutputConfig {
    pub(crate) kind: OutputKind,
    pub(crate) paired: bool,
    pub(crate) clip_to_region: bool,
    pub(crate) threads: usize,
    pub(crate) temp_dir: Option<PathBuf>,
    pub(crate) max_top_results: usize,
    pub(crate) seed: u64,
    pub(crate) max_mated_score: i32,
    pub(crate) max_unmated_score: i32,
    pub(crate) pairing: PairingConfig,
    pub(crate) dims: StoreDimensions,
    pub(crate) aligner: Arc<dyn Aligner>,
}

impl OutputConfig {
    /// Creates a configuration with defaults for everything but the kind and sizes.
    #[must_use]
    pub fn new(kind: OutputKind, dims: StoreDimensions) -> Self {
        Self {
            kind,
            paired: matches!(kind, OutputKind::Mated { .. }),
            clip_to_region: false,
            threads: 1,
            temp_dir: None,
            max_top_results: 5,
            seed: 42,
            max_mated_score: i32::MAX,
            max_unmated_score: i32::MAX,
            pairing: PairingConfig::default(),
            dims,
            aligner: Arc::new(SearchScoreAligner),
        }
    }

    /// Treat read ids as arm-encoded paired ids. Forced on for mated output.
    #[must_use]
    pub fn paired(mut self, paired: bool) -> Self {
        self.paired = paired || matches!(self.kind, OutputKind::Mated { .. });
        self
    }

    /// Drop hits outside the worker's unpadded region.
    #[must_use]
    pub fn clip_to_region(mut self, clip: bool) -> Self {
        self.clip_to_region = clip;
        self
    }

    /// Number of worker threads; more than one selects synchronized stores.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Directory in which the per-run temp directory is created.
    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    /// Equal-best tie count above which an arm is blocked.
    #[must_use]
    pub fn max_top_results(mut self, max: usize) -> Self {
        self.max_top_results = max;
        self
    }

    /// Seed for random tie-breaking.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Highest accepted combined score for a mate pair.
    #[must_use]
    pub fn max_mated_score(mut self, score: i32) -> Self {
        self.max_mated_score = score;
        self
    }

    /// Highest accepted score for an unmated or single-end alignment.
    #[must_use]
    pub fn max_unmated_score(mut self, score: i32) -> Self {
        self.max_unmated_score = score;
        self
    }

    /// Fragment window and orientation for mate pairing.
    #[must_use]
    pub fn pairing(mut self, pairing: PairingConfig) -> Self {
        self.pairing = pairing;
        self
    }

    /// Aligner used to score candidate hits.
    #[must_use]
    pub fn aligner(mut self, aligner: Arc<dyn Aligner>) -> Self {
        self.aligner = aligner;
        self
    }

    /// The output kind.
    #[must_use]
    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    /// Whether read ids are arm-encoded.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.paired
    }

    /// Number of worker threads.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.threads
    }

    /// Reports configuration errors before any worker starts.
    ///
    /// # Errors
    /// Returns the first configuration problem found.
    pub fn validate(&self) -> Result<()> {
        validate_threads(self.threads)?;
        self.dims.validate()?;
        match self.kind {
            OutputKind::SingleEndDedup { cap } => validate_positive(cap, "dedup-cap")?,
            OutputKind::SingleEndTopN { n } => validate_positive(n, "top-n")?,
            OutputKind::SingleEndTopRandom | OutputKind::Unfiltered => {}
            OutputKind::Mated { .. } => self.pairing.validate()?,
        }
        if self.kind.uses_stores() {
            validate_positive(self.max_top_results, "max-top-results")?;
        }
        if self.paired && !matches!(self.kind, OutputKind::Mated { .. } | OutputKind::Unfiltered) {
            return Err(MapMergeError::InvalidParameter {
                parameter: "paired".to_string(),
                reason: format!("{:?} output is single-end only", self.kind),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MapMergeError;

    fn dims() -> StoreDimensions {
        StoreDimensions::new(10, 1, 1000)
    }

    #[test]
    fn test_mated_forces_paired() {
        let config =
            OutputConfig::new(OutputKind::Mated { unmated: true, unmapped: true }, dims())
                .paired(false);
        assert!(config.is_paired());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = OutputConfig::new(OutputKind::SingleEndTopN { n: 3 }, dims())
            .threads(4)
            .seed(9)
            .max_top_results(2)
            .clip_to_region(true);
        assert_eq!(config.num_threads(), 4);
        assert_eq!(config.seed, 9);
        assert!(config.clip_to_region);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_fragment_bounds_reported() {
        let pairing = PairingConfig {
            min_fragment_length: 500,
            max_fragment_length: 100,
            ..PairingConfig::default()
        };
        let config = OutputConfig::new(OutputKind::Mated { unmated: false, unmapped: false }, dims())
            .pairing(pairing);
        assert!(matches!(config.validate(), Err(MapMergeError::InvalidFragmentLength { .. })));
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(OutputConfig::new(OutputKind::Unfiltered, dims()).threads(0).validate().is_err());
        assert!(OutputConfig::new(OutputKind::SingleEndTopN { n: 0 }, dims()).validate().is_err());
        assert!(
            OutputConfig::new(OutputKind::SingleEndTopRandom, dims()).paired(true).validate().is_err()
        );
        assert!(
            OutputConfig::new(OutputKind::Unfiltered, StoreDimensions::new(0, 1, 10))
                .validate()
                .is_err()
        );
    }
}
