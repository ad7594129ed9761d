//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use clap::Args;

use mapmerge_lib::errors::MapMergeError;
use mapmerge_lib::pairing::{MachineOrientation, PairingConfig};
use mapmerge_lib::region::thread_padding;
use mapmerge_lib::validation::validate_threads;

/// Lengths of the reference templates, in template-id order.
#[derive(Debug, Clone, Args)]
pub struct ReferenceOptions {
    /// Template lengths, comma separated, in template-id order
    #[arg(short = 'l', long = "template-lengths", value_delimiter = ',', required = true)]
    pub template_lengths: Vec<i64>,
}

impl ReferenceOptions {
    /// Validates that there is at least one template and no length is negative.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid length.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.template_lengths.is_empty() {
            return Err(MapMergeError::InvalidParameter {
                parameter: "template-lengths".to_string(),
                reason: "at least one template is required".to_string(),
            }
            .into());
        }
        if let Some(len) = self.template_lengths.iter().find(|&&l| l < 0 || l > i64::from(i32::MAX)) {
            return Err(MapMergeError::InvalidParameter {
                parameter: "template-lengths".to_string(),
                reason: format!("length {len} must be in 0..={}", i32::MAX),
            }
            .into());
        }
        Ok(())
    }

    /// Length of the longest template.
    #[must_use]
    pub fn max_length(&self) -> i64 {
        self.template_lengths.iter().copied().max().unwrap_or(0)
    }
}

/// Worker thread count.
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of worker threads; the reference is split into this many regions.
    ///
    /// With one thread the hits are processed directly, without regions.
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub threads: usize,
}

impl ThreadingOptions {
    /// Validates the thread count.
    ///
    /// # Errors
    ///
    /// Returns an error if the count is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_threads(self.threads)?;
        Ok(())
    }

    /// Whether the single-threaded path applies.
    #[must_use]
    pub fn is_single_threaded(&self) -> bool {
        self.threads == 1
    }
}

/// Mate pairing options.
#[derive(Debug, Clone, Args)]
pub struct PairingOptions {
    /// Shortest accepted fragment length, inclusive
    #[arg(long = "min-fragment-length", default_value_t = 0)]
    pub min_fragment_length: i32,

    /// Longest accepted fragment length, inclusive
    #[arg(long = "max-fragment-length", default_value_t = 1000)]
    pub max_fragment_length: i32,

    /// Read length used to compute fragment lengths
    #[arg(long = "read-length", default_value_t = 100)]
    pub read_length: i32,

    /// Expected pair orientation: FR, RF or ANY
    #[arg(long = "orientation", default_value = "FR")]
    pub orientation: MachineOrientation,
}

impl Default for PairingOptions {
    fn default() -> Self {
        let config = PairingConfig::default();
        Self {
            min_fragment_length: config.min_fragment_length,
            max_fragment_length: config.max_fragment_length,
            read_length: config.read_length,
            orientation: config.orientation,
        }
    }
}

impl PairingOptions {
    /// The validated pairing configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the fragment bounds are negative or not monotonic.
    pub fn to_config(&self) -> anyhow::Result<PairingConfig> {
        let config = PairingConfig {
            min_fragment_length: self.min_fragment_length,
            max_fragment_length: self.max_fragment_length,
            read_length: self.read_length,
            orientation: self.orientation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Region padding that lets a worker see both arms of every pair it owns.
    #[must_use]
    pub fn padding(&self) -> i64 {
        thread_padding(self.max_fragment_length, self.read_length)
    }
}
