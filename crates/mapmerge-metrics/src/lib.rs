#![deny(unsafe_code)]

//! Structured metric types and TSV writer for mapmerge runs.
//!
//! This crate provides:
//! - [`Metric`] trait for serializable metric rows
//! - [`MapStatistics`], the per-arm mapping outcome aggregate filled by the
//!   terminal status-tracker pass
//! - [`unmapped`] module with the reasons an arm ends up unmapped
//! - [`writer`] module for TSV file output

pub mod map_statistics;
pub mod unmapped;
pub mod writer;

use serde::{Deserialize, Serialize};

/// Number of decimal places used for float metrics.
pub const FLOAT_PRECISION: usize = 6;

/// Formats a float value with the standard precision for metrics.
///
/// # Example
/// ```
/// use mapmerge_metrics::format_float;
/// assert_eq!(format_float(0.9), "0.900000");
/// assert_eq!(format_float(0.0), "0.000000");
/// ```
#[must_use]
pub fn format_float(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type.
    ///
    /// Used in error messages and logging when writing metrics files.
    fn metric_name() -> &'static str;
}

pub use map_statistics::{ArmMapStatistics, MapCategory, MapStatistics, StatsArm};
pub use unmapped::{UnmappedReason, format_count};
pub use writer::{write_metrics, write_metrics_auto};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.123_456_789), "0.123457");
        assert_eq!(format_float(1.0), "1.000000");
    }
}
