//! Logging utilities for formatted output.
//!
//! This module provides consistent, user-friendly logging utilities for mapping
//! statistics, progress tracking, and operation summaries.

use std::time::{Duration, Instant};

use mapmerge_metrics::{ArmMapStatistics, MapStatistics, StatsArm, UnmappedReason, format_count};

/// Formats a percentage with specified decimal places.
///
/// # Examples
///
/// ```
/// use mapmerge_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(0.5, 1), "50.0%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form (e.g. "2m 15s", "1h 30m", "45s").
///
/// # Examples
///
/// ```
/// use mapmerge_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(45)), "45s");
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a rate of hits per second.
///
/// # Examples
///
/// ```
/// use mapmerge_lib::logging::format_rate;
/// use std::time::Duration;
///
/// assert_eq!(format_rate(1000, Duration::from_secs(1)), "1,000 hits/s");
/// assert_eq!(format_rate(600, Duration::from_secs(60)), "10 hits/s");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} hits/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} hits/s", format_count(rate as u64))
    } else {
        let per_min = count as f64 / (secs / 60.0);
        format!("{per_min:.1} hits/min")
    }
}

/// Logs a formatted summary of the final mapping statistics.
///
/// # Examples
///
/// ```no_run
/// use mapmerge_lib::logging::log_map_statistics;
/// use mapmerge_metrics::{MapCategory, MapStatistics, StatsArm};
///
/// let mut stats = MapStatistics::new(false);
/// stats.increment(StatsArm::First, MapCategory::UnmatedUnique);
/// log_map_statistics(&stats);
/// ```
pub fn log_map_statistics(stats: &MapStatistics) {
    log::info!("Mapping Summary:");
    if stats.is_paired() {
        log_arm("First arm", stats.arm(StatsArm::First));
        log_arm("Second arm", stats.arm(StatsArm::Second));
    } else {
        log_arm("Reads", stats.arm(StatsArm::First));
    }
}

#[allow(clippy::cast_precision_loss)]
fn log_arm(label: &str, arm: &ArmMapStatistics) {
    log::info!("  {label}: {}", format_count(arm.total));
    if arm.total == 0 {
        return;
    }
    let pct = |n: u64| format_percent(n as f64 / arm.total as f64, 2);
    log::info!(
        "    Mated: {} ({}), ambiguous {}",
        format_count(arm.mated()),
        pct(arm.mated()),
        format_count(arm.mated_ambiguous)
    );
    log::info!(
        "    Unmated: {} ({}), ambiguous {}",
        format_count(arm.unmated()),
        pct(arm.unmated()),
        format_count(arm.unmated_ambiguous)
    );
    log::info!("    Unmapped: {} ({})", format_count(arm.unmapped()), pct(arm.unmapped()));

    let breakdown = [
        (UnmappedReason::NoInformation, arm.unmapped_no_information),
        (UnmappedReason::Mated, arm.unmapped_mated),
        (UnmappedReason::MatedAlignScore, arm.unmapped_mated_align_score),
        (UnmappedReason::UnmatedAlignScore, arm.unmapped_unmated_align_score),
        (UnmappedReason::UnmatedComputeAlignment, arm.unmapped_unmated_compute_alignment),
        (UnmappedReason::Blocked, arm.unmapped_blocked),
    ];
    for (reason, count) in breakdown.iter().filter(|(_, c)| *c > 0) {
        log::info!("      XC:{} {}: {}", reason.code(), reason.description(), format_count(*count));
    }
}

/// Operation timing and summary helper.
///
/// # Examples
///
/// ```no_run
/// use mapmerge_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Merging region outputs");
///
/// // ... do work ...
///
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time elapsed since the timer was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the completion with item count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
