//! Progress tracking utilities
//!
//! A thread-safe progress tracker shared by every worker clone of an output
//! processor. Workers report processed hits; the tracker logs whenever the
//! running total crosses an interval boundary, and logs each region as its
//! worker finishes.

use log::info;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use mapmerge_metrics::format_count;

/// Thread-safe progress tracker for logging progress at regular intervals.
///
/// # Example
/// ```
/// use mapmerge_lib::progress::ProgressTracker;
/// use std::sync::Arc;
///
/// let tracker = Arc::new(ProgressTracker::new("Processed hits").with_interval(100));
/// let worker = Arc::clone(&tracker);
/// std::thread::spawn(move || {
///     for _ in 0..250 {
///         worker.log_if_needed(1); // Logs at 100, 200
///     }
/// })
/// .join()
/// .unwrap();
/// tracker.log_final(); // Logs "Processed hits 250 (complete)"
/// ```
pub struct ProgressTracker {
    /// Progress is logged when the count crosses multiples of this.
    interval: u64,
    message: String,
    count: AtomicU64,
    regions_finished: AtomicUsize,
}

impl ProgressTracker {
    /// Create a new progress tracker with a default interval of 1,000,000.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            interval: 1_000_000,
            message: message.into(),
            count: AtomicU64::new(0),
            regions_finished: AtomicUsize::new(0),
        }
    }

    /// Set the logging interval. Zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Add to the count and log every interval boundary crossed.
    ///
    /// Returns `true` if the new count lands exactly on an interval boundary.
    ///
    /// ```
    /// use mapmerge_lib::progress::ProgressTracker;
    ///
    /// let tracker = ProgressTracker::new("Hits").with_interval(100);
    /// assert!(!tracker.log_if_needed(50));  // count=50, no log
    /// assert!(!tracker.log_if_needed(60));  // count=110, logs "Hits 100"
    /// assert!(tracker.log_if_needed(90));   // count=200, logs "Hits 200"
    /// ```
    pub fn log_if_needed(&self, additional: u64) -> bool {
        if additional == 0 {
            let count = self.count.load(Ordering::Relaxed);
            return count > 0 && count.is_multiple_of(self.interval);
        }

        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let new_count = prev + additional;

        for i in (prev / self.interval + 1)..=(new_count / self.interval) {
            info!("{} {}", self.message, format_count(i * self.interval));
        }

        new_count.is_multiple_of(self.interval)
    }

    /// Record that a worker finished its region after processing `hits` hits.
    pub fn region_finished(&self, region_index: usize, hits: u64) {
        let done = self.regions_finished.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!(
            "Region {region_index} finished with {} hits ({done} regions done)",
            format_count(hits)
        );
    }

    /// Log the final count unless the last `log_if_needed` already logged it.
    pub fn log_final(&self) {
        if !self.log_if_needed(0) {
            let count = self.count.load(Ordering::Relaxed);
            if count > 0 {
                info!("{} {} (complete)", self.message, format_count(count));
            }
        }
    }

    /// The current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Number of regions reported as finished.
    #[must_use]
    pub fn regions_finished(&self) -> usize {
        self.regions_finished.load(Ordering::Relaxed)
    }
}
