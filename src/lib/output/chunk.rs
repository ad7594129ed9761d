//! Assigning slices of a globally sorted result set to regions.
//!
//! Given regions in padded-start order and a sorted [`ResultSet`], each region
//! receives a contiguous, half-open index range such that concatenating the
//! ranges in region order reproduces the sorted order exactly once. A result
//! covered by the padding of two neighbouring regions goes to the later one.

use std::ops::Range;

use crate::errors::{MapMergeError, Result};
use crate::region::Region;
use crate::result_set::ResultSet;

/// Computes `regions.len() + 1` boundaries; region `i` owns
/// `boundaries[i]..boundaries[i + 1]`.
///
/// # Errors
/// Returns an error if `regions` is empty or not in non-decreasing padded-start order.
pub fn find_chunk_boundaries(regions: &[Region], results: &ResultSet) -> Result<Vec<usize>> {
    if regions.is_empty() {
        return Err(MapMergeError::InvalidParameter {
            parameter: "regions".to_string(),
            reason: "at least one region is required".to_string(),
        });
    }
    if let Some(pair) = regions.windows(2).find(|w| w[0].padded_start() > w[1].padded_start()) {
        return Err(MapMergeError::InvalidRegion {
            region: pair[1].to_string(),
            reason: format!("padded start precedes that of {}", pair[0]),
        });
    }
    debug_assert!(results.is_sorted(), "result set must be sorted");

    let mut boundaries = Vec::with_capacity(regions.len() + 1);
    boundaries.push(0);
    let mut index = 0;
    for region in &regions[1..] {
        let start = region.padded_start();
        while index < results.len() && results.coordinate(index) < start {
            index += 1;
        }
        boundaries.push(index);
    }
    boundaries.push(results.len());
    Ok(boundaries)
}

/// Converts boundaries into one range per region.
#[must_use]
pub fn chunk_ranges(boundaries: &[usize]) -> Vec<Range<usize>> {
    boundaries.windows(2).map(|w| w[0]..w[1]).collect()
}
