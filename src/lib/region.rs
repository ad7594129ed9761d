//! Worker regions and reference partitioning.
//!
//! A [`Region`] is the coordinate span one worker searches, plus the padding
//! it may search beyond that span so that mates straddling a boundary can be
//! found. Coordinates are `(template_id, position)` pairs compared
//! lexicographically; the end of the unpadded span is exclusive.

use std::fmt;

use crate::errors::{MapMergeError, Result};

/// Sentinel for "no padding applied" and for the fields of [`Region::NONE`].
pub const NO_PADDING: i64 = -1;

/// A worker's assigned coordinate span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    template_start_id: i64,
    start_pos: i64,
    template_end_id: i64,
    end_pos: i64,
    padded_start_pos: i64,
    padded_end_pos: i64,
}

impl Region {
    /// The entire addressable space, answered by unpartitioned processors.
    pub const NONE: Region = Region {
        template_start_id: -1,
        start_pos: -1,
        template_end_id: -1,
        end_pos: -1,
        padded_start_pos: NO_PADDING,
        padded_end_pos: NO_PADDING,
    };

    /// Creates an unpadded region from `(template_start_id, start_pos)` up to,
    /// but not including, `(template_end_id, end_pos)`.
    ///
    /// # Errors
    /// Returns an error if the start is after the end or a coordinate is negative.
    pub fn new(
        template_start_id: i64,
        start_pos: i64,
        template_end_id: i64,
        end_pos: i64,
    ) -> Result<Self> {
        let region = Self {
            template_start_id,
            start_pos,
            template_end_id,
            end_pos,
            padded_start_pos: NO_PADDING,
            padded_end_pos: NO_PADDING,
        };
        if template_start_id < 0 || start_pos < 0 || template_end_id < 0 || end_pos < 0 {
            return Err(region.invalid("coordinates must be non-negative"));
        }
        if (template_start_id, start_pos) > (template_end_id, end_pos) {
            return Err(region.invalid("start is after end"));
        }
        Ok(region)
    }

    /// Sets padded bounds. `padded_start_pos` lies on the start template and
    /// `padded_end_pos` on the end template; either may be [`NO_PADDING`].
    ///
    /// # Errors
    /// Returns an error if the padded span does not enclose the unpadded span.
    pub fn with_padding(mut self, padded_start_pos: i64, padded_end_pos: i64) -> Result<Self> {
        self.padded_start_pos = padded_start_pos;
        self.padded_end_pos = padded_end_pos;
        if padded_start_pos != NO_PADDING && !(0..=self.start_pos).contains(&padded_start_pos) {
            return Err(self.invalid("padded start must be within [0, start]"));
        }
        if padded_end_pos != NO_PADDING && padded_end_pos < self.end_pos {
            return Err(self.invalid("padded end must not be before end"));
        }
        Ok(self)
    }

    fn invalid(&self, reason: &str) -> MapMergeError {
        MapMergeError::InvalidRegion { region: self.to_string(), reason: reason.to_string() }
    }

    /// Whether this is [`Region::NONE`].
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.template_start_id < 0
    }

    /// Template holding the first coordinate.
    #[must_use]
    pub fn template_start_id(&self) -> i64 {
        self.template_start_id
    }

    /// First position on the start template.
    #[must_use]
    pub fn start_pos(&self) -> i64 {
        self.start_pos
    }

    /// Template holding the exclusive end coordinate.
    #[must_use]
    pub fn template_end_id(&self) -> i64 {
        self.template_end_id
    }

    /// Exclusive end position on the end template.
    #[must_use]
    pub fn end_pos(&self) -> i64 {
        self.end_pos
    }

    /// Padded start position, or [`NO_PADDING`].
    #[must_use]
    pub fn padded_start_pos(&self) -> i64 {
        self.padded_start_pos
    }

    /// Padded end position, or [`NO_PADDING`].
    #[must_use]
    pub fn padded_end_pos(&self) -> i64 {
        self.padded_end_pos
    }

    /// First coordinate of the padded span. Unpadded regions start at their start.
    #[must_use]
    pub fn padded_start(&self) -> (i64, i64) {
        if self.padded_start_pos == NO_PADDING {
            (self.template_start_id, self.start_pos)
        } else {
            (self.template_start_id, self.padded_start_pos)
        }
    }

    /// Exclusive end coordinate of the padded span.
    #[must_use]
    pub fn padded_end(&self) -> (i64, i64) {
        if self.padded_end_pos == NO_PADDING {
            (self.template_end_id, self.end_pos)
        } else {
            (self.template_end_id, self.padded_end_pos)
        }
    }

    /// Whether `(template_id, position)` lies inside the unpadded span.
    #[must_use]
    pub fn contains(&self, template_id: i64, position: i64) -> bool {
        if self.is_none() {
            return true;
        }
        let coord = (template_id, position);
        coord >= (self.template_start_id, self.start_pos)
            && coord < (self.template_end_id, self.end_pos)
    }

    /// Whether `(template_id, position)` lies inside the padded span.
    #[must_use]
    pub fn contains_padded(&self, template_id: i64, position: i64) -> bool {
        if self.is_none() {
            return true;
        }
        let coord = (template_id, position);
        coord >= self.padded_start() && coord < self.padded_end()
    }

    /// Splits the reference into at most `chunks` regions of equal length.
    ///
    /// Unpadded spans are disjoint and together cover every position of every
    /// template; a span may cross template boundaries. Padding is applied on
    /// both sides and clamped to the start and end templates.
    ///
    /// # Errors
    /// Returns an error if `chunks` is zero, a length is negative, or the
    /// reference is empty.
    pub fn partition(template_lengths: &[i64], chunks: usize, padding: i64) -> Result<Vec<Region>> {
        if chunks == 0 {
            return Err(MapMergeError::InvalidParameter {
                parameter: "chunks".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if padding < 0 || template_lengths.iter().any(|&l| l < 0) {
            return Err(MapMergeError::InvalidParameter {
                parameter: "template_lengths".to_string(),
                reason: "lengths and padding must be non-negative".to_string(),
            });
        }
        let total: i64 = template_lengths.iter().sum();
        if total == 0 {
            return Err(MapMergeError::InvalidParameter {
                parameter: "template_lengths".to_string(),
                reason: "reference is empty".to_string(),
            });
        }

        let chunk_size = (total + chunks as i64 - 1) / chunks as i64;
        let mut regions = Vec::with_capacity(chunks);
        let mut start = 0;
        while start < total {
            let end = (start + chunk_size).min(total);
            let (start_tid, start_pos) = locate(template_lengths, start);
            let (end_tid, last_pos) = locate(template_lengths, end - 1);
            let end_pos = last_pos + 1;

            let padded_start = (start_pos - padding).max(0);
            let padded_end = (end_pos + padding).min(template_lengths[end_tid as usize]);
            regions.push(
                Region::new(start_tid, start_pos, end_tid, end_pos)?
                    .with_padding(padded_start, padded_end)?,
            );
            start = end;
        }
        Ok(regions)
    }
}

/// Maps a global offset to `(template_id, position)`, skipping empty templates.
fn locate(template_lengths: &[i64], mut offset: i64) -> (i64, i64) {
    for (tid, &len) in template_lengths.iter().enumerate() {
        if offset < len {
            return (tid as i64, offset);
        }
        offset -= len;
    }
    // Only reached for offsets past the end, which callers never pass.
    let last = template_lengths.len().saturating_sub(1);
    (last as i64, template_lengths.get(last).copied().unwrap_or(0))
}

/// Padding needed so a worker can mate every hit whose fragment starts in its region.
#[must_use]
pub fn thread_padding(max_fragment_length: i32, read_length: i32) -> i64 {
    i64::from(max_fragment_length.max(read_length).max(0))
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("<NONE>");
        }
        write!(
            f,
            "{}:{}-{}:{}",
            self.template_start_id, self.start_pos, self.template_end_id, self.end_pos
        )?;
        if self.padded_start_pos != NO_PADDING || self.padded_end_pos != NO_PADDING {
            write!(f, " (padded {}..{})", self.padded_start_pos, self.padded_end_pos)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_none_contains_everything() {
        assert!(Region::NONE.is_none());
        assert!(Region::NONE.contains(0, 0));
        assert!(Region::NONE.contains(1_000, 123_456));
        assert!(Region::NONE.contains_padded(7, 7));
        assert_eq!(Region::NONE.to_string(), "<NONE>");
    }

    #[test]
    fn test_new_rejects_start_after_end() {
        assert!(Region::new(0, 10, 0, 5).is_err());
        assert!(Region::new(1, 0, 0, 50).is_err());
        assert!(Region::new(0, 5, 0, 5).is_ok());
        assert!(Region::new(0, 40, 1, 3).is_ok());
    }

    #[test]
    fn test_with_padding_must_enclose() {
        let region = Region::new(0, 10, 0, 20).unwrap();
        assert!(region.with_padding(5, 25).is_ok());
        assert!(region.with_padding(12, 25).is_err());
        assert!(region.with_padding(5, 15).is_err());
        assert!(region.with_padding(NO_PADDING, NO_PADDING).is_ok());
    }

    #[rstest]
    #[case(0, 9, false)]
    #[case(0, 10, true)]
    #[case(0, 19, true)]
    #[case(0, 20, false)]
    #[case(1, 10, false)]
    fn test_contains(#[case] tid: i64, #[case] pos: i64, #[case] expected: bool) {
        let region = Region::new(0, 10, 0, 20).unwrap();
        assert_eq!(region.contains(tid, pos), expected);
    }

    #[test]
    fn test_contains_padded() {
        let region = Region::new(0, 10, 0, 20).unwrap().with_padding(5, 25).unwrap();
        assert!(region.contains_padded(0, 5));
        assert!(!region.contains(0, 5));
        assert!(region.contains_padded(0, 24));
        assert!(!region.contains_padded(0, 25));
        assert_eq!(region.padded_start(), (0, 5));
    }

    #[test]
    fn test_partition_quarters() {
        let regions = Region::partition(&[50], 4, 0).unwrap();
        let spans: Vec<_> = regions.iter().map(|r| (r.start_pos(), r.end_pos())).collect();
        assert_eq!(spans, vec![(0, 13), (13, 26), (26, 39), (39, 50)]);
    }

    #[test]
    fn test_partition_crosses_templates_and_clamps_padding() {
        let regions = Region::partition(&[30, 30], 3, 5).unwrap();
        assert_eq!(regions.len(), 3);
        // Second region covers 0:20..1:10.
        let middle = regions[1];
        assert_eq!((middle.template_start_id(), middle.start_pos()), (0, 20));
        assert_eq!((middle.template_end_id(), middle.end_pos()), (1, 10));
        assert_eq!(middle.padded_start_pos(), 15);
        assert_eq!(middle.padded_end_pos(), 15);
        // Padding clamped at template edges.
        assert_eq!(regions[0].padded_start_pos(), 0);
        assert_eq!(regions[2].padded_end_pos(), 30);
    }

    #[test]
    fn test_partition_more_chunks_than_bases() {
        let regions = Region::partition(&[3], 8, 0).unwrap();
        assert_eq!(regions.len(), 3);
    }

    #[test]
    fn test_partition_errors() {
        assert!(Region::partition(&[], 2, 0).is_err());
        assert!(Region::partition(&[0, 0], 2, 0).is_err());
        assert!(Region::partition(&[10], 0, 0).is_err());
        assert!(Region::partition(&[10], 2, -1).is_err());
    }

    #[test]
    fn test_thread_padding() {
        assert_eq!(thread_padding(500, 100), 500);
        assert_eq!(thread_padding(50, 100), 100);
    }

    proptest! {
        #[test]
        fn prop_partition_is_disjoint_and_exhaustive(
            lengths in prop::collection::vec(0i64..200, 1..6),
            chunks in 1usize..10,
        ) {
            prop_assume!(lengths.iter().sum::<i64>() > 0);
            let regions = Region::partition(&lengths, chunks, 0).unwrap();
            for (tid, &len) in lengths.iter().enumerate() {
                for pos in 0..len {
                    let owners = regions.iter().filter(|r| r.contains(tid as i64, pos)).count();
                    prop_assert_eq!(owners, 1);
                }
            }
            for pair in regions.windows(2) {
                prop_assert!(pair[0].padded_start() <= pair[1].padded_start());
            }
        }
    }
}
