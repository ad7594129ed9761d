//! Integration tests for mapmerge.
//!
//! These tests drive the region output processor with several workers and the
//! `mapmerge` binary end to end, checking that the merged output does not
//! depend on how the reference was split.

mod helpers;
mod test_merge_command;
mod test_parallel_equivalence;
mod test_retention;
