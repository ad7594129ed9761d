//! CLI command implementations for mapmerge.
//!
//! # Commands
//! - [`merge`] - Merge search hits into mated, unmated and unmapped outputs
//! - [`regions`] - Print the region partition a multi-threaded merge would use

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::must_use_candidate,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod merge;
pub mod regions;
