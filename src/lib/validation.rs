//! Input validation utilities
//!
//! Common validation functions for command-line parameters, pairing configuration
//! and file paths with consistent error messages. All functions return the
//! structured errors from [`crate::errors`].

use crate::errors::{MapMergeError, Result};
use std::fmt::Display;
use std::path::Path;

/// Validate that a file exists
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use mapmerge_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/hits.tsv", "Input hits");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(MapMergeError::InvalidParameter {
            parameter: description.to_string(),
            reason: format!("File does not exist: {}", path_ref.display()),
        });
    }
    Ok(())
}

/// Validate that a value is strictly positive
///
/// # Errors
/// Returns an error if the value is zero or negative
///
/// # Example
/// ```
/// use mapmerge_lib::validation::validate_positive;
///
/// assert!(validate_positive(5, "top-n").is_ok());
/// assert!(validate_positive(0, "top-n").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(MapMergeError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Validate fragment length bounds: both non-negative and `min <= max`.
///
/// # Errors
/// Returns an error if the bounds are negative or not monotonic
pub fn validate_fragment_lengths(min: i32, max: i32) -> Result<()> {
    if min < 0 {
        return Err(MapMergeError::InvalidParameter {
            parameter: "min-fragment-length".to_string(),
            reason: format!("Must be >= 0, got: {min}"),
        });
    }
    if max < min {
        return Err(MapMergeError::InvalidFragmentLength { min, max });
    }
    Ok(())
}

/// Validate a worker thread count.
///
/// # Errors
/// Returns an error if `threads` is zero
pub fn validate_threads(threads: usize) -> Result<()> {
    if threads == 0 {
        return Err(MapMergeError::InvalidParameter {
            parameter: "threads".to_string(),
            reason: "Must use at least one thread".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_file_exists_valid() {
        let temp_file = NamedTempFile::new().unwrap();
        validate_file_exists(temp_file.path(), "Test file").unwrap();
    }

    #[test]
    fn test_validate_file_exists_invalid() {
        let result = validate_file_exists("/nonexistent/hits.tsv", "Input hits");
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Input hits"));
        assert!(err_msg.contains("does not exist"));
    }

    #[rstest]
    #[case(1, true)]
    #[case(100, true)]
    #[case(0, false)]
    #[case(-3, false)]
    fn test_validate_positive(#[case] value: i32, #[case] should_succeed: bool) {
        assert_eq!(validate_positive(value, "n").is_ok(), should_succeed);
    }

    #[rstest]
    #[case(0, 0, true, "zero-width window")]
    #[case(100, 500, true, "typical window")]
    #[case(500, 100, false, "inverted bounds")]
    #[case(-1, 100, false, "negative minimum")]
    fn test_validate_fragment_lengths(
        #[case] min: i32,
        #[case] max: i32,
        #[case] should_succeed: bool,
        #[case] description: &str,
    ) {
        assert_eq!(validate_fragment_lengths(min, max).is_ok(), should_succeed, "{description}");
    }

    #[test]
    fn test_inverted_fragment_lengths_error_kind() {
        let err = validate_fragment_lengths(500, 100).unwrap_err();
        assert!(matches!(err, MapMergeError::InvalidFragmentLength { min: 500, max: 100 }));
    }

    #[test]
    fn test_validate_threads() {
        assert!(validate_threads(1).is_ok());
        assert!(validate_threads(0).is_err());
    }
}
