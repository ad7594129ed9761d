//! Custom error types for mapmerge operations.

use thiserror::Error;

/// Result type alias for mapmerge operations
pub type Result<T> = std::result::Result<T, MapMergeError>;

/// Error type for mapmerge operations
#[derive(Error, Debug)]
pub enum MapMergeError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Region bounds are inconsistent
    #[error("Invalid region {region}: {reason}")]
    InvalidRegion {
        /// Display form of the offending region
        region: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Fragment length bounds are not monotonic
    #[error("Invalid fragment length bounds: min {min} must not exceed max {max}")]
    InvalidFragmentLength {
        /// Minimum fragment length
        min: i32,
        /// Maximum fragment length
        max: i32,
    },

    /// An operation was called in the wrong lifecycle state
    #[error("Cannot {operation} while processor is {state}")]
    InvalidState {
        /// The operation attempted
        operation: &'static str,
        /// The state the processor was in
        state: String,
    },

    /// A worker clone was dropped without finishing its region
    #[error("{count} worker(s) were dropped without calling thread_finish")]
    WorkerAbandoned {
        /// Number of abandoned workers
        count: usize,
    },

    /// A thread-local temp stream could not be decoded
    #[error("Corrupt temp stream '{path}': {reason}")]
    TempFile {
        /// Path to the temp file
        path: String,
        /// Explanation of the problem
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter() {
        let error = MapMergeError::InvalidParameter {
            parameter: "threads".to_string(),
            reason: "must be >= 1".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Invalid parameter 'threads'"));
        assert!(msg.contains("must be >= 1"));
    }

    #[test]
    fn test_invalid_fragment_length() {
        let error = MapMergeError::InvalidFragmentLength { min: 500, max: 100 };
        let msg = format!("{error}");
        assert!(msg.contains("min 500"));
        assert!(msg.contains("max 100"));
    }

    #[test]
    fn test_invalid_state() {
        let error =
            MapMergeError::InvalidState { operation: "process", state: "thread-finished".into() };
        assert_eq!(format!("{error}"), "Cannot process while processor is thread-finished");
    }

    #[test]
    fn test_worker_abandoned() {
        let error = MapMergeError::WorkerAbandoned { count: 2 };
        assert!(format!("{error}").contains("2 worker(s)"));
    }

    #[test]
    fn test_temp_file() {
        let error = MapMergeError::TempFile {
            path: "/tmp/region_0000.bin".to_string(),
            reason: "truncated record".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Corrupt temp stream"));
        assert!(msg.contains("truncated record"));
    }
}
