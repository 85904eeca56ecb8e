//! Error types for the allocation crate.

use thiserror::Error;

/// Errors returned by allocation and selection helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// Two parallel inputs had different lengths.
    #[error("Length mismatch: {left} entries vs {right} entries")]
    LengthMismatch { left: usize, right: usize },

    /// Targets of a non-empty set do not add up to 100%.
    #[error("Target allocations sum to {total}, expected 1000000")]
    InvalidTargetSum { total: u64 },

    /// A single target exceeds 100%.
    #[error("Target allocation {bps} exceeds 1000000")]
    TargetOutOfRange { bps: u32 },

    /// Selection was requested over an empty candidate set.
    #[error("No candidates to select from")]
    NoCandidates,
}

/// Result type alias for allocation operations.
pub type Result<T> = std::result::Result<T, AllocationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_length_mismatch() {
        let error = AllocationError::LengthMismatch { left: 2, right: 3 };
        assert_eq!(error.to_string(), "Length mismatch: 2 entries vs 3 entries");
    }

    #[test]
    fn test_error_display_invalid_target_sum() {
        let error = AllocationError::InvalidTargetSum { total: 999_999 };
        assert_eq!(
            error.to_string(),
            "Target allocations sum to 999999, expected 1000000"
        );
    }
}
