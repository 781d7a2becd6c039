use thiserror::Error;

/// Error types for the pose optimizer.
///
/// These are precondition failures detected before any iteration runs. The outcome of a
/// solve that did run (converged, out of iterations, diverged) is reported through
/// [`crate::TerminationReason`] instead.
#[derive(Debug, Error, PartialEq)]
pub enum PoseOptimizerError {
    /// Invalid input data - mismatched array lengths with descriptive labels.
    #[error("Mismatched array lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedArrayLengths {
        /// Label for the left-hand slice.
        left_name: &'static str,
        /// Length of the left-hand slice.
        left_len: usize,
        /// Label for the right-hand slice.
        right_name: &'static str,
        /// Length of the right-hand slice.
        right_len: usize,
    },

    /// An input value is NaN or infinite.
    #[error("Non-finite value in {name} at index {index}")]
    NonFiniteInput {
        /// Label of the offending slice.
        name: &'static str,
        /// Index of the first non-finite element.
        index: usize,
    },

    /// A threshold is negative or NaN.
    #[error("Invalid threshold {name}: {value} (must be non-negative)")]
    InvalidThreshold {
        /// Name of the offending option.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The camera intrinsics cannot be used for projection.
    #[error("Invalid camera intrinsics: {0}")]
    InvalidIntrinsics(String),

    /// The damping schedule is inconsistent.
    #[error("Invalid damping options: {0}")]
    InvalidDamping(String),
}
