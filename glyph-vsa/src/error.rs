//! Error types for glyph-vsa.

use thiserror::Error;

/// Result type alias for glyph-vsa operations.
pub type Result<T> = std::result::Result<T, VsaError>;

/// Errors that can occur during hypervector operations.
#[derive(Debug, Error)]
pub enum VsaError {
    /// Invalid value for ternary conversion.
    #[error("invalid ternary value: {0} (expected -1, 0, or +1)")]
    InvalidValue(i32),

    /// Dimension mismatch between two hypervectors.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Plane word count does not fit the dimension.
    #[error("planes of {plus_words}/{minus_words} words, expected {expected_words} for {dim} components")]
    PlaneLength {
        /// Words a `dim`-component vector needs.
        expected_words: usize,
        /// Words in the plus plane.
        plus_words: usize,
        /// Words in the minus plane.
        minus_words: usize,
        /// Requested dimension.
        dim: usize,
    },

    /// A component is set in both planes.
    #[error("component {position} is set in both the plus and minus plane")]
    PlaneOverlap {
        /// First overlapping component.
        position: usize,
    },

    /// A bit past the last component is set.
    #[error("padding bits past component {dim} are set")]
    PaddingBits {
        /// Vector dimension.
        dim: usize,
    },

    /// Operation needs at least one input vector.
    #[error("operation not supported on an empty vector list")]
    EmptyInput,

    /// A level chain would flip more positions than the vector has.
    #[error("level chain needs {required} flipped positions but dimension is {dimension}")]
    LevelOverflow {
        /// Total positions the last level would flip.
        required: usize,
        /// Vector dimension.
        dimension: usize,
    },

    /// Requested level past the end of a level chain.
    #[error("level {level} out of range for a chain of {levels} levels")]
    LevelOutOfRange {
        /// Requested level.
        level: usize,
        /// Number of levels in the chain.
        levels: usize,
    },
}
