//! Error types for sampling and reprojection operations.
//!
//! Every failure in the core is a programming or shape error. Nothing is
//! retried; errors surface before any partial computation happens.

use thiserror::Error;

/// Main error type for core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Tensor shapes do not agree.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Dimension mismatch that cannot be expressed as a single expected shape.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Interpolation order other than linear was requested.
    #[error("Unsupported interpolation order {0}: only order 1 (linear) is implemented")]
    UnsupportedOrder(usize),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: impl Into<Vec<usize>>, actual: impl Into<Vec<usize>>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
