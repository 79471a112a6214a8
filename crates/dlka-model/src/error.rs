//! Error types for model layers, losses and metrics.

use dlka_core::CoreError;
use thiserror::Error;

/// Main error type for model operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Failure inside the sampling core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Tensor shapes do not agree.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Invalid layer or loss configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

impl ModelError {
    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: impl Into<Vec<usize>>, actual: impl Into<Vec<usize>>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
