//! Error types for training utilities.

use thiserror::Error;

/// Main error type for training utilities.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainError {
    /// Learning rate schedule parameters are inconsistent.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A meter received a key it was not initialized with.
    #[error("Unknown metric '{0}': keys are fixed by the first update")]
    UnknownMetric(String),

    /// A tensor with more than one element was used as a scalar.
    #[error("Expected a single-element tensor, got shape {0:?}")]
    NonScalarTensor(Vec<usize>),

    /// Tensor or window shape is unusable.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
}

/// Result type for training utilities.
pub type Result<T> = std::result::Result<T, TrainError>;

impl TrainError {
    /// Create an invalid schedule error.
    pub fn invalid_schedule(msg: impl Into<String>) -> Self {
        Self::InvalidSchedule(msg.into())
    }

    /// Create an unknown metric error.
    pub fn unknown_metric(name: impl Into<String>) -> Self {
        Self::UnknownMetric(name.into())
    }

    /// Create an invalid shape error.
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }
}
