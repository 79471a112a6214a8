//! Sampler configuration.

use burn::config::Config;

use crate::error::{self, CoreError};

/// Configuration shared by the bilinear and trilinear samplers.
#[derive(Config, Debug, PartialEq)]
pub struct SamplerConfig {
    /// Interpolation order. Only 1 (bilinear/trilinear) is implemented.
    #[config(default = 1)]
    pub order: usize,
    /// Additive guard on the perspective divisor.
    #[config(default = 1e-10)]
    pub epsilon: f64,
    /// Zero trilinear samples whose coordinate fell outside the volume
    /// instead of silently clamping them.
    #[config(default = false)]
    pub mask_volume_bounds: bool,
}

impl SamplerConfig {
    /// Check that the requested settings are supported.
    pub fn validate(&self) -> error::Result<()> {
        if self.order != 1 {
            tracing::warn!("rejecting interpolation order {}", self.order);
            return Err(CoreError::UnsupportedOrder(self.order));
        }
        if !(self.epsilon >= 0.0) {
            return Err(CoreError::invalid_configuration(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}
