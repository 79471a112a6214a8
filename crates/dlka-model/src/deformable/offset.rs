//! Offset-predicting convolution and the resampler that owns its grid cache.

use burn::module::Ignored;
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::nn::{Initializer, PaddingConfig3d};
use burn::prelude::*;
use dlka_core::interpolation::SamplerConfig;

use super::grid_cache::{GridCache, GridKey};
use super::map_offsets;
use crate::error::{self, ModelError};

/// Configuration for [`ConvOffset3d`].
#[derive(Config, Debug, PartialEq)]
pub struct ConvOffset3dConfig {
    /// Channels of the input feature map.
    pub channels: usize,
    /// Standard deviation of the zero-mean normal weight initialization.
    #[config(default = "0.01")]
    pub init_std: f64,
    /// Trilinear sampler settings.
    #[config(default = "SamplerConfig::new()")]
    pub sampler: SamplerConfig,
}

/// Learns per-channel 3D offsets and returns the deformed feature map.
///
/// Offsets come from a bias-free `3x3x3` convolution producing `3C`
/// channels. The deformed map is not convolved further.
#[derive(Module, Debug)]
pub struct ConvOffset3d<B: Backend> {
    /// Offset predictor `C -> 3C`.
    pub offset_conv: Conv3d<B>,
    sampler: Ignored<SamplerConfig>,
}

impl<B: Backend> ConvOffset3d<B> {
    /// Create a new offset convolution.
    ///
    /// # Arguments
    /// * `config` - Layer configuration
    /// * `device` - Device to create the weights on
    pub fn new(config: &ConvOffset3dConfig, device: &B::Device) -> error::Result<Self> {
        if config.channels == 0 {
            return Err(ModelError::invalid_configuration("offset convolution needs at least one channel"));
        }
        if !(config.init_std >= 0.0) {
            return Err(ModelError::invalid_configuration(format!(
                "init_std must be non-negative, got {}",
                config.init_std
            )));
        }
        config.sampler.validate()?;

        let offset_conv = Conv3dConfig::new([config.channels, config.channels * 3], [3, 3, 3])
            .with_stride([1, 1, 1])
            .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
            .with_bias(false)
            .with_initializer(Initializer::Normal {
                mean: 0.0,
                std: config.init_std,
            })
            .init(device);

        Ok(Self {
            offset_conv,
            sampler: Ignored(config.sampler.clone()),
        })
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// * `x` - Feature map `[B, C, D, H, W]`
    /// * `cache` - Base grid cache, keyed on the merged `B*C` batch
    ///
    /// # Returns
    /// Deformed feature map `[B, C, D, H, W]`
    pub fn forward(&self, x: Tensor<B, 5>, cache: &mut GridCache<B>) -> error::Result<Tensor<B, 5>> {
        let [b, c, d, h, w] = x.dims();

        // (b, 3c, d, h, w) -> (b*c, d, h, w, 3)
        let offsets = self.offset_conv.forward(x.clone()).reshape([b * c, d, h, w, 3]);
        // (b, c, d, h, w) -> (b*c, d, h, w)
        let x_flat = x.clone().reshape([b * c, d, h, w]);

        let grid = cache.get_or_generate(GridKey {
            batch: b * c,
            dims: [d, h, w],
            dtype: x.dtype(),
            device: x.device(),
        });

        let deformed = map_offsets(x_flat, offsets, Some(grid), &self.sampler)?;
        Ok(deformed.reshape([b, c, d, h, w]))
    }
}

/// A [`ConvOffset3d`] paired with the grid cache it reads from.
#[derive(Debug)]
pub struct DeformableResampler<B: Backend> {
    conv: ConvOffset3d<B>,
    cache: GridCache<B>,
}

impl<B: Backend> DeformableResampler<B> {
    pub fn new(config: &ConvOffset3dConfig, device: &B::Device) -> error::Result<Self> {
        Ok(Self::from_module(ConvOffset3d::new(config, device)?))
    }

    /// Wrap an existing (e.g. trained) offset convolution with an empty cache.
    pub fn from_module(conv: ConvOffset3d<B>) -> Self {
        Self {
            conv,
            cache: GridCache::new(),
        }
    }

    /// Deform `x` using the owned cache.
    pub fn forward(&mut self, x: Tensor<B, 5>) -> error::Result<Tensor<B, 5>> {
        self.conv.forward(x, &mut self.cache)
    }

    pub fn module(&self) -> &ConvOffset3d<B> {
        &self.conv
    }

    pub fn cache(&self) -> &GridCache<B> {
        &self.cache
    }

    /// Drop the cached grid; the next forward pass regenerates it.
    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    pub fn into_module(self) -> ConvOffset3d<B> {
        self.conv
    }
}
