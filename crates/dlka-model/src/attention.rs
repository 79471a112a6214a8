//! Volumetric attention blocks built on large and deformable kernels.
//!
//! # Architecture
//!```text
//! Input ──► proj_1 (1³) ──► GELU ──► LKA ──► proj_2 (1³) ──► (+) ──► Output
//!   │                                                          ▲
//!   └──────────────────────── shortcut ────────────────────────┘
//!
//! LKA: u ──► DW 5³ ──► DW 7³ (dilation 3) ──► 1³ ──► attn;  out = u * attn
//!```

use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::nn::{Gelu, PaddingConfig3d};
use burn::prelude::*;

use crate::deformable::{ConvOffset3d, ConvOffset3dConfig, GridCache};
use crate::error::{self, ModelError};

/// Configuration for [`DeformConv3d`].
#[derive(Config, Debug, PartialEq)]
pub struct DeformConv3dConfig {
    /// Input and output channels.
    pub channels: [usize; 2],
    /// Kernel size of the feature convolution.
    pub kernel_size: [usize; 3],
    /// Symmetric padding of the feature convolution.
    #[config(default = "1")]
    pub padding: usize,
    /// Offset convolution weight initialization.
    #[config(default = "0.01")]
    pub init_std: f64,
}

/// Deformable convolution: offset resampling followed by a regular convolution.
#[derive(Module, Debug)]
pub struct DeformConv3d<B: Backend> {
    pub offset: ConvOffset3d<B>,
    pub conv: Conv3d<B>,
}

impl<B: Backend> DeformConv3d<B> {
    pub fn new(config: &DeformConv3dConfig, device: &B::Device) -> error::Result<Self> {
        let [in_channels, out_channels] = config.channels;
        if out_channels == 0 {
            return Err(ModelError::invalid_configuration("deformable convolution needs output channels"));
        }
        let offset = ConvOffset3d::new(
            &ConvOffset3dConfig::new(in_channels).with_init_std(config.init_std),
            device,
        )?;
        let p = config.padding;
        let conv = Conv3dConfig::new(config.channels, config.kernel_size)
            .with_padding(PaddingConfig3d::Explicit(p, p, p))
            .init(device);

        Ok(Self { offset, conv })
    }

    /// Forward pass for `[B, C_in, D, H, W]` input.
    pub fn forward(&self, x: Tensor<B, 5>, cache: &mut GridCache<B>) -> error::Result<Tensor<B, 5>> {
        let deformed = self.offset.forward(x, cache)?;
        Ok(self.conv.forward(deformed))
    }
}

/// Large kernel attention gate over a 3D feature map.
#[derive(Module, Debug)]
pub struct Lka3d<B: Backend> {
    /// Depthwise `5x5x5` local context.
    pub conv0: Conv3d<B>,
    /// Depthwise dilated `7x7x7` long-range context.
    pub conv_spatial: Conv3d<B>,
    /// Pointwise channel mixing.
    pub conv1: Conv3d<B>,
}

impl<B: Backend> Lka3d<B> {
    pub fn new(dim: usize, device: &B::Device) -> Self {
        let conv0 = Conv3dConfig::new([dim, dim], [5, 5, 5])
            .with_padding(PaddingConfig3d::Explicit(2, 2, 2))
            .with_groups(dim)
            .init(device);
        let conv_spatial = Conv3dConfig::new([dim, dim], [7, 7, 7])
            .with_padding(PaddingConfig3d::Explicit(9, 9, 9))
            .with_dilation([3, 3, 3])
            .with_groups(dim)
            .init(device);
        let conv1 = Conv3dConfig::new([dim, dim], [1, 1, 1]).init(device);

        Self {
            conv0,
            conv_spatial,
            conv1,
        }
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let attn = self.conv0.forward(x.clone());
        let attn = self.conv_spatial.forward(attn);
        let attn = self.conv1.forward(attn);
        x * attn
    }
}

/// Configuration for [`LkaAttention3d`].
#[derive(Config, Debug, PartialEq)]
pub struct LkaAttention3dConfig {
    /// Channel dimension.
    pub dim: usize,
}

/// Residual attention block wrapping [`Lka3d`] between two projections.
#[derive(Module, Debug)]
pub struct LkaAttention3d<B: Backend> {
    pub proj_1: Conv3d<B>,
    act: Gelu,
    pub spatial_gating_unit: Lka3d<B>,
    pub proj_2: Conv3d<B>,
}

impl<B: Backend> LkaAttention3d<B> {
    pub fn new(config: &LkaAttention3dConfig, device: &B::Device) -> error::Result<Self> {
        let dim = config.dim;
        if dim == 0 {
            return Err(ModelError::invalid_configuration("attention dimension must be positive"));
        }
        Ok(Self {
            proj_1: Conv3dConfig::new([dim, dim], [1, 1, 1]).init(device),
            act: Gelu::new(),
            spatial_gating_unit: Lka3d::new(dim, device),
            proj_2: Conv3dConfig::new([dim, dim], [1, 1, 1]).init(device),
        })
    }

    /// Forward pass for `[B, C, D, H, W]` input; the shape is preserved.
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let shortcut = x.clone();
        let x = self.proj_1.forward(x);
        let x = self.act.forward(x);
        let x = self.spatial_gating_unit.forward(x);
        let x = self.proj_2.forward(x);
        x + shortcut
    }
}
