//! Offset-driven deformable resampling of 3D feature maps.
//!
//! A convolution predicts one 3D offset per channel and voxel. The offsets
//! are added to the identity voxel grid and the feature map is resampled
//! trilinearly at the displaced positions. The deformed map is returned
//! as-is; any subsequent feature convolution is composed by the caller.

pub mod grid_cache;
pub mod offset;

pub use grid_cache::{GridCache, GridKey};
pub use offset::{ConvOffset3d, ConvOffset3dConfig, DeformableResampler};

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use dlka_core::grid::voxel_grid;
use dlka_core::interpolation::{SamplerConfig, TrilinearSampler};

use crate::error::{ModelError, Result};

/// Resample `input` at the identity grid displaced by `offsets`.
///
/// # Arguments
/// * `input` - Feature volumes `[N, D, H, W]`
/// * `offsets` - Per-voxel `(d, h, w)` displacements `[N, D, H, W, 3]`
/// * `grid` - Optional precomputed base grid `[N, D*H*W, 3]`
/// * `config` - Sampler settings
///
/// # Returns
/// Deformed volumes `[N, D, H, W]`
pub fn map_offsets<B: Backend>(
    input: Tensor<B, 4>,
    offsets: Tensor<B, 5>,
    grid: Option<Tensor<B, 3>>,
    config: &SamplerConfig,
) -> Result<Tensor<B, 4>> {
    let [n, d, h, w] = input.dims();
    if offsets.dims() != [n, d, h, w, 3] {
        return Err(ModelError::shape_mismatch([n, d, h, w, 3], offsets.dims()));
    }
    let p = d * h * w;

    let grid = match grid {
        Some(grid) => {
            if grid.dims() != [n, p, 3] {
                return Err(ModelError::shape_mismatch([n, p, 3], grid.dims()));
            }
            grid
        }
        None => voxel_grid::<B>(n, [d, h, w], &input.device()),
    };

    let coords = grid + offsets.reshape([n, p, 3]);
    let sampler = TrilinearSampler::try_new(config.clone())?;
    let mapped = sampler.sample(input, coords)?;
    Ok(mapped.reshape([n, d, h, w]))
}
