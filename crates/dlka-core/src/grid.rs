//! Regular coordinate grids used as sampling bases.
//!
//! Grids are produced on the host in a fixed iteration order and uploaded to
//! the requested device, so two calls with the same arguments yield
//! bit-identical tensors.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

/// Generate the absolute homogeneous pixel grid of a 2D image.
///
/// Returns a tensor of shape `[3, H*W]`: row 0 holds x in `0..W`, row 1
/// holds y in `0..H` and row 2 is constant 1. Columns follow row-major
/// flattening of an `[H, W]` image (x varies fastest).
///
/// # Arguments
/// * `shape` - The image shape `[H, W]`
/// * `device` - The device to create the tensor on
pub fn pixel_grid<B: Backend>(shape: [usize; 2], device: &B::Device) -> Tensor<B, 2> {
    let [h, w] = shape;
    let total = h * w;

    let mut grid = vec![0.0f32; 3 * total];
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            grid[i] = x as f32;
            grid[total + i] = y as f32;
            grid[2 * total + i] = 1.0;
        }
    }

    Tensor::<B, 1>::from_data(TensorData::new(grid, Shape::new([3 * total])), device)
        .reshape([3, total])
}

/// Generate the voxel index grid of a 3D volume, tiled over a batch.
///
/// Returns a tensor of shape `[batch, D*H*W, 3]` whose last axis holds
/// `(d, h, w)` indices. Rows follow depth-major Cartesian order, matching the
/// row-major flattening of a `[D, H, W]` volume.
///
/// # Arguments
/// * `batch` - Number of copies along the leading axis
/// * `shape` - The volume shape `[D, H, W]`
/// * `device` - The device to create the tensor on
pub fn voxel_grid<B: Backend>(batch: usize, shape: [usize; 3], device: &B::Device) -> Tensor<B, 3> {
    let [d, h, w] = shape;
    let total = d * h * w;

    let mut grid = Vec::with_capacity(total * 3);
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                grid.push(z as f32);
                grid.push(y as f32);
                grid.push(x as f32);
            }
        }
    }

    Tensor::<B, 1>::from_data(TensorData::new(grid, Shape::new([total * 3])), device)
        .reshape([1, total, 3])
        .repeat(&[batch, 1, 1])
}
