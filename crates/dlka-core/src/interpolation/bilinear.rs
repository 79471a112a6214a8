//! Bilinear sampling of channel-last 2D images.
//!
//! Implements the differentiable sampling kernel of spatial transformer
//! networks. Coordinates are normalized so that `(-1, -1)` addresses the
//! top-left pixel and `(1, 1)` the bottom-right one.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::config::SamplerConfig;
use crate::error::{CoreError, Result};

/// Bilinear sampler with a validity mask.
#[derive(Debug, Clone)]
pub struct BilinearSampler {
    config: SamplerConfig,
}

impl BilinearSampler {
    /// Create a sampler, rejecting unsupported configurations.
    pub fn try_new(config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Sampler configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample `source` at normalized coordinates.
    ///
    /// # Arguments
    /// * `source` - Images `[B, H, W, C]`
    /// * `x` - Normalized x coordinates in `[-1, 1]`, shape `[B, Ho, Wo, 1]`
    /// * `y` - Normalized y coordinates in `[-1, 1]`, shape `[B, Ho, Wo, 1]`
    ///
    /// # Returns
    /// Sampled images `[B, Ho, Wo, C]` and a `{0, 1}` mask `[B, Ho, Wo, 1]`.
    /// A location is valid when all four neighbours lie inside the image.
    pub fn sample<B: Backend>(
        &self,
        source: Tensor<B, 4>,
        x: Tensor<B, 4>,
        y: Tensor<B, 4>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>)> {
        let [b, h, w, c] = source.dims();
        let [bx, ho, wo, cx] = x.dims();
        if h == 0 || w == 0 {
            return Err(CoreError::dimension_mismatch(format!(
                "cannot sample an empty image of size {}x{}",
                h, w
            )));
        }
        if bx != b || cx != 1 {
            return Err(CoreError::shape_mismatch([b, ho, wo, 1], x.dims()));
        }
        if y.dims() != x.dims() {
            return Err(CoreError::shape_mismatch(x.dims(), y.dims()));
        }

        let n = ho * wo;
        let max_x = (w - 1) as f32;
        let max_y = (h - 1) as f32;

        // Scale from [-1, 1] to [0, W - 1] and [0, H - 1].
        let x = (x.reshape([b, n]) + 1.0) * (max_x / 2.0);
        let y = (y.reshape([b, n]) + 1.0) * (max_y / 2.0);

        let x0 = x.clone().floor();
        let y0 = y.clone().floor();
        let x1 = x0.clone() + 1.0;
        let y1 = y0.clone() + 1.0;

        let mask = x0.clone().greater_equal_elem(0.0).float()
            * x1.clone().lower_equal_elem(max_x).float()
            * y0.clone().greater_equal_elem(0.0).float()
            * y1.clone().lower_equal_elem(max_y).float();

        let wx = x - x0.clone();
        let wy = y - y0.clone();

        let x0_i = x0.clamp(0.0, max_x).int();
        let x1_i = x1.clamp(0.0, max_x).int();
        let y0_i = y0.clamp(0.0, max_y).int();
        let y1_i = y1.clamp(0.0, max_y).int();

        let stride_y = w as i32;
        let flat = source.reshape([b, h * w, c]);

        let v00 = Self::gather(&flat, &x0_i, &y0_i, stride_y, c);
        let v01 = Self::gather(&flat, &x0_i, &y1_i, stride_y, c);
        let v10 = Self::gather(&flat, &x1_i, &y0_i, stride_y, c);
        let v11 = Self::gather(&flat, &x1_i, &y1_i, stride_y, c);

        let wx = wx.reshape([b, n, 1]);
        let wy = wy.reshape([b, n, 1]);
        let one_minus_wx = wx.clone().neg().add_scalar(1.0);
        let one_minus_wy = wy.clone().neg().add_scalar(1.0);

        // Interpolate along x, then y.
        let c0 = v00 * one_minus_wx.clone() + v10 * wx.clone();
        let c1 = v01 * one_minus_wx + v11 * wx;
        let output = c0 * one_minus_wy + c1 * wy;

        Ok((output.reshape([b, ho, wo, c]), mask.reshape([b, ho, wo, 1])))
    }

    /// Sample with a packed coordinate tensor `[B, Ho, Wo, 2]` holding
    /// normalized `(x, y)` pairs.
    pub fn sample_grid<B: Backend>(
        &self,
        source: Tensor<B, 4>,
        coords: Tensor<B, 4>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>)> {
        let dims = coords.dims();
        if dims[3] != 2 {
            return Err(CoreError::shape_mismatch([dims[0], dims[1], dims[2], 2], dims));
        }
        let x = coords.clone().narrow(3, 0, 1);
        let y = coords.narrow(3, 1, 1);
        self.sample(source, x, y)
    }

    #[inline]
    fn gather<B: Backend>(
        flat: &Tensor<B, 3>,
        xi: &Tensor<B, 2, Int>,
        yi: &Tensor<B, 2, Int>,
        stride_y: i32,
        channels: usize,
    ) -> Tensor<B, 3> {
        let [b, n] = xi.dims();
        let idx = yi.clone() * stride_y + xi.clone();
        let idx = idx.reshape([b, n, 1]).repeat(&[1, 1, channels]);
        flat.clone().gather(1, idx)
    }
}

impl Default for BilinearSampler {
    fn default() -> Self {
        Self {
            config: SamplerConfig::new(),
        }
    }
}

/// Convert absolute pixel coordinates to the normalized `[-1, 1]` range
/// using `coord / (dim - 1) * 2 - 1`.
pub fn normalize_coords<B: Backend, const D: usize>(coords: Tensor<B, D>, dim: usize) -> Tensor<B, D> {
    coords / (dim as f32 - 1.0) * 2.0 - 1.0
}
