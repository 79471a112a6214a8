//! Trilinear sampling of batched volumes at absolute voxel coordinates.
//!
//! Corner naming follows the volume axes: left/right along depth,
//! top/bottom along height, anterior/posterior along width.
//!
//! ```text
//!     ltp------rtp
//!     |\        |\
//!     | lta------rta
//!     | |       | |
//!     lbp------rbp|
//!      \|        \|
//!       lba------rba
//! ```

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::config::SamplerConfig;
use crate::error::{CoreError, Result};

/// Trilinear sampler over `[N, D, H, W]` volumes.
///
/// Coordinates outside the volume are clamped onto its border. When
/// [`SamplerConfig::mask_volume_bounds`] is set, [`TrilinearSampler::sample`]
/// zeroes those samples instead.
#[derive(Debug, Clone)]
pub struct TrilinearSampler {
    config: SamplerConfig,
}

impl TrilinearSampler {
    /// Create a sampler, rejecting unsupported configurations.
    pub fn try_new(config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Sampler configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample `source` at absolute coordinates.
    ///
    /// # Arguments
    /// * `source` - Volumes `[N, D, H, W]`
    /// * `coords` - Coordinates `[N, P, 3]` holding `(d, h, w)` voxel indices
    ///
    /// # Returns
    /// Sampled values `[N, P]`
    pub fn sample<B: Backend>(&self, source: Tensor<B, 4>, coords: Tensor<B, 3>) -> Result<Tensor<B, 2>> {
        if self.config.mask_volume_bounds {
            let (values, mask) = self.sample_with_mask(source, coords)?;
            return Ok(values * mask);
        }
        Self::check_shapes(&source, &coords)?;
        Ok(Self::interpolate(source, coords))
    }

    /// Sample `source` and report which coordinates were inside the volume
    /// before clamping.
    ///
    /// # Returns
    /// Sampled values `[N, P]` and a `{0, 1}` mask `[N, P]`
    pub fn sample_with_mask<B: Backend>(
        &self,
        source: Tensor<B, 4>,
        coords: Tensor<B, 3>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        Self::check_shapes(&source, &coords)?;
        let [n, d, h, w] = source.dims();
        let p = coords.dims()[1];

        let mut mask = Tensor::<B, 2>::ones([n, p], &coords.device());
        for (axis, size) in [d, h, w].into_iter().enumerate() {
            let c = coords.clone().narrow(2, axis, 1).reshape([n, p]);
            mask = mask
                * c.clone().greater_equal_elem(0.0).float()
                * c.lower_equal_elem((size - 1) as f32).float();
        }

        Ok((Self::interpolate(source, coords), mask))
    }

    fn check_shapes<B: Backend>(source: &Tensor<B, 4>, coords: &Tensor<B, 3>) -> Result<()> {
        let [n, d, h, w] = source.dims();
        let [nc, p, k] = coords.dims();
        if d == 0 || h == 0 || w == 0 {
            return Err(CoreError::dimension_mismatch(format!(
                "cannot sample an empty volume of size {}x{}x{}",
                d, h, w
            )));
        }
        if nc != n || k != 3 {
            return Err(CoreError::shape_mismatch([n, p, 3], [nc, p, k]));
        }
        Ok(())
    }

    fn interpolate<B: Backend>(source: Tensor<B, 4>, coords: Tensor<B, 3>) -> Tensor<B, 2> {
        let [n, d, h, w] = source.dims();
        let p = coords.dims()[1];

        let max_d = (d - 1) as f32;
        let max_h = (h - 1) as f32;
        let max_w = (w - 1) as f32;

        let cd = coords.clone().narrow(2, 0, 1).reshape([n, p]).clamp(0.0, max_d);
        let ch = coords.clone().narrow(2, 1, 1).reshape([n, p]).clamp(0.0, max_h);
        let cw = coords.narrow(2, 2, 1).reshape([n, p]).clamp(0.0, max_w);

        let d0 = cd.clone().floor();
        let h0 = ch.clone().floor();
        let w0 = cw.clone().floor();

        // Fractional offsets from the lower corner.
        let fd = cd - d0.clone();
        let fh = ch - h0.clone();
        let fw = cw - w0.clone();

        let d1_i = (d0.clone() + 1.0).clamp(0.0, max_d).int();
        let h1_i = (h0.clone() + 1.0).clamp(0.0, max_h).int();
        let w1_i = (w0.clone() + 1.0).clamp(0.0, max_w).int();
        let d0_i = d0.int();
        let h0_i = h0.int();
        let w0_i = w0.int();

        let stride_d = (h * w) as i32;
        let stride_h = w as i32;
        let flat = source.reshape([n, d * h * w]);

        let vals_lta = Self::gather(&flat, &d0_i, &h0_i, &w0_i, stride_d, stride_h);
        let vals_ltp = Self::gather(&flat, &d0_i, &h0_i, &w1_i, stride_d, stride_h);
        let vals_lba = Self::gather(&flat, &d0_i, &h1_i, &w0_i, stride_d, stride_h);
        let vals_lbp = Self::gather(&flat, &d0_i, &h1_i, &w1_i, stride_d, stride_h);
        let vals_rta = Self::gather(&flat, &d1_i, &h0_i, &w0_i, stride_d, stride_h);
        let vals_rtp = Self::gather(&flat, &d1_i, &h0_i, &w1_i, stride_d, stride_h);
        let vals_rba = Self::gather(&flat, &d1_i, &h1_i, &w0_i, stride_d, stride_h);
        let vals_rbp = Self::gather(&flat, &d1_i, &h1_i, &w1_i, stride_d, stride_h);

        // Interpolate along depth.
        let vals_ta = vals_lta.clone() + (vals_rta - vals_lta) * fd.clone();
        let vals_tp = vals_ltp.clone() + (vals_rtp - vals_ltp) * fd.clone();
        let vals_ba = vals_lba.clone() + (vals_rba - vals_lba) * fd.clone();
        let vals_bp = vals_lbp.clone() + (vals_rbp - vals_lbp) * fd;

        // Along width.
        let vals_t = vals_ta.clone() + (vals_tp - vals_ta) * fw.clone();
        let vals_b = vals_ba.clone() + (vals_bp - vals_ba) * fw;

        // Along height.
        vals_t.clone() + (vals_b - vals_t) * fh
    }

    #[inline]
    fn gather<B: Backend>(
        flat: &Tensor<B, 2>,
        di: &Tensor<B, 2, Int>,
        hi: &Tensor<B, 2, Int>,
        wi: &Tensor<B, 2, Int>,
        stride_d: i32,
        stride_h: i32,
    ) -> Tensor<B, 2> {
        let idx = di.clone() * stride_d + hi.clone() * stride_h + wi.clone();
        flat.clone().gather(1, idx)
    }
}

impl Default for TrilinearSampler {
    fn default() -> Self {
        Self {
            config: SamplerConfig::new(),
        }
    }
}
