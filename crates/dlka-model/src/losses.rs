//! Photometric reconstruction and smoothness losses.
//!
//! Images use the channel-last layout `[B, H, W, C]` produced by the inverse
//! warp; masks are `{0, 1}` tensors `[B, H, W, 1]` or `[B, H, W, C]`.

use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use std::marker::PhantomData;

use crate::error::{self, ModelError};

/// Threshold below which [`smooth_l0_5`] switches to its quadratic branch.
pub const SMOOTH_L0_5_BETA: f64 = 0.00097656;

/// Robust `L0.5`-style loss with a quadratic region near zero.
///
/// Per element, with `e = |pred - gt|`, contributes `32768 * e^2` when
/// `e < beta` and `sqrt(e)` otherwise. The two branches meet at
/// `beta = 2^-10`. Returns the mean over all elements.
pub fn smooth_l0_5<B: Backend, const D: usize>(
    pred: Tensor<B, D>,
    gt: Tensor<B, D>,
    beta: f64,
) -> error::Result<Tensor<B, 1>> {
    if pred.dims() != gt.dims() {
        return Err(ModelError::shape_mismatch(pred.dims(), gt.dims()));
    }
    let e = (pred - gt).abs();
    let below = e.clone().lower_elem(beta);

    let quadratic = e.clone().powf_scalar(2.0) * 32768.0;
    // Clamped so the unselected branch never sees sqrt(0).
    let root = e.clamp_min(beta).sqrt();
    Ok(root.mask_where(below, quadratic).mean())
}

/// Finite differences `(dx, dy)` of a `[B, H, W, C]` image, taken as
/// `next - current` along width and height.
pub fn gradient<B: Backend>(img: Tensor<B, 4>) -> error::Result<(Tensor<B, 4>, Tensor<B, 4>)> {
    let [_, h, w, _] = check_differentiable(&img)?;
    let dx = img.clone().narrow(2, 1, w - 1) - img.clone().narrow(2, 0, w - 1);
    let dy = img.clone().narrow(1, 1, h - 1) - img.narrow(1, 0, h - 1);
    Ok((dx, dy))
}

/// `current - next` along width.
pub fn gradient_x<B: Backend>(img: Tensor<B, 4>) -> error::Result<Tensor<B, 4>> {
    let [_, _, w, _] = check_differentiable(&img)?;
    Ok(img.clone().narrow(2, 0, w - 1) - img.narrow(2, 1, w - 1))
}

/// `current - next` along height.
pub fn gradient_y<B: Backend>(img: Tensor<B, 4>) -> error::Result<Tensor<B, 4>> {
    let [_, h, _, _] = check_differentiable(&img)?;
    Ok(img.clone().narrow(1, 0, h - 1) - img.narrow(1, 1, h - 1))
}

/// Finite differences need two samples along each spatial axis.
fn check_differentiable<B: Backend>(img: &Tensor<B, 4>) -> error::Result<[usize; 4]> {
    let [b, h, w, c] = img.dims();
    if h < 2 || w < 2 {
        return Err(ModelError::shape_mismatch([b, h.max(2), w.max(2), c], [b, h, w, c]));
    }
    Ok([b, h, w, c])
}

/// Repeat a single-channel mask across `channels`.
fn expand_mask<B: Backend>(mask: Tensor<B, 4>, dims: [usize; 4]) -> error::Result<Tensor<B, 4>> {
    let [b, h, w, c] = dims;
    let [mb, mh, mw, mc] = mask.dims();
    if [mb, mh, mw] != [b, h, w] || (mc != 1 && mc != c) {
        return Err(ModelError::shape_mismatch([b, h, w, 1], mask.dims()));
    }
    if mc == c {
        Ok(mask)
    } else {
        Ok(mask.repeat(&[1, 1, 1, c]))
    }
}

/// Photometric loss between a warped source view and the reference view.
///
/// With `simple`, the smooth L0.5 loss of the masked images. Otherwise an
/// even mix of that photometric term and the same loss on image gradients.
///
/// # Arguments
/// * `warped` - Warped source images `[B, H, W, C]`
/// * `reference` - Reference images `[B, H, W, C]`
/// * `mask` - Validity mask `[B, H, W, 1]` or `[B, H, W, C]`
/// * `simple` - Skip the gradient term
pub fn reconstruction_loss<B: Backend>(
    warped: Tensor<B, 4>,
    reference: Tensor<B, 4>,
    mask: Tensor<B, 4>,
    simple: bool,
) -> error::Result<Tensor<B, 1>> {
    let dims = reference.dims();
    if warped.dims() != dims {
        return Err(ModelError::shape_mismatch(dims, warped.dims()));
    }
    let mask = expand_mask(mask, dims)?;
    let warped = warped * mask.clone();
    let reference = reference * mask;

    let photo_loss = smooth_l0_5(warped.clone(), reference.clone(), SMOOTH_L0_5_BETA)?;
    if simple {
        return Ok(photo_loss);
    }

    let alpha = 0.5;
    let (ref_dx, ref_dy) = gradient(reference)?;
    let (warped_dx, warped_dy) = gradient(warped)?;
    let grad_loss = smooth_l0_5(warped_dx, ref_dx, SMOOTH_L0_5_BETA)?
        + smooth_l0_5(warped_dy, ref_dy, SMOOTH_L0_5_BETA)?;

    Ok(photo_loss * (1.0 - alpha) + grad_loss * alpha)
}

/// Per-pixel structural dissimilarity between two images.
///
/// Statistics are taken over `3x3` windows without padding, so the output
/// is two pixels smaller along each spatial axis. Values are
/// `pooled_mask * (clamp((1 - SSIM) / 2, 0, 1) + 1e-6)`, and all zeros
/// when the pooled mask is empty.
#[derive(Module, Debug)]
pub struct Ssim<B: Backend> {
    pool: AvgPool2d,
    c1: f64,
    c2: f64,
    phantom: PhantomData<B>,
}

impl<B: Backend> Default for Ssim<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Ssim<B> {
    pub fn new() -> Self {
        Self {
            pool: AvgPool2dConfig::new([3, 3]).with_strides([1, 1]).init(),
            c1: 0.01f64.powi(2),
            c2: 0.03f64.powi(2),
            phantom: PhantomData,
        }
    }

    /// # Arguments
    /// * `x` - Images `[B, H, W, C]`
    /// * `y` - Images `[B, H, W, C]`
    /// * `mask` - Validity mask `[B, H, W, 1]` or `[B, H, W, C]`
    ///
    /// # Returns
    /// Dissimilarity map `[B, H - 2, W - 2, C]`
    pub fn forward(&self, x: Tensor<B, 4>, y: Tensor<B, 4>, mask: Tensor<B, 4>) -> error::Result<Tensor<B, 4>> {
        let dims = x.dims();
        if y.dims() != dims {
            return Err(ModelError::shape_mismatch(dims, y.dims()));
        }
        if dims[1] < 3 || dims[2] < 3 {
            return Err(ModelError::invalid_configuration(format!(
                "SSIM needs at least a 3x3 image, got {}x{}",
                dims[1], dims[2]
            )));
        }
        let mask = expand_mask(mask, dims)?;

        // [B, H, W, C] -> [B, C, H, W]
        let x = x.permute([0, 3, 1, 2]);
        let y = y.permute([0, 3, 1, 2]);
        let mask = mask.permute([0, 3, 1, 2]);

        let mu_x = self.pool.forward(x.clone());
        let mu_y = self.pool.forward(y.clone());
        let sigma_x = self.pool.forward(x.clone().powf_scalar(2.0)) - mu_x.clone().powf_scalar(2.0);
        let sigma_y = self.pool.forward(y.clone().powf_scalar(2.0)) - mu_y.clone().powf_scalar(2.0);
        let sigma_xy = self.pool.forward(x * y) - mu_x.clone() * mu_y.clone();

        let ssim_n = (mu_x.clone() * mu_y.clone() * 2.0 + self.c1) * (sigma_xy * 2.0 + self.c2);
        let ssim_d = (mu_x.powf_scalar(2.0) + mu_y.powf_scalar(2.0) + self.c1) * (sigma_x + sigma_y + self.c2);

        let ssim_mask = self.pool.forward(mask);
        let mask_sum: f32 = ssim_mask.clone().sum().into_scalar().elem();

        let output = if mask_sum == 0.0 {
            ssim_mask.zeros_like()
        } else {
            let dissimilarity = ((ssim_n / ssim_d).neg() + 1.0) / 2.0;
            ssim_mask * (dissimilarity.clamp(0.0, 1.0) + 1e-6)
        };

        // [B, C, H, W] -> [B, H, W, C]
        Ok(output.permute([0, 2, 3, 1]))
    }
}

/// Configuration for [`depth_smoothness`].
#[derive(Config, Debug, PartialEq)]
pub struct SmoothnessConfig {
    /// Edge sensitivity of the image weights.
    #[config(default = "1.0")]
    pub lambda_wt: f64,
}

impl SmoothnessConfig {
    pub fn loss<B: Backend>(&self, depth: Tensor<B, 4>, image: Tensor<B, 4>) -> error::Result<Tensor<B, 1>> {
        depth_smoothness(depth, image, self.lambda_wt)
    }
}

/// Edge-aware depth smoothness.
///
/// Depth gradients are down-weighted by `exp(-lambda_wt * mean_c |dI|)` so
/// that depth may change across image edges.
///
/// # Arguments
/// * `depth` - Depth maps `[B, H, W, 1]`
/// * `image` - Images `[B, H, W, C]`
/// * `lambda_wt` - Edge sensitivity
pub fn depth_smoothness<B: Backend>(depth: Tensor<B, 4>, image: Tensor<B, 4>, lambda_wt: f64) -> error::Result<Tensor<B, 1>> {
    let [b, h, w, c] = depth.dims();
    let [bi, hi, wi, _] = image.dims();
    if c != 1 || [b, h, w] != [bi, hi, wi] {
        return Err(ModelError::shape_mismatch([bi, hi, wi, 1], depth.dims()));
    }

    let depth_dx = gradient_x(depth.clone())?;
    let depth_dy = gradient_y(depth)?;
    let image_dx = gradient_x(image.clone())?;
    let image_dy = gradient_y(image)?;

    let weights_x = (image_dx.abs().mean_dim(3) * lambda_wt).neg().exp();
    let weights_y = (image_dy.abs().mean_dim(3) * lambda_wt).neg().exp();

    let smoothness_x = depth_dx * weights_x;
    let smoothness_y = depth_dy * weights_y;
    Ok(smoothness_x.abs().mean() + smoothness_y.abs().mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar()
    }

    #[test]
    fn test_smooth_l0_5_branches() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 1>::from_floats([0.0005, 0.25, 4.0], &device);
        let gt = Tensor::<TestBackend, 1>::zeros([3], &device);

        let loss = scalar(smooth_l0_5(pred, gt, SMOOTH_L0_5_BETA).unwrap());
        let expected = (32768.0 * 0.0005f32.powi(2) + 0.5 + 2.0) / 3.0;
        assert!((loss - expected).abs() < 1e-4, "Expected {}, got {}", expected, loss);
    }

    #[test]
    fn test_smooth_l0_5_shape_mismatch() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 2>::zeros([2, 3], &device);
        let gt = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        assert!(matches!(
            smooth_l0_5(pred, gt, SMOOTH_L0_5_BETA),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_gradient_directions() {
        let device = Default::default();
        let img = Tensor::<TestBackend, 4>::from_floats([[[[1.0], [3.0]], [[4.0], [9.0]]]], &device);

        let (dx, dy) = gradient(img.clone()).unwrap();
        assert_eq!(dx.into_data().to_vec::<f32>().unwrap(), vec![2.0, 5.0]);
        assert_eq!(dy.into_data().to_vec::<f32>().unwrap(), vec![3.0, 6.0]);
        assert_eq!(gradient_x(img.clone()).unwrap().into_data().to_vec::<f32>().unwrap(), vec![-2.0, -5.0]);
        assert_eq!(gradient_y(img).unwrap().into_data().to_vec::<f32>().unwrap(), vec![-3.0, -6.0]);
    }

    #[test]
    fn test_single_row_or_column_rejected() {
        let device = Default::default();
        for [h, w] in [[1, 4], [4, 1]] {
            let img = Tensor::<TestBackend, 4>::ones([1, h, w, 3], &device);
            let mask = Tensor::<TestBackend, 4>::ones([1, h, w, 1], &device);
            let depth = Tensor::<TestBackend, 4>::ones([1, h, w, 1], &device);

            assert!(matches!(gradient(img.clone()), Err(ModelError::ShapeMismatch { .. })));
            assert!(matches!(gradient_x(img.clone()), Err(ModelError::ShapeMismatch { .. })));
            assert!(matches!(gradient_y(img.clone()), Err(ModelError::ShapeMismatch { .. })));
            assert!(matches!(
                reconstruction_loss(img.clone(), img.clone(), mask.clone(), false),
                Err(ModelError::ShapeMismatch { .. })
            ));
            assert!(matches!(
                depth_smoothness(depth, img.clone(), 1.0),
                Err(ModelError::ShapeMismatch { .. })
            ));
            // The photometric-only loss has no finite differences.
            assert!(reconstruction_loss(img.clone(), img, mask, true).is_ok());
        }
    }

    #[test]
    fn test_reconstruction_loss_identical_is_zero() {
        let device = Default::default();
        let img = Tensor::<TestBackend, 4>::random([2, 5, 6, 3], burn::tensor::Distribution::Default, &device);
        let mask = Tensor::<TestBackend, 4>::ones([2, 5, 6, 1], &device);

        let simple = reconstruction_loss(img.clone(), img.clone(), mask.clone(), true).unwrap();
        let full = reconstruction_loss(img.clone(), img, mask, false).unwrap();
        assert_eq!(scalar(simple), 0.0);
        assert_eq!(scalar(full), 0.0);
    }

    #[test]
    fn test_reconstruction_loss_ignores_masked_pixels() {
        let device = Default::default();
        let reference = Tensor::<TestBackend, 4>::zeros([1, 2, 2, 1], &device);
        let warped = Tensor::<TestBackend, 4>::from_floats([[[[9.0], [1.0]], [[1.0], [1.0]]]], &device);
        let mask = Tensor::<TestBackend, 4>::from_floats([[[[0.0], [1.0]], [[1.0], [1.0]]]], &device);

        let loss = scalar(reconstruction_loss(warped, reference, mask, true).unwrap());
        assert!((loss - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_ssim_identical_images() {
        let device = Default::default();
        let data: Vec<f32> = (0..50).map(|v| (v as f32 * 0.3).cos()).collect();
        let img = Tensor::<TestBackend, 4>::from_data(TensorData::new(data, [1, 5, 5, 2]), &device);
        let mask = Tensor::<TestBackend, 4>::ones([1, 5, 5, 1], &device);

        let out = Ssim::new().forward(img.clone(), img, mask).unwrap();
        assert_eq!(out.dims(), [1, 3, 3, 2]);
        for v in out.into_data().to_vec::<f32>().unwrap() {
            assert!(v.abs() < 1e-4, "dissimilarity {}", v);
        }
    }

    #[test]
    fn test_ssim_empty_mask_is_zero() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 4, 4, 1], &device);
        let y = Tensor::<TestBackend, 4>::zeros([1, 4, 4, 1], &device);
        let mask = Tensor::<TestBackend, 4>::zeros([1, 4, 4, 1], &device);

        let out = Ssim::new().forward(x, y, mask).unwrap();
        assert!(out.into_data().to_vec::<f32>().unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_depth_smoothness_constant_depth() {
        let device = Default::default();
        let depth = Tensor::<TestBackend, 4>::ones([1, 4, 4, 1], &device) * 3.0;
        let image = Tensor::<TestBackend, 4>::random([1, 4, 4, 3], burn::tensor::Distribution::Default, &device);
        let loss = SmoothnessConfig::new().loss(depth, image).unwrap();
        assert_eq!(scalar(loss), 0.0);
    }

    #[test]
    fn test_depth_smoothness_edges_reduce_penalty() {
        let device = Default::default();
        let depth = Tensor::<TestBackend, 4>::from_floats([[[[0.0], [1.0]], [[0.0], [1.0]]]], &device);
        let flat = Tensor::<TestBackend, 4>::zeros([1, 2, 2, 1], &device);
        let edge = Tensor::<TestBackend, 4>::from_floats([[[[0.0], [5.0]], [[0.0], [5.0]]]], &device);

        let on_flat = scalar(depth_smoothness(depth.clone(), flat, 1.0).unwrap());
        let on_edge = scalar(depth_smoothness(depth, edge, 1.0).unwrap());
        assert!((on_flat - 1.0).abs() < 1e-6);
        assert!(on_edge < on_flat);
    }
}
