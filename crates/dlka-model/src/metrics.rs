//! Depth evaluation metrics, computed per image and averaged over the batch.

use burn::prelude::*;

use crate::error::{ModelError, Result};

/// Apply `metric` to every image of a batch and average the results.
///
/// # Arguments
/// * `est` - Estimated depth `[B, H, W]`
/// * `gt` - Ground-truth depth `[B, H, W]`
/// * `mask` - Pixels to evaluate `[B, H, W]`
/// * `metric` - Per-image metric returning a one-element tensor
pub fn per_image_mean<B, F>(
    est: Tensor<B, 3>,
    gt: Tensor<B, 3>,
    mask: Tensor<B, 3, Bool>,
    metric: F,
) -> Result<Tensor<B, 1>>
where
    B: Backend,
    F: Fn(Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2, Bool>) -> Tensor<B, 1>,
{
    let dims = gt.dims();
    if est.dims() != dims {
        return Err(ModelError::shape_mismatch(dims, est.dims()));
    }
    if mask.dims() != dims {
        return Err(ModelError::shape_mismatch(dims, mask.dims()));
    }
    let [b, h, w] = dims;
    if b == 0 {
        return Err(ModelError::invalid_configuration("cannot average a metric over an empty batch"));
    }

    let results: Vec<Tensor<B, 1>> = (0..b)
        .map(|i| {
            metric(
                est.clone().narrow(0, i, 1).reshape([h, w]),
                gt.clone().narrow(0, i, 1).reshape([h, w]),
                mask.clone().narrow(0, i, 1).reshape([h, w]),
            )
        })
        .collect();

    Ok(Tensor::cat(results, 0).mean())
}

/// Mean of `selected` values, or zero when nothing is selected.
fn masked_mean<B: Backend>(values: Tensor<B, 2>, selected: Tensor<B, 2>) -> Tensor<B, 1> {
    // Counts are integral, so clamping at one only affects the empty case.
    (values * selected.clone()).sum() / selected.sum().clamp_min(1.0)
}

/// Mean absolute depth error over masked pixels.
///
/// With `threshold = Some((lo, hi))` only errors in `[lo, hi]` are averaged.
/// Images with no selected pixels contribute zero.
pub fn abs_depth_error<B: Backend>(
    est: Tensor<B, 3>,
    gt: Tensor<B, 3>,
    mask: Tensor<B, 3, Bool>,
    threshold: Option<(f64, f64)>,
) -> Result<Tensor<B, 1>> {
    per_image_mean(est, gt, mask, |est, gt, mask| {
        let error = (est - gt).abs();
        let mut selected = mask.float();
        if let Some((lo, hi)) = threshold {
            selected = selected
                * error.clone().greater_equal_elem(lo).float()
                * error.clone().lower_equal_elem(hi).float();
        }
        masked_mean(error, selected)
    })
}

/// Fraction of masked pixels whose absolute error exceeds `thres`.
pub fn threshold_error<B: Backend>(
    est: Tensor<B, 3>,
    gt: Tensor<B, 3>,
    mask: Tensor<B, 3, Bool>,
    thres: f64,
) -> Result<Tensor<B, 1>> {
    per_image_mean(est, gt, mask, |est, gt, mask| {
        let exceeded = (est - gt).abs().greater_elem(thres).float();
        masked_mean(exceeded, mask.float())
    })
}
