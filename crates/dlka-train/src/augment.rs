//! Image augmentation used by self-supervised training.

use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, ElementConversion, Tensor};

use crate::error::{Result, TrainError};

/// Zero out a rectangular window of every image in the batch.
///
/// # Arguments
/// * `img` - Images `[B, C, H, W]`
/// * `filter_size` - Window size `(fh, fw)`
/// * `origin` - Top-left corner `(y, x)` of the window; drawn uniformly when `None`
///
/// # Returns
/// The masked images and the `{0, 1}` mask that was applied. When the
/// window covers the whole image the input is returned unchanged with no
/// mask.
pub fn random_image_mask<B: Backend>(
    img: Tensor<B, 4>,
    filter_size: (usize, usize),
    origin: Option<(usize, usize)>,
) -> Result<(Tensor<B, 4>, Option<Tensor<B, 4>>)> {
    let (fh, fw) = filter_size;
    let [b, c, h, w] = img.dims();

    if fh == h && fw == w {
        return Ok((img, None));
    }
    if fh > h || fw > w {
        return Err(TrainError::invalid_shape(format!(
            "mask window {}x{} exceeds image {}x{}",
            fh, fw, h, w
        )));
    }

    let (y, x) = match origin {
        Some((y, x)) => {
            if y + fh > h || x + fw > w {
                return Err(TrainError::invalid_shape(format!(
                    "mask window {}x{} at ({}, {}) leaves image {}x{}",
                    fh, fw, y, x, h, w
                )));
            }
            (y, x)
        }
        None => {
            let device = img.device();
            let draw = |range: usize| -> usize {
                let u: f64 = Tensor::<B, 1>::random([1], Distribution::Default, &device)
                    .into_scalar()
                    .elem();
                ((u * range as f64) as usize).min(range.saturating_sub(1))
            };
            // Exclusive upper bound, as long as the window does not span the axis.
            (draw((h - fh).max(1)), draw((w - fw).max(1)))
        }
    };

    let device = img.device();
    let window = Tensor::<B, 4>::zeros([b, c, fh, fw], &device);
    let filter_mask = Tensor::<B, 4>::ones([b, c, h, w], &device).slice_assign(
        [0..b, 0..c, y..y + fh, x..x + fw],
        window,
    );

    Ok((img * filter_mask.clone(), Some(filter_mask)))
}
