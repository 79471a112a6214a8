//! Depth-based inverse warping between two calibrated views.
//!
//! Every pixel of the reference view is back-projected with its depth,
//! moved into the source camera frame and projected onto the source image,
//! which is then resampled bilinearly. The result is what the reference
//! camera would see if the source image were painted onto the reference
//! depth map.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::camera::{homogeneous_intrinsic, inverse_3x3, relative_pose, transform_matrix, CameraTensor};
use crate::error::{CoreError, Result};
use crate::grid::pixel_grid;
use crate::interpolation::{normalize_coords, BilinearSampler, SamplerConfig};

/// Back-project homogeneous pixels into the camera frame.
///
/// # Arguments
/// * `depth` - Depth per pixel `[B, 1, N]`
/// * `pixels` - Homogeneous pixel coordinates `[B, 3, N]`
/// * `intrinsic_inv` - Inverse intrinsics `[B, 3, 3]`
///
/// # Returns
/// Camera-frame points `[B, 3, N]`
pub fn pixel_to_camera<B: Backend>(
    depth: Tensor<B, 3>,
    pixels: Tensor<B, 3>,
    intrinsic_inv: Tensor<B, 3>,
) -> Tensor<B, 3> {
    intrinsic_inv.matmul(pixels) * depth.repeat(&[1, 3, 1])
}

/// Project homogeneous camera points to pixel coordinates.
///
/// The perspective divisor is guarded by an additive `epsilon`; points at or
/// behind the camera are not rejected and yield large finite coordinates.
///
/// # Arguments
/// * `points` - Homogeneous camera-frame points `[B, 4, N]`
/// * `projection` - Camera-to-pixel projection `[B, 4, 4]`
/// * `epsilon` - Divisor guard
///
/// # Returns
/// Absolute pixel coordinates `[B, 2, N]` as `(x, y)` rows
pub fn camera_to_pixel<B: Backend>(points: Tensor<B, 3>, projection: Tensor<B, 3>, epsilon: f64) -> Tensor<B, 3> {
    let projected = projection.matmul(points);
    let xy = projected.clone().narrow(1, 0, 2);
    let z = projected.narrow(1, 2, 1).add_scalar(epsilon);
    xy / z.repeat(&[1, 2, 1])
}

/// Intrinsic matrix used to project into the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionIntrinsic {
    /// Reuse the reference intrinsics, as for a rectified pair sharing `K`.
    #[default]
    Reference,
    /// Use the source camera's own intrinsics.
    Source,
}

/// Inverse warping of a source image into a reference view.
#[derive(Debug, Clone)]
pub struct InverseWarp {
    sampler: BilinearSampler,
    epsilon: f64,
    projection: ProjectionIntrinsic,
}

impl Default for InverseWarp {
    fn default() -> Self {
        Self {
            sampler: BilinearSampler::default(),
            epsilon: SamplerConfig::new().epsilon,
            projection: ProjectionIntrinsic::default(),
        }
    }
}

impl InverseWarp {
    /// Create a warp operator, rejecting unsupported sampler settings.
    pub fn try_new(config: SamplerConfig) -> Result<Self> {
        let epsilon = config.epsilon;
        Ok(Self {
            sampler: BilinearSampler::try_new(config)?,
            epsilon,
            projection: ProjectionIntrinsic::default(),
        })
    }

    /// Select the intrinsics used for the projection into the source view.
    pub fn with_projection_intrinsic(mut self, projection: ProjectionIntrinsic) -> Self {
        self.projection = projection;
        self
    }

    /// Absolute pixel coordinates in the source view for every reference pixel.
    ///
    /// Pixels are back-projected with the reference intrinsics and projected
    /// with the intrinsics selected by [`ProjectionIntrinsic`].
    ///
    /// # Arguments
    /// * `reference` - Cameras of the view the depth map belongs to
    /// * `source` - Cameras of the view to sample from
    /// * `depth` - Reference depth `[B, H, W]`
    ///
    /// # Returns
    /// Source pixel coordinates `[B, H, W, 2]` as `(x, y)`
    pub fn source_pixel_coords<B: Backend>(
        &self,
        reference: &CameraTensor<B>,
        source: &CameraTensor<B>,
        depth: Tensor<B, 3>,
    ) -> Result<Tensor<B, 4>> {
        let [b, h, w] = depth.dims();
        Self::check_batch(reference, b)?;
        Self::check_batch(source, b)?;

        let n = h * w;
        let device = depth.device();

        let (r_rel, t_rel) = relative_pose(reference, source);
        let transform = transform_matrix(r_rel, t_rel);
        let intrinsic = match self.projection {
            ProjectionIntrinsic::Reference => reference.intrinsic(),
            ProjectionIntrinsic::Source => source.intrinsic(),
        };
        let projection = homogeneous_intrinsic(intrinsic).matmul(transform);

        let pixels = pixel_grid::<B>([h, w], &device).reshape([1, 3, n]).repeat(&[b, 1, 1]);
        let cam_points = pixel_to_camera(depth.reshape([b, 1, n]), pixels, inverse_3x3(reference.intrinsic()));
        let cam_points = Tensor::cat(vec![cam_points, Tensor::ones([b, 1, n], &device)], 1);

        let coords = camera_to_pixel(cam_points, projection, self.epsilon);
        Ok(coords.reshape([b, 2, h, w]).permute([0, 2, 3, 1]))
    }

    /// Warp `image` from the source view into the reference view.
    ///
    /// # Arguments
    /// * `image` - Source images `[B, H, W, C]`
    /// * `reference` - Cameras of the view the depth map belongs to
    /// * `source` - Cameras the image was captured with
    /// * `depth` - Reference depth `[B, H, W]`
    ///
    /// # Returns
    /// Warped images `[B, H, W, C]` and validity mask `[B, H, W, 1]`
    pub fn warp<B: Backend>(
        &self,
        image: Tensor<B, 4>,
        reference: &CameraTensor<B>,
        source: &CameraTensor<B>,
        depth: Tensor<B, 3>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>)> {
        let [b, h, w, _] = image.dims();
        if depth.dims() != [b, h, w] {
            return Err(CoreError::shape_mismatch([b, h, w], depth.dims()));
        }
        if h < 2 || w < 2 {
            return Err(CoreError::dimension_mismatch(format!(
                "warping needs at least 2x2 pixels, got {}x{}",
                h, w
            )));
        }

        let coords = self.source_pixel_coords(reference, source, depth)?;
        let x = normalize_coords(coords.clone().narrow(3, 0, 1), w);
        let y = normalize_coords(coords.narrow(3, 1, 1), h);
        self.sampler.sample(image, x, y)
    }

    /// [`InverseWarp::warp`] for depth maps carrying a singleton channel
    /// axis `[B, 1, H, W]`.
    pub fn warp_channel_depth<B: Backend>(
        &self,
        image: Tensor<B, 4>,
        reference: &CameraTensor<B>,
        source: &CameraTensor<B>,
        depth: Tensor<B, 4>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>)> {
        let [b, c, h, w] = depth.dims();
        if c != 1 {
            return Err(CoreError::shape_mismatch([b, 1, h, w], [b, c, h, w]));
        }
        self.warp(image, reference, source, depth.reshape([b, h, w]))
    }

    fn check_batch<B: Backend>(camera: &CameraTensor<B>, batch: usize) -> Result<()> {
        if camera.batch_size() != batch {
            return Err(CoreError::shape_mismatch(
                [batch, 2, 4, 4],
                [camera.batch_size(), 2, 4, 4],
            ));
        }
        Ok(())
    }
}

/// Warp with default sampler settings from raw `[B, 2, 4, 4]` camera tensors.
pub fn inverse_warp<B: Backend>(
    image: Tensor<B, 4>,
    reference: Tensor<B, 4>,
    source: Tensor<B, 4>,
    depth: Tensor<B, 3>,
) -> Result<(Tensor<B, 4>, Tensor<B, 4>)> {
    let reference = CameraTensor::try_new(reference)?;
    let source = CameraTensor::try_new(source)?;
    InverseWarp::default().warp(image, &reference, &source, depth)
}
