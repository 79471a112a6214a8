//! Pinhole camera model and batched pose algebra.
//!
//! A camera is a pair of 4×4 matrices. Slot 0 holds the extrinsic `[R|t]`
//! in rows 0–2 (row 3 is `0 0 0 1`). Slot 1 holds the intrinsic `K` in
//! rows 0–2 and, in row 3, depth-range metadata consumed by depth-hypothesis
//! generation rather than by the geometry here.
//!
//! [`Camera`] is the host-side description; [`CameraTensor`] wraps a stacked
//! `[B, 2, 4, 4]` tensor and exposes its blocks for batched tensor math.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Depth hypothesis range stored in row 3 of the intrinsic slot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DepthRange {
    /// Nearest depth hypothesis.
    pub min: f64,
    /// Spacing between hypotheses.
    pub interval: f64,
    /// Number of hypotheses.
    pub count: f64,
    /// Farthest depth hypothesis.
    pub max: f64,
}

impl DepthRange {
    pub fn new(min: f64, interval: f64, count: f64, max: f64) -> Self {
        Self {
            min,
            interval,
            count,
            max,
        }
    }

    /// Row layout used in the camera tensor and camera files.
    pub fn to_row(&self) -> [f64; 4] {
        [self.min, self.interval, self.count, self.max]
    }

    /// Inverse of [`DepthRange::to_row`].
    pub fn from_row(row: [f64; 4]) -> Self {
        Self {
            min: row[0],
            interval: row[1],
            count: row[2],
            max: row[3],
        }
    }
}

/// Host-side pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World-to-camera transform `[R|t; 0 0 0 1]`.
    pub extrinsic: Matrix4<f64>,
    /// Intrinsic matrix `K`.
    pub intrinsic: Matrix3<f64>,
    /// Depth hypothesis range.
    pub depth_range: DepthRange,
}

impl Camera {
    /// Create a camera from rotation, translation and intrinsics.
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>, intrinsic: Matrix3<f64>) -> Self {
        let mut extrinsic = Matrix4::identity();
        extrinsic.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        extrinsic.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self {
            extrinsic,
            intrinsic,
            depth_range: DepthRange::default(),
        }
    }

    /// Build the intrinsic matrix of a pinhole camera without skew.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Matrix3<f64> {
        Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0)
    }

    /// Attach depth-range metadata.
    pub fn with_depth_range(mut self, depth_range: DepthRange) -> Self {
        self.depth_range = depth_range;
        self
    }

    /// Rotation block `R`.
    pub fn rotation(&self) -> Matrix3<f64> {
        self.extrinsic.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Translation block `t`.
    pub fn translation(&self) -> Vector3<f64> {
        self.extrinsic.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Row-major `[2, 4, 4]` values of the camera pair.
    pub fn to_values(&self) -> [f32; 32] {
        let mut values = [0.0f32; 32];
        for i in 0..4 {
            for j in 0..4 {
                values[i * 4 + j] = self.extrinsic[(i, j)] as f32;
            }
        }
        for i in 0..3 {
            for j in 0..3 {
                values[16 + i * 4 + j] = self.intrinsic[(i, j)] as f32;
            }
        }
        for (j, v) in self.depth_range.to_row().into_iter().enumerate() {
            values[28 + j] = v as f32;
        }
        values
    }

    /// Stack cameras into a `[B, 2, 4, 4]` tensor on `device`.
    pub fn stack<B: Backend>(cameras: &[Camera], device: &B::Device) -> Result<Tensor<B, 4>> {
        if cameras.is_empty() {
            return Err(CoreError::dimension_mismatch("cannot stack an empty camera batch"));
        }
        let values: Vec<f32> = cameras.iter().flat_map(|c| c.to_values()).collect();
        let data = TensorData::new(values, [cameras.len(), 2, 4, 4]);
        Ok(Tensor::from_data(data, device))
    }
}

/// Batched camera parameters `[B, 2, 4, 4]`.
#[derive(Debug, Clone)]
pub struct CameraTensor<B: Backend> {
    data: Tensor<B, 4>,
}

impl<B: Backend> CameraTensor<B> {
    /// Wrap a camera tensor, validating its layout.
    pub fn try_new(data: Tensor<B, 4>) -> Result<Self> {
        let [b, slots, rows, cols] = data.dims();
        if slots != 2 || rows != 4 || cols != 4 {
            return Err(CoreError::shape_mismatch([b, 2, 4, 4], [b, slots, rows, cols]));
        }
        Ok(Self { data })
    }

    /// Build from host cameras.
    pub fn from_cameras(cameras: &[Camera], device: &B::Device) -> Result<Self> {
        Self::try_new(Camera::stack(cameras, device)?)
    }

    /// Number of cameras.
    pub fn batch_size(&self) -> usize {
        self.data.dims()[0]
    }

    /// Underlying tensor.
    pub fn tensor(&self) -> &Tensor<B, 4> {
        &self.data
    }

    /// Rotations `[B, 3, 3]`.
    pub fn rotation(&self) -> Tensor<B, 3> {
        let b = self.batch_size();
        self.data.clone().slice([0..b, 0..1, 0..3, 0..3]).reshape([b, 3, 3])
    }

    /// Translations `[B, 3, 1]`.
    pub fn translation(&self) -> Tensor<B, 3> {
        let b = self.batch_size();
        self.data.clone().slice([0..b, 0..1, 0..3, 3..4]).reshape([b, 3, 1])
    }

    /// Intrinsics `[B, 3, 3]`.
    pub fn intrinsic(&self) -> Tensor<B, 3> {
        let b = self.batch_size();
        self.data.clone().slice([0..b, 1..2, 0..3, 0..3]).reshape([b, 3, 3])
    }
}

/// Pose of `source` relative to `reference` by inverse composition.
///
/// Returns `R_rel = R_src · R_ref^T` `[B, 3, 3]` and
/// `t_rel = t_src − R_rel · t_ref` `[B, 3, 1]`, which map points from the
/// reference camera frame into the source camera frame.
pub fn relative_pose<B: Backend>(
    reference: &CameraTensor<B>,
    source: &CameraTensor<B>,
) -> (Tensor<B, 3>, Tensor<B, 3>) {
    let r_rel = source.rotation().matmul(reference.rotation().swap_dims(1, 2));
    let t_rel = source.translation() - r_rel.clone().matmul(reference.translation());
    (r_rel, t_rel)
}

/// Homogeneous transform `[R|t; 0 0 0 1]` `[B, 4, 4]`.
pub fn transform_matrix<B: Backend>(rotation: Tensor<B, 3>, translation: Tensor<B, 3>) -> Tensor<B, 3> {
    let b = rotation.dims()[0];
    let device = rotation.device();
    let top = Tensor::cat(vec![rotation, translation], 2);
    Tensor::cat(vec![top, homogeneous_filler(b, &device)], 1)
}

/// Intrinsic matrix lifted to `[K 0; 0 0 0 1]` `[B, 4, 4]`.
pub fn homogeneous_intrinsic<B: Backend>(intrinsic: Tensor<B, 3>) -> Tensor<B, 3> {
    let b = intrinsic.dims()[0];
    let device = intrinsic.device();
    let top = Tensor::cat(vec![intrinsic, Tensor::zeros([b, 3, 1], &device)], 2);
    Tensor::cat(vec![top, homogeneous_filler(b, &device)], 1)
}

fn homogeneous_filler<B: Backend>(batch: usize, device: &B::Device) -> Tensor<B, 3> {
    Tensor::<B, 1>::from_floats([0.0, 0.0, 0.0, 1.0], device)
        .reshape([1, 1, 4])
        .repeat(&[batch, 1, 1])
}

/// Batched inverse of 3×3 matrices via the adjugate.
///
/// Built from element-wise tensor ops so gradients flow to the input.
/// Singular matrices produce non-finite values.
pub fn inverse_3x3<B: Backend>(m: Tensor<B, 3>) -> Tensor<B, 3> {
    let b = m.dims()[0];
    let e = |i: usize, j: usize| m.clone().slice([0..b, i..i + 1, j..j + 1]);

    let (a00, a01, a02) = (e(0, 0), e(0, 1), e(0, 2));
    let (a10, a11, a12) = (e(1, 0), e(1, 1), e(1, 2));
    let (a20, a21, a22) = (e(2, 0), e(2, 1), e(2, 2));

    // Cofactors, already transposed into adjugate order.
    let c00 = a11.clone() * a22.clone() - a12.clone() * a21.clone();
    let c01 = a02.clone() * a21.clone() - a01.clone() * a22.clone();
    let c02 = a01.clone() * a12.clone() - a02.clone() * a11.clone();
    let c10 = a12.clone() * a20.clone() - a10.clone() * a22.clone();
    let c11 = a00.clone() * a22 - a02.clone() * a20.clone();
    let c12 = a02.clone() * a10.clone() - a00.clone() * a12;
    let c20 = a10.clone() * a21.clone() - a11.clone() * a20.clone();
    let c21 = a01.clone() * a20 - a00.clone() * a21;
    let c22 = a00.clone() * a11 - a01.clone() * a10;

    let det = a00 * c00.clone() + a01 * c10.clone() + a02 * c20.clone();

    let adj = Tensor::cat(
        vec![
            Tensor::cat(vec![c00, c01, c02], 2),
            Tensor::cat(vec![c10, c11, c12], 2),
            Tensor::cat(vec![c20, c21, c22], 2),
        ],
        1,
    );
    adj / det.repeat(&[1, 3, 3])
}
