//! Self-supervised depth fitting on a synthetic stereo pair.
//!
//! A depth map for the reference view is optimized so that the source view,
//! warped through it, reproduces the reference image.

use anyhow::Result;
use burn::backend::Autodiff;
use burn::module::{Module, Param};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use dlka_core::camera::{Camera, CameraTensor};
use dlka_core::InverseWarp;
use dlka_model::{abs_depth_error, reconstruction_loss, SmoothnessConfig, Ssim};
use dlka_train::{log_scalars, AverageMeter, Nested, ScalarValue, ScheduleConfig, ScheduleKind};
use nalgebra::{Matrix3, Vector3};
use tracing_subscriber::EnvFilter;

const H: usize = 24;
const W: usize = 32;
const TRUE_DEPTH: f32 = 2.0;

#[derive(Module, Debug)]
struct DepthField<B: Backend> {
    log_depth: Param<Tensor<B, 3>>,
}

impl<B: Backend> DepthField<B> {
    fn new(initial: f32, device: &B::Device) -> Self {
        let log_depth = Tensor::<B, 3>::ones([1, H, W], device) * initial.ln();
        Self {
            log_depth: Param::from_tensor(log_depth),
        }
    }

    fn forward(&self) -> Tensor<B, 3> {
        self.log_depth.val().exp()
    }
}

fn texture<B: Backend>(device: &B::Device) -> Tensor<B, 4> {
    let mut data = Vec::with_capacity(H * W * 3);
    for y in 0..H {
        for x in 0..W {
            let (xf, yf) = (x as f32, y as f32);
            data.push(0.5 + 0.5 * (xf * 0.4).sin() * (yf * 0.3).cos());
            data.push(0.5 + 0.5 * (xf * 0.25 + yf * 0.2).sin());
            data.push((xf + yf) / (W + H) as f32);
        }
    }
    Tensor::from_data(TensorData::new(data, [1, H, W, 3]), device)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    type MyBackend = Autodiff<NdArray<f32>>;
    let device = Default::default();

    let intrinsic = Camera::pinhole(20.0, 20.0, (W - 1) as f64 / 2.0, (H - 1) as f64 / 2.0);
    let reference = Camera::new(Matrix3::identity(), Vector3::zeros(), intrinsic);
    let source = Camera::new(Matrix3::identity(), Vector3::new(0.15, 0.0, 0.0), intrinsic);
    let reference = CameraTensor::<MyBackend>::from_cameras(&[reference], &device)?;
    let source = CameraTensor::<MyBackend>::from_cameras(&[source], &device)?;

    let warp = InverseWarp::default();
    let source_image = texture::<MyBackend>(&device);
    let gt_depth = Tensor::<MyBackend, 3>::ones([1, H, W], &device) * TRUE_DEPTH;
    let (reference_image, _) = warp.warp(source_image.clone(), &reference, &source, gt_depth.clone())?;
    let reference_image = reference_image.detach();

    let schedule = ScheduleConfig::new()
        .with_kind(ScheduleKind::CosineLr)
        .with_base_lr(0.05)
        .with_warmup(10)
        .with_decay(0.5)
        .with_epochs(120);
    schedule.validate()?;

    let ssim = Ssim::<MyBackend>::new();
    let smoothness = SmoothnessConfig::new();
    let mut model = DepthField::<MyBackend>::new(2.6, &device);
    let mut optimizer = AdamConfig::new().init();
    let mut meter = AverageMeter::new();

    for step in 0..schedule.epochs {
        let depth = model.forward();
        let (warped, mask) = warp.warp(source_image.clone(), &reference, &source, depth.clone())?;

        let photo = reconstruction_loss(warped.clone(), reference_image.clone(), mask.clone(), false)?;
        let structure = ssim.forward(warped, reference_image.clone(), mask)?.mean();
        let smooth = smoothness.loss(depth.clone().reshape([1, H, W, 1]), reference_image.clone())?;
        let loss = photo.clone() + structure.clone() * 0.5 + smooth.clone() * 0.1;

        let valid = gt_depth.clone().greater_elem(0.0);
        let abs_err = abs_depth_error(depth.detach(), gt_depth.clone(), valid, None)?;

        let scalars = Nested::map_of([
            ("loss", Nested::Leaf(ScalarValue::Tensor(loss.clone().detach()))),
            ("photo", Nested::Leaf(ScalarValue::Tensor(photo.detach()))),
            ("ssim", Nested::Leaf(ScalarValue::Tensor(structure.detach()))),
            ("smooth", Nested::Leaf(ScalarValue::Tensor(smooth.detach()))),
            ("abs_depth_error", Nested::Leaf(ScalarValue::Tensor(abs_err))),
        ]);
        let flat = log_scalars("train", scalars, step)?;
        meter.update(flat)?;

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optimizer.step(schedule.learning_rate(step), model, grads);
    }

    for (name, value) in meter.averages() {
        tracing::info!("{}: {:.6}", name, value);
    }
    Ok(())
}
