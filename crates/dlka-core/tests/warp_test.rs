use burn::backend::Autodiff;
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use dlka_core::camera::{Camera, CameraTensor, DepthRange};
use dlka_core::interpolation::{normalize_coords, BilinearSampler, SamplerConfig};
use dlka_core::{inverse_warp, CoreError, InverseWarp};
use nalgebra::{Matrix3, Rotation3, Vector3};

type TestBackend = NdArray<f32>;
type TestAutodiffBackend = Autodiff<TestBackend>;

const H: usize = 6;
const W: usize = 8;

fn test_camera(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Camera {
    Camera::new(rotation, translation, Camera::pinhole(6.0, 6.0, 3.5, 2.5))
        .with_depth_range(DepthRange::new(0.5, 0.1, 48.0, 5.3))
}

fn ramp_image(device: &<TestBackend as burn::tensor::backend::Backend>::Device) -> Tensor<TestBackend, 4> {
    let data: Vec<f32> = (0..H * W * 2).map(|v| (v as f32 * 0.37).sin()).collect();
    Tensor::from_data(TensorData::new(data, [1, H, W, 2]), device)
}

#[test]
fn test_identical_cameras_reproduce_image() {
    let device = Default::default();
    let rotation = *Rotation3::from_euler_angles(0.1, -0.2, 0.05).matrix();
    let cam = test_camera(rotation, Vector3::new(0.3, -0.1, 0.7));
    let cams = CameraTensor::<TestBackend>::from_cameras(&[cam], &device).unwrap();

    let image = ramp_image(&device);
    let depth = Tensor::<TestBackend, 3>::ones([1, H, W], &device) * 3.0;
    let (warped, mask) = InverseWarp::default()
        .warp(image.clone(), &cams, &cams, depth)
        .unwrap();

    let expected = image.into_data().to_vec::<f32>().unwrap();
    let warped = warped.into_data().to_vec::<f32>().unwrap();
    let mask = mask.into_data().to_vec::<f32>().unwrap();

    // The last row and column have no lower-right neighbour and are masked.
    for row in 0..H - 1 {
        for col in 0..W - 1 {
            let p = row * W + col;
            assert_eq!(mask[p], 1.0, "pixel ({}, {}) should be valid", row, col);
            for ch in 0..2 {
                let i = p * 2 + ch;
                assert!(
                    (warped[i] - expected[i]).abs() < 1e-3,
                    "pixel ({}, {}) channel {}: {} vs {}",
                    row,
                    col,
                    ch,
                    warped[i],
                    expected[i]
                );
            }
        }
    }
}

#[test]
fn test_raw_camera_tensors() {
    let device = Default::default();
    let cam = test_camera(Matrix3::identity(), Vector3::zeros());
    let raw = Camera::stack::<TestBackend>(&[cam.clone(), cam], &device).unwrap();

    let image = Tensor::<TestBackend, 4>::ones([2, H, W, 3], &device);
    let depth = Tensor::<TestBackend, 3>::ones([2, H, W], &device);
    let (warped, mask) = inverse_warp(image, raw.clone(), raw, depth).unwrap();

    assert_eq!(warped.dims(), [2, H, W, 3]);
    assert_eq!(mask.dims(), [2, H, W, 1]);
}

#[test]
fn test_camera_tensor_layout_rejected() {
    let device = Default::default();
    let bad = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &device);
    let image = Tensor::<TestBackend, 4>::ones([1, H, W, 1], &device);
    let depth = Tensor::<TestBackend, 3>::ones([1, H, W], &device);

    let result = inverse_warp(image, bad.clone(), bad, depth);
    assert!(matches!(result, Err(CoreError::ShapeMismatch { .. })));
}

#[test]
fn test_unsupported_order_rejected() {
    let result = InverseWarp::try_new(SamplerConfig::new().with_order(3));
    assert!(matches!(result, Err(CoreError::UnsupportedOrder(3))));
}

#[test]
fn test_gradient_flows_to_coordinates() {
    let device = Default::default();
    let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
    let source = Tensor::<TestAutodiffBackend, 4>::from_data(TensorData::new(data, [1, 4, 4, 1]), &device);

    let x = normalize_coords(
        Tensor::<TestAutodiffBackend, 4>::from_floats([[[[1.25], [0.5]]]], &device),
        4,
    )
    .require_grad();
    let y = normalize_coords(
        Tensor::<TestAutodiffBackend, 4>::from_floats([[[[1.5], [2.25]]]], &device),
        4,
    )
    .require_grad();

    let (values, _) = BilinearSampler::default().sample(source, x.clone(), y.clone()).unwrap();
    let grads = values.sum().backward();

    // On a ramp with unit x-step and 4-step y, d/dx and d/dy are constant.
    let gx = x.grad(&grads).expect("x gradient").into_data().to_vec::<f32>().unwrap();
    let gy = y.grad(&grads).expect("y gradient").into_data().to_vec::<f32>().unwrap();
    for g in gx {
        assert!((g - 1.5).abs() < 1e-4, "dx = {}", g);
    }
    for g in gy {
        assert!((g - 6.0).abs() < 1e-4, "dy = {}", g);
    }
}

#[test]
fn test_gradient_flows_to_depth() {
    let device = Default::default();
    let reference = test_camera(Matrix3::identity(), Vector3::zeros());
    let source = test_camera(Matrix3::identity(), Vector3::new(0.2, 0.0, 0.0));
    let reference = CameraTensor::<TestAutodiffBackend>::from_cameras(&[reference], &device).unwrap();
    let source = CameraTensor::<TestAutodiffBackend>::from_cameras(&[source], &device).unwrap();

    let data: Vec<f32> = (0..H * W).map(|v| (v % W) as f32).collect();
    let image = Tensor::<TestAutodiffBackend, 4>::from_data(TensorData::new(data, [1, H, W, 1]), &device);
    let depth = (Tensor::<TestAutodiffBackend, 3>::ones([1, H, W], &device) * 2.0).require_grad();

    let (warped, _) = InverseWarp::default()
        .warp(image, &reference, &source, depth.clone())
        .unwrap();
    let grads = warped.sum().backward();

    let g = depth.grad(&grads).expect("depth gradient").into_data().to_vec::<f32>().unwrap();
    assert!(g.iter().all(|v| v.is_finite()));
    assert!(g.iter().any(|v| v.abs() > 1e-6));
}
