//! Differentiable sampling core.
//!
//! * [`grid`] - regular pixel and voxel grids
//! * [`interpolation`] - bilinear (masked) and trilinear (clamped) samplers
//! * [`camera`] - pinhole cameras and batched pose algebra
//! * [`warp`] - depth-based inverse warping between two views
//!
//! Every operation is generic over the burn backend and allocates on an
//! explicitly passed device.

pub mod error;
pub mod grid;
pub mod interpolation;
pub mod camera;
pub mod warp;

pub use error::{CoreError, Result};
pub use camera::{Camera, CameraTensor, DepthRange};
pub use interpolation::{BilinearSampler, SamplerConfig, TrilinearSampler};
pub use warp::{inverse_warp, InverseWarp, ProjectionIntrinsic};
