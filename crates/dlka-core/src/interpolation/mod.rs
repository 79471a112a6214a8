//! Differentiable interpolation kernels.
//!
//! Both samplers are composed from floor, clamp, gather and weighted sums, so
//! gradients reach the source values and, through the interpolation weights,
//! the sampling coordinates.
//!
//! The two samplers follow different coordinate conventions:
//! * [`BilinearSampler`] takes normalized `[-1, 1]` coordinates and marks
//!   out-of-bounds samples in a validity mask.
//! * [`TrilinearSampler`] takes absolute voxel indices and clamps them onto
//!   the volume.

pub mod config;
pub mod bilinear;
pub mod trilinear;

pub use config::SamplerConfig;
pub use bilinear::{normalize_coords, BilinearSampler};
pub use trilinear::TrilinearSampler;
