//! Model building blocks for deformable large-kernel attention networks.
//!
//! * [`deformable`] - offset-driven trilinear resampling with a grid cache
//! * [`attention`] - deformable convolution and large kernel attention
//! * [`losses`] - photometric, structural and smoothness losses
//! * [`metrics`] - per-image depth error metrics

pub mod attention;
pub mod deformable;
pub mod error;
pub mod losses;
pub mod metrics;

pub use attention::{DeformConv3d, DeformConv3dConfig, Lka3d, LkaAttention3d, LkaAttention3dConfig};
pub use deformable::{map_offsets, ConvOffset3d, ConvOffset3dConfig, DeformableResampler, GridCache, GridKey};
pub use error::{ModelError, Result};
pub use losses::{depth_smoothness, reconstruction_loss, smooth_l0_5, SmoothnessConfig, Ssim};
pub use metrics::{abs_depth_error, per_image_mean, threshold_error};
