//! File I/O for cameras and reconstructed point clouds.

pub mod camera;
pub mod ply;

pub use camera::{parse_camera, read_camera, write_camera};
pub use ply::{point_cloud, write_ply, ColoredPoint};
