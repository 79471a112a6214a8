//! Colored point clouds from depth maps, written as ASCII PLY.

use anyhow::{bail, Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{Matrix3, Point3};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A camera-frame point with its RGBA color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredPoint {
    pub position: Point3<f32>,
    pub color: [u8; 4],
}

/// Back-project every pixel with non-zero depth.
///
/// # Arguments
/// * `rgb` - Colors `[H, W, 3]` in `0..=255`
/// * `depth` - Depth `[H, W]`; pixels with zero depth are skipped
/// * `intrinsic` - Pinhole intrinsics
/// * `scale` - Depth values are divided by this factor
///
/// # Returns
/// Points in row-major pixel order. Alpha is written as 0.
pub fn point_cloud<B: Backend>(
    rgb: Tensor<B, 3>,
    depth: Tensor<B, 2>,
    intrinsic: &Matrix3<f64>,
    scale: f64,
) -> Result<Vec<ColoredPoint>> {
    let [h, w, c] = rgb.dims();
    if c != 3 {
        bail!("Expected an RGB image [H, W, 3], got {:?}", rgb.dims());
    }
    if depth.dims() != [h, w] {
        bail!("Depth shape {:?} does not match image {}x{}", depth.dims(), h, w);
    }
    if scale == 0.0 {
        bail!("Depth scale must be non-zero");
    }

    let colors = rgb
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Failed to read image data: {:?}", e))?;
    let depths = depth
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Failed to read depth data: {:?}", e))?;

    let (fx, fy) = (intrinsic[(0, 0)], intrinsic[(1, 1)]);
    let (cx, cy) = (intrinsic[(0, 2)], intrinsic[(1, 2)]);

    let mut points = Vec::new();
    for v in 0..h {
        for u in 0..w {
            let i = v * w + u;
            let z = depths[i] as f64 / scale;
            if z == 0.0 {
                continue;
            }
            let x = (u as f64 - cx) * z / fx;
            let y = (v as f64 - cy) * z / fy;
            let channel = |k: usize| colors[i * 3 + k].round().clamp(0.0, 255.0) as u8;
            points.push(ColoredPoint {
                position: Point3::new(x as f32, y as f32, z as f32),
                color: [channel(0), channel(1), channel(2), 0],
            });
        }
    }
    Ok(points)
}

/// Write `points` as an ASCII PLY file with `x y z red green blue alpha`.
pub fn write_ply<P: AsRef<Path>>(path: P, points: &[ColoredPoint]) -> Result<()> {
    let path = path.as_ref();
    let file = fs::File::create(path).with_context(|| format!("Failed to create PLY file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "ply")?;
    writeln!(out, "format ascii 1.0")?;
    writeln!(out, "element vertex {}", points.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(out, "property float {}", axis)?;
    }
    for channel in ["red", "green", "blue", "alpha"] {
        writeln!(out, "property uchar {}", channel)?;
    }
    writeln!(out, "end_header")?;

    for p in points {
        let [r, g, b, a] = p.color;
        writeln!(
            out,
            "{:.6} {:.6} {:.6} {} {} {} {}",
            p.position.x, p.position.y, p.position.z, r, g, b, a
        )?;
    }
    out.flush()?;

    tracing::info!("Saved {} points to {}", points.len(), path.display());
    Ok(())
}
