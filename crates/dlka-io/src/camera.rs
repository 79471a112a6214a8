//! Plain-text camera files.
//!
//! ```text
//! extrinsic
//! r00 r01 r02 t0
//! r10 r11 r12 t1
//! r20 r21 r22 t2
//! 0 0 0 1
//!
//! intrinsic
//! fx 0 cx
//! 0 fy cy
//! 0 0 1
//!
//! depth_min depth_interval depth_count depth_max
//! ```

use anyhow::{bail, Context, Result};
use dlka_core::camera::{Camera, DepthRange};
use nalgebra::{Matrix3, Matrix4};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `camera` in the text layout shown in the module docs.
pub fn write_camera<P: AsRef<Path>>(path: P, camera: &Camera) -> Result<()> {
    let path = path.as_ref();
    let file = fs::File::create(path).with_context(|| format!("Failed to create camera file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "extrinsic")?;
    for i in 0..4 {
        for j in 0..4 {
            write!(out, "{} ", camera.extrinsic[(i, j)])?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;

    writeln!(out, "intrinsic")?;
    for i in 0..3 {
        for j in 0..3 {
            write!(out, "{} ", camera.intrinsic[(i, j)])?;
        }
        writeln!(out)?;
    }

    let [min, interval, count, max] = camera.depth_range.to_row();
    writeln!(out)?;
    writeln!(out, "{} {} {} {}", min, interval, count, max)?;
    out.flush()?;

    tracing::info!("Wrote camera to {}", path.display());
    Ok(())
}

/// Read a camera written by [`write_camera`].
///
/// The depth line may hold two to four values; missing trailing values
/// default to zero.
pub fn read_camera<P: AsRef<Path>>(path: P) -> Result<Camera> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read camera file {}", path.display()))?;
    parse_camera(&text)
}

/// Parse the text layout of [`write_camera`].
pub fn parse_camera(text: &str) -> Result<Camera> {
    let mut tokens = text.split_whitespace();

    expect_header(&mut tokens, "extrinsic")?;
    let extrinsic = Matrix4::from_row_slice(&read_values(&mut tokens, 16, "extrinsic")?);

    expect_header(&mut tokens, "intrinsic")?;
    let intrinsic = Matrix3::from_row_slice(&read_values(&mut tokens, 9, "intrinsic")?);

    let rest: Vec<f64> = tokens
        .map(|t| t.parse::<f64>().with_context(|| format!("Invalid depth range value '{}'", t)))
        .collect::<Result<_>>()?;
    if rest.len() < 2 || rest.len() > 4 {
        bail!("Expected 2 to 4 depth range values, found {}", rest.len());
    }
    let mut row = [0.0; 4];
    row[..rest.len()].copy_from_slice(&rest);

    Ok(Camera {
        extrinsic,
        intrinsic,
        depth_range: DepthRange::from_row(row),
    })
}

fn expect_header<'a>(tokens: &mut impl Iterator<Item = &'a str>, name: &str) -> Result<()> {
    match tokens.next() {
        Some(t) if t == name => Ok(()),
        Some(t) => bail!("Expected '{}' section, found '{}'", name, t),
        None => bail!("Missing '{}' section", name),
    }
}

fn read_values<'a>(tokens: &mut impl Iterator<Item = &'a str>, n: usize, section: &str) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        let token = tokens
            .next()
            .with_context(|| format!("'{}' section ended after {} of {} values", section, i, n))?;
        values.push(
            token
                .parse::<f64>()
                .with_context(|| format!("Invalid '{}' value '{}'", section, token))?,
        );
    }
    Ok(values)
}
