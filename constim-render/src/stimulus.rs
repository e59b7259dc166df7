use crate::monitor::Monitor;
use anyhow::{Result, anyhow};
use constim_core::{DrawRequest, Mask};
use std::f64::consts::PI;
use tiny_skia::Pixmap;

/// Signal value of the stimulus at (`x`, `y`) degrees from its centre, `y` pointing up.
///
/// Orientation is clockwise with 0° giving vertical bars. The Gaussian mask has
/// σ = size/6 so the envelope has faded to the background at the patch edge.
pub fn grating_value(request: &DrawRequest, background: f64, x: f64, y: f64) -> f64 {
    let theta = request.orientation_deg.to_radians();
    let u = x * theta.cos() - y * theta.sin();
    let carrier = (2.0 * PI * request.frequency * u + request.phase_deg.to_radians()).sin();

    let envelope = match request.mask {
        Mask::None => 1.0,
        Mask::Gauss => {
            let sigma = request.size_deg / 6.0;
            (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
        }
    };

    (background + request.contrast * carrier * envelope).clamp(-1.0, 1.0)
}

/// Rasterizes the stimulus into an opaque square pixmap `size_deg` wide.
pub fn render_stimulus(request: &DrawRequest, monitor: &Monitor, background: f64) -> Result<Pixmap> {
    let ppd = monitor.pixels_per_degree();
    let side = monitor.deg_to_pix(request.size_deg).round().max(1.0) as u32;
    let mut pixmap =
        Pixmap::new(side, side).ok_or_else(|| anyhow!("cannot allocate {side}x{side} stimulus"))?;

    let half = side as f64 * 0.5;
    let data = pixmap.data_mut();
    for row in 0..side {
        let y = (half - (row as f64 + 0.5)) / ppd;
        for col in 0..side {
            let x = (col as f64 + 0.5 - half) / ppd;
            let gray = monitor.encode(grating_value(request, background, x, y));
            let i = ((row * side + col) * 4) as usize;
            data[i..i + 4].copy_from_slice(&[gray, gray, gray, 255]);
        }
    }
    Ok(pixmap)
}
