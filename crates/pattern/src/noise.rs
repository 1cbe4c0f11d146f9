//! Perlin modulation of a tiled base plane.

use crate::bits::BitString;
use crate::perlin::pnoise2;
use crate::PanelGeometry;

/// Noise sampling scales.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseScales {
    /// Scale applied to both pixel coordinates.
    pub scale: f64,
    /// Weight of the base-pattern byte on the x axis.
    pub x: f64,
    /// Weight of the base-pattern byte on the y axis.
    pub y: f64,
}

impl NoiseScales {
    /// Scales used when none are derived from a location.
    pub const DEFAULT: Self = Self::uniform(0.01);

    /// Same value on all three scales.
    pub const fn uniform(scale: f64) -> Self {
        Self {
            scale,
            x: scale,
            y: scale,
        }
    }
}

impl Default for NoiseScales {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Re-render `base` as a thresholded noise field.
///
/// The base plane is unpacked and repeated (or cut) to exactly
/// `width * height` bits. Pixel `(x, y)` reads the 8-bit window starting at
/// bit `x + x * y` (missing bits read as zero), and samples noise at
/// `(x * scale + v * scales.x, y * scale + v * scales.y)`. Positive samples
/// set the pixel. Rows are packed MSB-first; a trailing partial byte is
/// left-aligned.
pub fn apply_perlin_noise(base: &[u8], scales: NoiseScales, geometry: PanelGeometry) -> Vec<u8> {
    let PanelGeometry { width, height } = geometry;
    let source = extend_cyclic(&BitString::from_bytes(base), width * height);

    let mut buffer = Vec::with_capacity(geometry.plane_len());
    for y in 0..height {
        let mut byte = 0u8;
        for x in 0..width {
            let v = window(&source, x + x * y);
            let bit = sample(x, y, v, scales) > 0.0;
            byte = (byte << 1) | u8::from(bit);
            if (x + 1) % 8 == 0 {
                buffer.push(byte);
                byte = 0;
            }
        }
        if width % 8 != 0 {
            buffer.push(byte << (8 - width % 8));
        }
    }
    buffer
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn sample(x: usize, y: usize, v: u8, scales: NoiseScales) -> f32 {
    let v = f64::from(v);
    let nx = x as f64 * scales.scale + v * scales.x;
    let ny = y as f64 * scales.scale + v * scales.y;
    pnoise2(nx as f32, ny as f32)
}

/// Repeat `bits` until exactly `total` long. Empty input counts as all zeros.
fn extend_cyclic(bits: &BitString, total: usize) -> Vec<bool> {
    let bits = bits.as_slice();
    if bits.is_empty() {
        return vec![false; total];
    }
    bits.iter().copied().cycle().take(total).collect()
}

/// Unsigned byte formed by the 8 bits at `start`, zero-filled past the end.
fn window(bits: &[bool], start: usize) -> u8 {
    (0..8).fold(0u8, |acc, k| {
        let bit = bits.get(start + k).copied().unwrap_or(false);
        (acc << 1) | u8::from(bit)
    })
}
