//! Deterministic pattern generation for the e-paper panel
//!
//! Turns a numeric seed into a 1-bit-per-pixel plane in three steps:
//!
//! 1. [`numbers_to_bitstring`] - seed → bit string (normalisation or digest)
//! 2. [`make_buffer_from_bitstring`] - bit string → tiled plane
//! 3. [`apply_perlin_noise`] - optional noise modulation of the tiled plane
//!
//! Everything here is pure: no I/O, no threads, no shared state. The same
//! seed and [`DrawTask`] always produce the same bytes.
//!
//! # Example
//!
//! ```
//! use pattern::{render, DrawTask, PanelGeometry};
//!
//! let geometry = PanelGeometry::new(16, 4);
//! let task = DrawTask { block_size: 2, ..DrawTask::default() };
//! let plane = render(&task, &[1_700_000_000.5], geometry);
//! assert_eq!(plane.len(), geometry.plane_len());
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing over println! in lib code
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bits;
pub mod noise;
pub mod perlin;
pub mod seed;
pub mod tiling;

pub use bits::{BitString, ParseBitsError};
pub use noise::{apply_perlin_noise, NoiseScales};
pub use perlin::pnoise2;
pub use seed::{float_text, numbers_to_bitstring, HashMode};
pub use tiling::make_buffer_from_bitstring;

/// Pixel dimensions of a 1-bpp plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelGeometry {
    /// Pixels per row
    pub width: usize,
    /// Rows
    pub height: usize,
}

impl PanelGeometry {
    /// Geometry of a `width` × `height` panel.
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Bytes per row, rounding a partial byte up.
    pub const fn row_bytes(&self) -> usize {
        self.width.div_ceil(8)
    }

    /// Bytes in one full plane.
    pub const fn plane_len(&self) -> usize {
        self.row_bytes() * self.height
    }
}

impl Default for PanelGeometry {
    /// 7.5" panel, 800×480.
    fn default() -> Self {
        Self::new(800, 480)
    }
}

/// Parameters of one pattern draw. Consumed once by the panel worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawTask {
    /// Cell edge length in pixels; values below 1 are treated as 1.
    pub block_size: usize,
    /// Seed conversion, see [`HashMode::from_index`].
    pub hash_mode: u8,
    /// Modulate the tiled plane with Perlin noise.
    pub perlin: bool,
    /// Noise scales, used only when `perlin` is set.
    pub scales: NoiseScales,
}

impl Default for DrawTask {
    fn default() -> Self {
        Self {
            block_size: 10,
            hash_mode: 0,
            perlin: false,
            scales: NoiseScales::DEFAULT,
        }
    }
}

/// Render the black plane for `task` from `seed`.
pub fn render(task: &DrawTask, seed: &[f64], geometry: PanelGeometry) -> Vec<u8> {
    let mode = HashMode::from_index(task.hash_mode);
    let bits = numbers_to_bitstring(seed, mode);
    tracing::debug!(
        ?mode,
        bits = bits.len(),
        block_size = task.block_size,
        "seed converted"
    );

    let tiled = make_buffer_from_bitstring(&bits, task.block_size, geometry);
    if task.perlin {
        apply_perlin_noise(&tiled, task.scales, geometry)
    } else {
        tiled
    }
}
