//! `cargo xtask preview`: render a draw task to a PNG on the host.
//!
//! Uses the same `pattern::render` call as the panel worker, so the image is
//! exactly what the panel would show for that task and seed (set bits are
//! black).

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use image::{GrayImage, Luma};
use pattern::{render, DrawTask, NoiseScales, PanelGeometry};
use platform::config::{PANEL_HEIGHT, PANEL_WIDTH};
use platform::{Clock, SystemClock};

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Tile edge in pixels
    #[arg(long, default_value_t = 10)]
    pub block_size: usize,
    /// Digest selector (0..=10, anything else falls back to SHA-256)
    #[arg(long, default_value_t = 0)]
    pub hash_mode: u8,
    /// Modulate the tiles with Perlin noise
    #[arg(long)]
    pub perlin: bool,
    /// Overall noise scale
    #[arg(long, default_value_t = NoiseScales::DEFAULT.scale)]
    pub scale: f64,
    /// Horizontal noise scale
    #[arg(long, default_value_t = NoiseScales::DEFAULT.x)]
    pub scale_x: f64,
    /// Vertical noise scale
    #[arg(long, default_value_t = NoiseScales::DEFAULT.y)]
    pub scale_y: f64,
    /// Seed (Unix seconds); defaults to now
    #[arg(long)]
    pub seed: Option<f64>,
    /// Image width in pixels
    #[arg(long, default_value_t = PANEL_WIDTH as usize)]
    pub width: usize,
    /// Image height in pixels
    #[arg(long, default_value_t = PANEL_HEIGHT as usize)]
    pub height: usize,
    /// Output file
    #[arg(short, long, default_value = "preview.png")]
    pub output: PathBuf,
}

impl PreviewArgs {
    fn task(&self) -> DrawTask {
        DrawTask {
            block_size: self.block_size,
            hash_mode: self.hash_mode,
            perlin: self.perlin,
            scales: NoiseScales {
                scale: self.scale,
                x: self.scale_x,
                y: self.scale_y,
            },
        }
    }
}

pub fn run(args: &PreviewArgs) -> Result<()> {
    anyhow::ensure!(
        args.width > 0 && args.height > 0,
        "preview size must be non-zero, got {}x{}",
        args.width,
        args.height
    );

    let seed = args.seed.unwrap_or_else(|| SystemClock.unix_seconds());
    let task = args.task();
    println!();
    println!(
        "{}",
        format!("🎨 Rendering {}x{} preview...", args.width, args.height)
            .cyan()
            .bold()
    );
    println!("   {}", format!("{task:?}").dimmed());
    println!("   {}", format!("seed = {seed}").dimmed());

    let start = Instant::now();
    write_png(&task, seed, args.width, args.height, &args.output)?;

    println!(
        "{}",
        format!(
            "✓ Wrote {} in {:.2}s",
            args.output.display(),
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    Ok(())
}

/// Convert a packed 1-bit plane into a grayscale image.
fn plane_to_image(plane: &[u8], geometry: PanelGeometry) -> Result<GrayImage> {
    anyhow::ensure!(
        plane.len() == geometry.plane_len(),
        "plane is {} bytes, expected {}",
        plane.len(),
        geometry.plane_len()
    );
    let width = u32::try_from(geometry.width).context("width too large")?;
    let height = u32::try_from(geometry.height).context("height too large")?;
    let row_bytes = geometry.row_bytes();

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let byte = plane[y * row_bytes + x / 8];
        let set = byte & (0x80 >> (x % 8)) != 0;
        Luma([if set { 0 } else { 255 }])
    }))
}

fn write_png(task: &DrawTask, seed: f64, width: usize, height: usize, path: &Path) -> Result<()> {
    let geometry = PanelGeometry::new(width, height);
    let plane = render(task, &[seed], geometry);
    let image = plane_to_image(&plane, geometry)?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_bits_map_to_black_pixels() {
        let geometry = PanelGeometry::new(10, 2);
        // Row 0: first pixel set, row 1: ninth and tenth set.
        let plane = [0x80, 0x00, 0x00, 0xC0];
        let image = plane_to_image(&plane, geometry).unwrap();

        assert_eq!(image.dimensions(), (10, 2));
        assert_eq!(image.get_pixel(0, 0), &Luma([0]));
        assert_eq!(image.get_pixel(1, 0), &Luma([255]));
        assert_eq!(image.get_pixel(8, 1), &Luma([0]));
        assert_eq!(image.get_pixel(9, 1), &Luma([0]));
        assert_eq!(image.get_pixel(7, 1), &Luma([255]));
    }

    #[test]
    fn test_wrong_plane_size_is_rejected() {
        assert!(plane_to_image(&[0; 3], PanelGeometry::new(16, 2)).is_err());
    }

    #[test]
    fn test_preview_writes_decodable_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern.png");
        let task = DrawTask {
            block_size: 4,
            hash_mode: 2,
            ..DrawTask::default()
        };
        write_png(&task, 1_700_000_000.0, 40, 24, &path).unwrap();

        let decoded = image::open(&path).unwrap().into_luma8();
        assert_eq!(decoded.dimensions(), (40, 24));
        let geometry = PanelGeometry::new(40, 24);
        let plane = render(&task, &[1_700_000_000.0], geometry);
        assert_eq!(decoded, plane_to_image(&plane, geometry).unwrap());
    }

    #[test]
    fn test_args_build_task() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: PreviewArgs,
        }

        let w = Wrapper::parse_from([
            "xtask",
            "--block-size",
            "3",
            "--hash-mode",
            "7",
            "--perlin",
        ]);
        let task = w.args.task();
        assert_eq!(task.block_size, 3);
        assert_eq!(task.hash_mode, 7);
        assert!(task.perlin);
        assert_eq!(task.scales, NoiseScales::DEFAULT);
        assert_eq!(w.args.width, PANEL_WIDTH as usize);
    }
}
