//! Application configuration and constants
//!
//! This module defines central configuration values used across the application.
//! Runtime-tunable values (pins, device paths) live in `firmware::config`;
//! everything here is a fixed property of the device or its timing model.

use std::time::Duration;

/// The application name
pub const APP_NAME: &str = "Noise Clock";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// E-paper panel width in pixels (Waveshare 7.5" (B) V2).
pub const PANEL_WIDTH: u32 = 800;

/// E-paper panel height in pixels (Waveshare 7.5" (B) V2).
pub const PANEL_HEIGHT: u32 = 480;

/// Digit positions per MAX7219 module.
pub const DIGITS_PER_MODULE: usize = 8;

/// Number of daisy-chained MAX7219 modules (clock, latitude, longitude).
pub const MODULE_COUNT: usize = 3;

/// Delay before and after every busy-bracketed panel transaction.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// How long the digit loop backs off when it finds the bus busy.
pub const BUSY_BACKOFF: Duration = Duration::from_millis(50);

/// Digit display refresh period.
pub const REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// Pause after an unexpected digit loop error before re-baselining.
pub const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Button releases shorter than this are treated as bounce, not a toggle.
pub const MIN_PRESS: Duration = Duration::from_millis(50);

/// Bounded join applied to background threads on shutdown.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest wait for queued panel draws to finish, on shutdown or before a
/// clear. A full refresh of the tri-colour panel takes well over ten seconds.
pub const PANEL_DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Start-up banner logged by the binary
pub fn banner() -> String {
    format!("{APP_NAME} v{APP_VERSION}")
}
