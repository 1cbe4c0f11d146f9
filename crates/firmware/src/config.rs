//! Runtime settings.
//!
//! Every option can come from the command line or from a `NOISE_CLOCK_*`
//! environment variable; the defaults match the reference wiring on a
//! Raspberry Pi (BCM pin numbers).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use platform::config::MODULE_COUNT;

/// Noise clock settings
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "noise-clock", version, about = "E-paper noise patterns and a seven-segment clock")]
pub struct Settings {
    /// spidev node the e-paper panel is attached to
    #[arg(long, env = "NOISE_CLOCK_SPI_DEVICE", default_value = "/dev/spidev0.0")]
    pub spi_device: PathBuf,

    /// SPI clock for the panel, in Hz
    #[arg(long, env = "NOISE_CLOCK_SPI_SPEED_HZ", default_value_t = 4_000_000)]
    pub spi_speed_hz: u32,

    /// GPIO character device
    #[arg(long, env = "NOISE_CLOCK_GPIO_CHIP", default_value = "/dev/gpiochip0")]
    pub gpio_chip: PathBuf,

    /// Panel data/command line
    #[arg(long, env = "NOISE_CLOCK_DC_PIN", default_value_t = 25)]
    pub dc_pin: u32,

    /// Panel reset line
    #[arg(long, env = "NOISE_CLOCK_RST_PIN", default_value_t = 17)]
    pub rst_pin: u32,

    /// Panel busy line
    #[arg(long, env = "NOISE_CLOCK_BUSY_PIN", default_value_t = 24)]
    pub busy_pin: u32,

    /// MAX7219 data in
    #[arg(long, env = "NOISE_CLOCK_DIN_PIN", default_value_t = 16)]
    pub din_pin: u32,

    /// MAX7219 chip select
    #[arg(long, env = "NOISE_CLOCK_CS_PIN", default_value_t = 20)]
    pub cs_pin: u32,

    /// MAX7219 clock
    #[arg(long, env = "NOISE_CLOCK_CLK_PIN", default_value_t = 21)]
    pub clk_pin: u32,

    /// Toggle button (active low)
    #[arg(long, env = "NOISE_CLOCK_TOGGLE_PIN", default_value_t = 23)]
    pub toggle_pin: u32,

    /// Reset button (active low)
    #[arg(long, env = "NOISE_CLOCK_RESET_PIN", default_value_t = 26)]
    pub reset_pin: u32,

    /// Toggle button debounce, in milliseconds
    #[arg(long, env = "NOISE_CLOCK_TOGGLE_DEBOUNCE_MS", default_value_t = 50)]
    pub toggle_debounce_ms: u64,

    /// Reset button debounce, in milliseconds
    #[arg(long, env = "NOISE_CLOCK_RESET_DEBOUNCE_MS", default_value_t = 100)]
    pub reset_debounce_ms: u64,

    /// Number of chained seven-segment modules
    #[arg(
        long,
        env = "NOISE_CLOCK_MODULES",
        default_value_t = MODULE_COUNT as u8,
        value_parser = clap::value_parser!(u8).range(1..=8)
    )]
    pub modules: u8,

    /// Delay before and after every panel transaction, in milliseconds
    #[arg(long, env = "NOISE_CLOCK_SETTLE_MS", default_value_t = 100)]
    pub settle_ms: u64,

    /// IP geolocation endpoint (ipinfo.io-compatible JSON)
    #[arg(long, env = "NOISE_CLOCK_GEOLOCATION_URL", default_value = "https://ipinfo.io/json")]
    pub geolocation_url: String,
}

impl Settings {
    /// Settle delay around panel transactions.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Toggle button debounce.
    pub fn toggle_debounce(&self) -> Duration {
        Duration::from_millis(self.toggle_debounce_ms)
    }

    /// Reset button debounce.
    pub fn reset_debounce(&self) -> Duration {
        Duration::from_millis(self.reset_debounce_ms)
    }

    /// Number of chained modules.
    pub fn module_count(&self) -> usize {
        usize::from(self.modules)
    }
}

impl Default for Settings {
    /// The command-line defaults (environment overrides still apply).
    fn default() -> Self {
        Self::parse_from(["noise-clock"])
    }
}
