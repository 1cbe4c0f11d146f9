//! Noise Clock - Raspberry Pi entry point.
//!
//! Wires the Linux userspace HAL (spidev + gpio-cdev) into the application
//! components, then idles until Ctrl-C.
//!
//! Button inputs are read active-low; the pull-ups are expected to be set in
//! the device tree (`gpio=23,26=ip,pu` in `config.txt`).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use linux_embedded_hal::{
    gpio_cdev::{Chip, LineRequestFlags},
    spidev::{SpiModeFlags, SpidevOptions},
    CdevPin, Delay, SpidevDevice,
};
use tracing_subscriber::EnvFilter;

use firmware::location::IpGeolocator;
use firmware::{
    ButtonPoller, DigitDisplay, Epd7in5bV2, LocationCache, Max7219Chain, ModeController,
    PanelController, RefreshTiming, Settings,
};
use platform::config::{banner, JOIN_TIMEOUT, PANEL_DRAIN_TIMEOUT};
use platform::{join_with_timeout, BusArbiter, Button, Clock, StopSignal, SystemClock};

fn main() -> Result<()> {
    let settings = Settings::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("{}", banner());
    tracing::debug!(?settings, "settings");

    let arbiter = Arc::new(BusArbiter::new(settings.settle()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let geolocator = IpGeolocator::new(settings.geolocation_url.as_str())
        .context("creating geolocation client")?;
    let location = LocationCache::new(geolocator);

    let mut chip = Chip::new(&settings.gpio_chip)
        .with_context(|| format!("opening {}", settings.gpio_chip.display()))?;

    // Seven-segment chain (bit-banged)
    let chain = Max7219Chain::new(
        output(&mut chip, settings.din_pin, 0, "noise-clock-din")?,
        output(&mut chip, settings.cs_pin, 1, "noise-clock-cs")?,
        output(&mut chip, settings.clk_pin, 0, "noise-clock-clk")?,
        settings.module_count(),
    );
    let digits = Arc::new(
        DigitDisplay::start(
            chain,
            Arc::clone(&arbiter),
            Arc::clone(&clock),
            location.clone(),
            RefreshTiming::default(),
        )
        .context("starting digit display")?,
    );

    // E-paper panel (SPI0 + DC/RST/BUSY)
    let epd = Epd7in5bV2::new(
        open_spi(&settings)?,
        output(&mut chip, settings.dc_pin, 0, "noise-clock-dc")?,
        output(&mut chip, settings.rst_pin, 1, "noise-clock-rst")?,
        input(&mut chip, settings.busy_pin, "noise-clock-busy")?,
        Delay,
    );
    let panel = Arc::new(PanelController::new(epd, Arc::clone(&arbiter), Arc::clone(&clock)));

    let modes = Arc::new(ModeController::new(
        Arc::clone(&panel) as Arc<dyn firmware::PatternSink>,
        Arc::clone(&digits) as Arc<dyn firmware::SegmentControl>,
        location,
    ));
    // Start from a blank panel in IDLE; a failed clear is only a warning.
    modes.reset();

    let stop = StopSignal::new();
    let mut pollers = Vec::new();
    for (button, line, debounce) in [
        (Button::Toggle, settings.toggle_pin, settings.toggle_debounce()),
        (Button::Reset, settings.reset_pin, settings.reset_debounce()),
    ] {
        let pin = input(&mut chip, line, &format!("noise-clock-{}", button.name()))?;
        let modes = Arc::clone(&modes);
        let handle = ButtonPoller::new(button, pin, debounce)
            .spawn(stop.clone(), move |event| modes.handle(event))
            .with_context(|| format!("starting {} button poller", button.name()))?;
        pollers.push(handle);
    }

    tracing::info!("system ready");
    wait_for_ctrl_c()?;
    tracing::info!("shutting down");

    stop.stop();
    for handle in pollers {
        join_with_timeout(handle, JOIN_TIMEOUT);
    }
    digits.stop(JOIN_TIMEOUT);
    if panel.shutdown(PANEL_DRAIN_TIMEOUT) {
        if let Err(e) = panel.sleep() {
            tracing::warn!(error = %e, "panel sleep failed");
        }
    }
    Ok(())
}

fn open_spi(settings: &Settings) -> Result<SpidevDevice> {
    let mut spi = SpidevDevice::open(&settings.spi_device)
        .with_context(|| format!("opening {}", settings.spi_device.display()))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(settings.spi_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options).context("configuring SPI")?;
    Ok(spi)
}

fn output(chip: &mut Chip, line: u32, initial: u8, consumer: &str) -> Result<CdevPin> {
    let handle = chip
        .get_line(line)
        .with_context(|| format!("getting GPIO line {line}"))?
        .request(LineRequestFlags::OUTPUT, initial, consumer)
        .with_context(|| format!("requesting GPIO line {line} as output"))?;
    CdevPin::new(handle).with_context(|| format!("creating pin for GPIO line {line}"))
}

fn input(chip: &mut Chip, line: u32, consumer: &str) -> Result<CdevPin> {
    let handle = chip
        .get_line(line)
        .with_context(|| format!("getting GPIO line {line}"))?
        .request(LineRequestFlags::INPUT, 0, consumer)
        .with_context(|| format!("requesting GPIO line {line} as input"))?;
    CdevPin::new(handle).with_context(|| format!("creating pin for GPIO line {line}"))
}

/// Block the main thread until SIGINT.
fn wait_for_ctrl_c() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("waiting for Ctrl-C")
}
