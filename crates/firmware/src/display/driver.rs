//! Waveshare 7.5" (B) V2 e-paper driver
//!
//! Blocking driver for the 800×480 black/white/red panel (UC8179-class
//! controller) over a Linux `spidev` device plus three GPIO lines.
//!
//! # Wiring (Raspberry Pi HAT, BCM numbering)
//!
//! | Signal | BCM pin | Direction |
//! |--------|---------|-----------|
//! | SCK    | 11 (SPI0 SCLK) | Host → Display |
//! | MOSI   | 10 (SPI0 MOSI) | Host → Display |
//! | CS     | Managed by `SpiDevice` | Host → Display |
//! | DC     | 25 | Host → Display |
//! | RST    | 17 | Host → Display |
//! | BUSY   | 24 | Display → Host |
//!
//! # Planes
//!
//! The controller has two 1bpp RAM planes. Data start transmission 1 (0x10)
//! takes the black/white plane with `1 = white`; data start transmission 2
//! (0x13) takes the red plane with `1 = red`. Callers hand in both planes with
//! `1 = ink`, so the black plane is inverted on upload and the accent plane is
//! sent as is.
//!
//! # BUSY
//!
//! BUSY is active LOW on this controller, and the pin is only refreshed after
//! a get-status command (0x71), so every poll re-sends 0x71 before sampling.

#![allow(clippy::cast_possible_truncation)]

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use platform::config::{PANEL_HEIGHT, PANEL_WIDTH};
use platform::{DisplayError, PanelDevice};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Largest single SPI write. `spidev` rejects transfers above its buffer
/// size (4096 bytes by default).
pub const SPI_CHUNK: usize = 4096;

/// BUSY poll interval in milliseconds.
const POLL_MS: u32 = 10;

/// Upper bound on BUSY polls: 4 000 × 10 ms = 40 s, comfortably above the
/// ~16 s tri-colour full refresh.
const MAX_BUSY_POLLS: u32 = 4_000;

/// Pause after BUSY releases before the next command.
const BUSY_SETTLE_MS: u32 = 200;

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// Controller command codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Panel setting, 1 data byte.
    PanelSetting = 0x00,
    /// Power setting, 4 data bytes.
    PowerSetting = 0x01,
    /// Power off, no data; wait BUSY after.
    PowerOff = 0x02,
    /// Power on, no data; wait BUSY after.
    PowerOn = 0x04,
    /// Booster soft start, 4 data bytes.
    BoosterSoftStart = 0x06,
    /// Deep sleep, 1 check byte (0xA5).
    DeepSleep = 0x07,
    /// Black/white plane data follows.
    DataStartTransmission1 = 0x10,
    /// Refresh the panel from RAM; wait BUSY after.
    DisplayRefresh = 0x12,
    /// Red plane data follows.
    DataStartTransmission2 = 0x13,
    /// Dual SPI mode, 1 data byte.
    DualSpi = 0x15,
    /// VCOM and data interval, 2 data bytes.
    VcomDataInterval = 0x50,
    /// TCON setting, 1 data byte.
    TconSetting = 0x60,
    /// Resolution, 4 data bytes (width hi/lo, height hi/lo).
    ResolutionSetting = 0x61,
    /// Get status; latches the BUSY pin.
    GetStatus = 0x71,
}

/// Deep sleep check code.
pub const DEEP_SLEEP_CHECK: u8 = 0xA5;

// ---------------------------------------------------------------------------
// Driver struct
// ---------------------------------------------------------------------------

/// Waveshare 7.5" (B) V2 driver.
///
/// Generic over:
/// - `SPI`: a blocking [`SpiDevice`] (manages CS).
/// - `DC`: Data/Command [`OutputPin`].
/// - `RST`: Reset [`OutputPin`].
/// - `BUSY`: Busy [`InputPin`] (LOW while busy).
/// - `DELAY`: [`DelayNs`] for timing.
///
/// On the Pi supply `linux_embedded_hal::SpidevDevice`, `CdevPin` and
/// `linux_embedded_hal::Delay`. In host tests supply the
/// `embedded_hal_mock::eh1` mocks and `NoopDelay`.
pub struct Epd7in5bV2<SPI, DC, RST, BUSY, DELAY> {
    spi: SPI,
    dc: DC,
    rst: RST,
    busy: BUSY,
    delay: DELAY,
    width: u32,
    height: u32,
}

impl<SPI, DC, RST, BUSY, DELAY> Epd7in5bV2<SPI, DC, RST, BUSY, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    /// Driver for the standard 800×480 panel.
    pub fn new(spi: SPI, dc: DC, rst: RST, busy: BUSY, delay: DELAY) -> Self {
        Self::with_resolution(spi, dc, rst, busy, delay, PANEL_WIDTH, PANEL_HEIGHT)
    }

    /// Driver for a controller configured with a different resolution.
    pub fn with_resolution(
        spi: SPI,
        dc: DC,
        rst: RST,
        busy: BUSY,
        delay: DELAY,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            spi,
            dc,
            rst,
            busy,
            delay,
            width,
            height,
        }
    }

    // -----------------------------------------------------------------------
    // Low-level SPI helpers
    // -----------------------------------------------------------------------

    /// DC low, then one command byte.
    fn send_command(&mut self, cmd: Command) -> Result<(), DisplayError> {
        self.dc.set_low().map_err(|_| DisplayError::Gpio)?;
        self.spi
            .write(&[cmd as u8])
            .map_err(|_| DisplayError::Communication)
    }

    /// DC high, then `data` in [`SPI_CHUNK`]-sized writes.
    fn send_data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        if data.is_empty() {
            return Ok(());
        }
        self.dc.set_high().map_err(|_| DisplayError::Gpio)?;
        for chunk in data.chunks(SPI_CHUNK) {
            self.spi
                .write(chunk)
                .map_err(|_| DisplayError::Communication)?;
        }
        Ok(())
    }

    fn cmd_data(&mut self, cmd: Command, data: &[u8]) -> Result<(), DisplayError> {
        self.send_command(cmd)?;
        self.send_data(data)
    }

    /// Send `len` copies of `fill` without allocating a full plane.
    fn send_fill(&mut self, fill: u8, len: usize) -> Result<(), DisplayError> {
        let chunk = [fill; SPI_CHUNK];
        self.dc.set_high().map_err(|_| DisplayError::Gpio)?;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(SPI_CHUNK);
            self.spi
                .write(&chunk[..n])
                .map_err(|_| DisplayError::Communication)?;
            remaining -= n;
        }
        Ok(())
    }

    /// Send `plane` with every byte inverted.
    fn send_inverted(&mut self, plane: &[u8]) -> Result<(), DisplayError> {
        let mut chunk = [0u8; SPI_CHUNK];
        self.dc.set_high().map_err(|_| DisplayError::Gpio)?;
        for src in plane.chunks(SPI_CHUNK) {
            let dst = &mut chunk[..src.len()];
            for (d, s) in dst.iter_mut().zip(src) {
                *d = !s;
            }
            self.spi
                .write(dst)
                .map_err(|_| DisplayError::Communication)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // BUSY polling
    // -----------------------------------------------------------------------

    /// Poll until BUSY goes HIGH (idle), then wait the settle time.
    ///
    /// Returns [`DisplayError::Timeout`] after [`MAX_BUSY_POLLS`] polls.
    fn wait_busy(&mut self) -> Result<(), DisplayError> {
        for _ in 0..MAX_BUSY_POLLS {
            self.send_command(Command::GetStatus)?;
            let idle = self.busy.is_high().map_err(|_| DisplayError::Gpio)?;
            if idle {
                self.delay.delay_ms(BUSY_SETTLE_MS);
                return Ok(());
            }
            self.delay.delay_ms(POLL_MS);
        }
        tracing::error!("panel BUSY never released");
        Err(DisplayError::Timeout)
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// RST HIGH 200 ms → LOW 4 ms → HIGH 200 ms.
    fn hardware_reset(&mut self) -> Result<(), DisplayError> {
        self.rst.set_high().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(200);
        self.rst.set_low().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(4);
        self.rst.set_high().map_err(|_| DisplayError::Gpio)?;
        self.delay.delay_ms(200);
        Ok(())
    }

    /// Bytes in one plane at the configured resolution.
    fn plane_bytes(&self) -> usize {
        (self.width as usize).div_ceil(8) * self.height as usize
    }

    fn check_plane(&self, plane: &[u8]) -> Result<(), DisplayError> {
        let expected = self.plane_bytes();
        if plane.len() == expected {
            Ok(())
        } else {
            Err(DisplayError::InvalidBuffer {
                expected,
                actual: plane.len(),
            })
        }
    }

    /// Refresh from RAM and wait for the panel to settle.
    fn refresh(&mut self) -> Result<(), DisplayError> {
        self.send_command(Command::DisplayRefresh)?;
        self.delay.delay_ms(100);
        self.wait_busy()
    }
}

// ---------------------------------------------------------------------------
// platform::PanelDevice implementation
// ---------------------------------------------------------------------------

impl<SPI, DC, RST, BUSY, DELAY> PanelDevice for Epd7in5bV2<SPI, DC, RST, BUSY, DELAY>
where
    SPI: SpiDevice + Send,
    DC: OutputPin + Send,
    RST: OutputPin + Send,
    BUSY: InputPin + Send,
    DELAY: DelayNs + Send,
{
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    /// Reset, power up and program panel/resolution/VCOM settings.
    fn init(&mut self) -> Result<(), DisplayError> {
        self.hardware_reset()?;

        // VGH/VGL ±20 V, VDH/VDL ±15 V
        self.cmd_data(Command::PowerSetting, &[0x07, 0x07, 0x3F, 0x3F])?;
        self.cmd_data(Command::BoosterSoftStart, &[0x17, 0x17, 0x28, 0x17])?;

        self.send_command(Command::PowerOn)?;
        self.delay.delay_ms(100);
        self.wait_busy()?;

        // KW-R mode, scan up, shift right, booster on
        self.cmd_data(Command::PanelSetting, &[0x0F])?;
        let [_, _, w_hi, w_lo] = self.width.to_be_bytes();
        let [_, _, h_hi, h_lo] = self.height.to_be_bytes();
        self.cmd_data(Command::ResolutionSetting, &[w_hi, w_lo, h_hi, h_lo])?;
        self.cmd_data(Command::DualSpi, &[0x00])?;
        self.cmd_data(Command::VcomDataInterval, &[0x11, 0x07])?;
        self.cmd_data(Command::TconSetting, &[0x22])?;
        tracing::debug!(width = self.width, height = self.height, "panel controller initialised");
        Ok(())
    }

    /// White black plane, empty red plane, full refresh.
    fn clear(&mut self) -> Result<(), DisplayError> {
        let len = self.plane_bytes();
        self.send_command(Command::DataStartTransmission1)?;
        self.send_fill(0xFF, len)?;
        self.send_command(Command::DataStartTransmission2)?;
        self.send_fill(0x00, len)?;
        self.refresh()
    }

    fn display(&mut self, black: &[u8], accent: &[u8]) -> Result<(), DisplayError> {
        self.check_plane(black)?;
        self.check_plane(accent)?;
        self.send_command(Command::DataStartTransmission1)?;
        self.send_inverted(black)?;
        self.cmd_data(Command::DataStartTransmission2, accent)?;
        self.refresh()
    }

    fn sleep(&mut self) -> Result<(), DisplayError> {
        self.send_command(Command::PowerOff)?;
        self.wait_busy()?;
        self.cmd_data(Command::DeepSleep, &[DEEP_SLEEP_CHECK])?;
        self.delay.delay_ms(2000);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
