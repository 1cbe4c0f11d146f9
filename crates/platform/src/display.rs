//! Display abstraction layer
//!
//! Two very different output devices share the bus: a tri-colour e-paper
//! panel ([`PanelDevice`]) and a chain of MAX7219 seven-segment modules
//! ([`DigitDriver`]). Both traits are blocking and are only ever called from
//! inside a [`crate::BusArbiter`] critical section.

/// E-paper panel driver trait.
///
/// Buffers are 1 bit per pixel, MSB-first, `ceil(width / 8) * height` bytes,
/// with `1` meaning "ink" on the respective plane.
pub trait PanelDevice: Send {
    /// Panel width in pixels.
    fn width(&self) -> u32;

    /// Panel height in pixels.
    fn height(&self) -> u32;

    /// Bytes in one full-screen plane.
    fn plane_len(&self) -> usize {
        (self.width() as usize).div_ceil(8) * self.height() as usize
    }

    /// Hardware bring-up: reset and power the controller.
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Blank both the black/white and the accent plane and refresh.
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Upload both planes and trigger a full refresh.
    fn display(&mut self, black: &[u8], accent: &[u8]) -> Result<(), DisplayError>;

    /// Power down into deep sleep. [`PanelDevice::init`] wakes it again.
    fn sleep(&mut self) -> Result<(), DisplayError>;
}

/// Seven-segment chain driver trait.
///
/// Codes use MAX7219 "Code B" decoding: `0..=9` digits, `0x0A` minus,
/// `0x0F` blank, `| 0x80` lights the decimal point.
pub trait DigitDriver: Send {
    /// Number of chained modules.
    fn modules(&self) -> usize;

    /// Program decode mode, intensity, scan limit and wake the chain.
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Latch one digit position (1-based) on every module at once.
    ///
    /// `codes[i]` is the code for module `i`; missing modules get blank.
    fn write_position(&mut self, position: u8, codes: &[u8]) -> Result<(), DisplayError>;

    /// Leave the bus in its idle state (chip deselected).
    fn release(&mut self) -> Result<(), DisplayError>;

    /// Blank every digit of every module.
    fn clear(&mut self) -> Result<(), DisplayError>;
}

/// Display errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DisplayError {
    /// SPI transfer failed
    #[error("display communication error")]
    Communication,
    /// A control pin could not be driven or read
    #[error("display GPIO error")]
    Gpio,
    /// The controller never released its BUSY line
    #[error("display busy timeout")]
    Timeout,
    /// Buffer length does not match the panel geometry
    #[error("display buffer is {actual} bytes, expected {expected}")]
    InvalidBuffer {
        /// Required plane length
        expected: usize,
        /// Length supplied by the caller
        actual: usize,
    },
    /// The device reported a failed bring-up
    #[error("display initialization failed")]
    InitFailed,
}
