//! MAX7219 daisy chain, bit-banged over three GPIO outputs
//!
//! Frames are 16 bits per module (register, then data), MSB-first, sampled on
//! the rising clock edge and latched when CS goes high. With `n` chained
//! modules one CS-low window carries `n` frames; the first frame shifted out
//! ends up in the module farthest from the controller.
//!
//! Uses `embedded_hal::digital::OutputPin` (v1.0); the Linux build hands in
//! `gpio-cdev` lines through `linux-embedded-hal`.

use embedded_hal::digital::{OutputPin, PinState};
use platform::config::DIGITS_PER_MODULE;
use platform::{DigitDriver, DisplayError};

use super::BLANK;

/// MAX7219 registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// Decode mode (0xFF = Code B on all digits)
    DecodeMode = 0x09,
    /// Segment current, 0x00..=0x0F
    Intensity = 0x0A,
    /// Number of scanned digits minus one
    ScanLimit = 0x0B,
    /// 0x00 = shutdown, 0x01 = normal operation
    Shutdown = 0x0C,
    /// 0x01 = all segments on
    DisplayTest = 0x0F,
}

impl Register {
    fn addr(self) -> u8 {
        self as u8
    }
}

/// Register set-up broadcast to every module on init, in order.
const INIT_SEQUENCE: [(Register, u8); 5] = [
    (Register::DecodeMode, 0xFF),
    (Register::Intensity, 0x0F),
    (Register::ScanLimit, DIGITS_PER_MODULE as u8 - 1),
    (Register::Shutdown, 0x01),
    (Register::DisplayTest, 0x00),
];

/// A chain of `modules` eight-digit MAX7219 modules.
pub struct Max7219Chain<DIN, CS, CLK> {
    din: DIN,
    cs: CS,
    clk: CLK,
    modules: usize,
}

impl<DIN, CS, CLK> Max7219Chain<DIN, CS, CLK>
where
    DIN: OutputPin,
    CS: OutputPin,
    CLK: OutputPin,
{
    /// Take ownership of the three lines. Call [`DigitDriver::init`] before
    /// writing digits.
    pub fn new(din: DIN, cs: CS, clk: CLK, modules: usize) -> Self {
        Self {
            din,
            cs,
            clk,
            modules,
        }
    }

    /// Release the pins.
    pub fn into_inner(self) -> (DIN, CS, CLK) {
        (self.din, self.cs, self.clk)
    }

    fn shift_out(&mut self, byte: u8) -> Result<(), DisplayError> {
        for bit in (0..8).rev() {
            self.clk.set_low().map_err(|_| DisplayError::Gpio)?;
            self.din
                .set_state(PinState::from((byte >> bit) & 1 == 1))
                .map_err(|_| DisplayError::Gpio)?;
            self.clk.set_high().map_err(|_| DisplayError::Gpio)?;
        }
        Ok(())
    }

    /// Run `frames` inside one CS-low window; CS is raised again on every
    /// exit path.
    fn frame(
        &mut self,
        frames: impl FnOnce(&mut Self) -> Result<(), DisplayError>,
    ) -> Result<(), DisplayError> {
        self.cs.set_low().map_err(|_| DisplayError::Gpio)?;
        let shifted = frames(self);
        let latched = self.cs.set_high().map_err(|_| DisplayError::Gpio);
        shifted.and(latched)
    }

    /// Write the same register value into every module.
    fn broadcast(&mut self, register: u8, data: u8) -> Result<(), DisplayError> {
        let modules = self.modules;
        self.frame(|chain| {
            for _ in 0..modules {
                chain.shift_out(register)?;
                chain.shift_out(data)?;
            }
            Ok(())
        })
    }
}

impl<DIN, CS, CLK> DigitDriver for Max7219Chain<DIN, CS, CLK>
where
    DIN: OutputPin + Send,
    CS: OutputPin + Send,
    CLK: OutputPin + Send,
{
    fn modules(&self) -> usize {
        self.modules
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        tracing::info!(modules = self.modules, "init MAX7219 chain");
        self.cs.set_high().map_err(|_| DisplayError::Gpio)?;
        for (register, value) in INIT_SEQUENCE {
            self.broadcast(register.addr(), value)?;
        }
        self.clear()
    }

    fn write_position(&mut self, position: u8, codes: &[u8]) -> Result<(), DisplayError> {
        let modules = self.modules;
        self.frame(|chain| {
            // Farthest module first.
            for module in (0..modules).rev() {
                chain.shift_out(position)?;
                chain.shift_out(codes.get(module).copied().unwrap_or(BLANK))?;
            }
            Ok(())
        })
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        self.cs.set_high().map_err(|_| DisplayError::Gpio)
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        for position in 1..=DIGITS_PER_MODULE as u8 {
            self.broadcast(position, BLANK)?;
        }
        Ok(())
    }
}
