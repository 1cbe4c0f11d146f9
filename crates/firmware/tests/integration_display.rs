//! Display integration tests: the panel controller driving the real
//! Waveshare driver over embedded-hal mocks.
//!
//! A 16×2 resolution keeps every plane at four bytes so the full SPI traffic
//! of bring-up, clear and a worker draw can be spelled out.
//!
//! Run with: cargo test -p firmware --test integration_display
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};
use firmware::display::Command;
use firmware::{Epd7in5bV2, PanelController};
use pattern::{render, DrawTask, PanelGeometry};
use platform::mocks::MockClock;
use platform::{BusArbiter, DisplayError};

const SEED: f64 = 1_712_345_678.0;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build the three SPI expectations that correspond to one `spi.write(&data)` call
/// via the `SpiDevice` trait.
fn spi_device_write(data: &[u8]) -> [SpiTransaction<u8>; 3] {
    [
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(data.to_vec()),
        SpiTransaction::transaction_end(),
    ]
}

#[derive(Default)]
struct Traffic {
    spi: Vec<SpiTransaction<u8>>,
    dc: Vec<PinTransaction>,
    busy: Vec<PinTransaction>,
}

impl Traffic {
    fn cmd(mut self, c: Command) -> Self {
        self.dc.push(PinTransaction::set(PinState::Low));
        self.spi.extend(spi_device_write(&[c as u8]));
        self
    }

    fn data(mut self, bytes: &[u8]) -> Self {
        self.dc.push(PinTransaction::set(PinState::High));
        self.spi.extend(spi_device_write(bytes));
        self
    }

    /// One status poll that finds the controller idle.
    fn ready(mut self) -> Self {
        self = self.cmd(Command::GetStatus);
        self.busy.push(PinTransaction::get(PinState::High));
        self
    }

    fn init(self) -> Self {
        self.cmd(Command::PowerSetting)
            .data(&[0x07, 0x07, 0x3F, 0x3F])
            .cmd(Command::BoosterSoftStart)
            .data(&[0x17, 0x17, 0x28, 0x17])
            .cmd(Command::PowerOn)
            .ready()
            .cmd(Command::PanelSetting)
            .data(&[0x0F])
            .cmd(Command::ResolutionSetting)
            .data(&[0x00, 0x10, 0x00, 0x02])
            .cmd(Command::DualSpi)
            .data(&[0x00])
            .cmd(Command::VcomDataInterval)
            .data(&[0x11, 0x07])
            .cmd(Command::TconSetting)
            .data(&[0x22])
    }
}

fn reset_pin() -> PinMock {
    PinMock::new(&[
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
    ])
}

// ---------------------------------------------------------------------------
// Test: bring-up, clear and one draw, byte for byte
// ---------------------------------------------------------------------------

#[test]
fn test_clear_then_draw_traffic() {
    let task = DrawTask {
        block_size: 2,
        hash_mode: 1,
        ..DrawTask::default()
    };
    let black = render(&task, &[SEED], PanelGeometry::new(16, 2));
    let inverted: Vec<u8> = black.iter().map(|b| !b).collect();

    let traffic = Traffic::default()
        .init()
        // clear
        .cmd(Command::DataStartTransmission1)
        .data(&[0xFF; 4])
        .cmd(Command::DataStartTransmission2)
        .data(&[0x00; 4])
        .cmd(Command::DisplayRefresh)
        .ready()
        // worker draw: blank accent plane
        .cmd(Command::DataStartTransmission1)
        .data(&inverted)
        .cmd(Command::DataStartTransmission2)
        .data(&[0x00; 4])
        .cmd(Command::DisplayRefresh)
        .ready();

    let mut spi = SpiMock::new(&traffic.spi);
    let mut dc = PinMock::new(&traffic.dc);
    let mut rst = reset_pin();
    let mut busy = PinMock::new(&traffic.busy);
    let epd = Epd7in5bV2::with_resolution(
        spi.clone(),
        dc.clone(),
        rst.clone(),
        busy.clone(),
        NoopDelay,
        16,
        2,
    );

    let arbiter = Arc::new(BusArbiter::new(Duration::ZERO));
    let ctl = PanelController::new(epd, Arc::clone(&arbiter), Arc::new(MockClock::new(SEED)));
    ctl.clear().unwrap();
    ctl.draw_async(task).unwrap();
    assert!(ctl.shutdown(Duration::from_secs(5)));
    assert!(!arbiter.is_busy());

    spi.done();
    dc.done();
    rst.done();
    busy.done();
}

// ---------------------------------------------------------------------------
// Test: the worker renders at the driver's resolution
// ---------------------------------------------------------------------------

#[test]
fn test_worker_geometry_matches_driver() {
    let mut spi = SpiMock::new(&[]);
    let mut pins = [
        PinMock::new(&[]),
        PinMock::new(&[]),
        PinMock::new(&[]),
    ];
    let epd = Epd7in5bV2::with_resolution(
        spi.clone(),
        pins[0].clone(),
        pins[1].clone(),
        pins[2].clone(),
        NoopDelay,
        10,
        3,
    );
    let ctl = PanelController::new(
        epd,
        Arc::new(BusArbiter::new(Duration::ZERO)),
        Arc::new(MockClock::new(SEED)),
    );
    assert_eq!(ctl.geometry(), PanelGeometry::new(10, 3));
    assert_eq!(ctl.geometry().plane_len(), 6);

    spi.done();
    for pin in &mut pins {
        pin.done();
    }
}

// ---------------------------------------------------------------------------
// Test: DisplayError formatting
// ---------------------------------------------------------------------------

/// Verify all error variants have non-empty Display strings.
#[test]
fn test_display_error_variants_have_descriptions() {
    let variants = [
        DisplayError::Communication,
        DisplayError::Gpio,
        DisplayError::Timeout,
        DisplayError::InvalidBuffer {
            expected: 48_000,
            actual: 12,
        },
        DisplayError::InitFailed,
    ];

    for variant in variants {
        let s = variant.to_string();
        assert!(
            !s.is_empty(),
            "DisplayError::{variant:?} must have a non-empty Display string"
        );
    }
    assert_eq!(
        DisplayError::InvalidBuffer {
            expected: 48_000,
            actual: 12
        }
        .to_string(),
        "display buffer is 12 bytes, expected 48000"
    );
}
