//! Seven-segment clock/location display
//!
//! Three MAX7219 modules of eight digits each show, from module 0:
//!
//! ```text
//!  [ unix time mod 10^8 | frozen value ]  [ latitude ]  [ longitude ]
//! ```
//!
//! A background loop refreshes the chain about once a second. It is the
//! lowest-priority bus user: whenever the panel is busy it backs off, and a
//! refresh already under way is abandoned at the next digit position.

pub mod max7219;

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use platform::config::{BUSY_BACKOFF, DIGITS_PER_MODULE, ERROR_BACKOFF, REFRESH_PERIOD};
use platform::{join_with_timeout, lock, BusArbiter, Clock, DigitDriver, DisplayError, StopSignal};

use crate::location::LocationCache;
use crate::mode::DisplayMode;

pub use max7219::Max7219Chain;

/// Code B blank.
pub const BLANK: u8 = 0x0F;
/// Code B minus sign.
pub const MINUS: u8 = 0x0A;
/// Decimal point bit, OR-ed into a digit code.
pub const DECIMAL_POINT: u8 = 0x80;

/// Per-module digit codes, index 0 feeds digit position 1.
pub type DigitCodes = heapless::Vec<u8, DIGITS_PER_MODULE>;

/// Convert `text` into one module's worth of Code B digits.
///
/// `.` lights the decimal point of the preceding digit and takes no slot of
/// its own. Digits and `-` take a slot, as does any other character (shown
/// blank). Input past the eighth slot is dropped, short input is padded with
/// blanks, and the result is reversed so the last character lands on the
/// rightmost digit.
pub fn parse_digits(text: &str) -> DigitCodes {
    let mut codes = DigitCodes::new();
    for ch in text.chars() {
        if codes.is_full() {
            break;
        }
        let code = match ch {
            '.' => {
                if let Some(last) = codes.last_mut() {
                    *last |= DECIMAL_POINT;
                }
                continue;
            }
            '0'..='9' => ch as u8 - b'0',
            '-' => MINUS,
            _ => BLANK,
        };
        // Cannot fail: checked `is_full` above.
        let _ = codes.push(code);
    }
    while !codes.is_full() {
        let _ = codes.push(BLANK);
    }
    codes.reverse();
    codes
}

/// Format a coordinate for an eight-digit module.
///
/// Five, six or seven decimals for `>= 100`, `>= 10` and anything smaller,
/// zero-padded to width 9, then cut to 9 characters (10 for negatives). The
/// minus sign takes a digit of its own, so a negative value loses its last
/// decimal on the module.
pub fn format_coordinate(value: f64) -> String {
    let mut text = if value >= 100.0 {
        format!("{value:09.5}")
    } else if value >= 10.0 {
        format!("{value:09.6}")
    } else {
        format!("{value:09.7}")
    };
    let max = if value < 0.0 { 10 } else { 9 };
    if let Some((cut, _)) = text.char_indices().nth(max) {
        text.truncate(cut);
    }
    text
}

/// Unix seconds as the eight-digit clock field.
pub fn unix_time_field(unix_secs: u64) -> String {
    format!("{:08}", unix_secs % 100_000_000)
}

/// Loop timing. Tests shrink these; the defaults come from
/// [`platform::config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTiming {
    /// Target time between refreshes.
    pub period: Duration,
    /// Longest single wait for the panel to go idle.
    pub busy_backoff: Duration,
    /// Pause after a failed refresh.
    pub error_backoff: Duration,
}

impl Default for RefreshTiming {
    fn default() -> Self {
        Self {
            period: REFRESH_PERIOD,
            busy_backoff: BUSY_BACKOFF,
            error_backoff: ERROR_BACKOFF,
        }
    }
}

/// Digit display errors
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// Register set-up of the chain failed.
    #[error("digit chain initialization failed")]
    Init(#[source] DisplayError),
    /// The refresh thread could not be started.
    #[error("failed to start digit refresh thread")]
    Spawn(#[source] std::io::Error),
}

/// State shared between the refresh loop and its handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    /// Mirrored from the mode controller.
    pub mode: DisplayMode,
    /// Snapshot shown on module 0 instead of the live clock.
    pub frozen: Option<String>,
}

/// Entry point for the digit display.
pub struct DigitDisplay;

impl DigitDisplay {
    /// Fetch the location once, program the chain and start the refresh
    /// loop.
    pub fn start<D: DigitDriver + 'static>(
        mut driver: D,
        arbiter: Arc<BusArbiter>,
        clock: Arc<dyn Clock>,
        location: LocationCache,
        timing: RefreshTiming,
    ) -> Result<DigitDisplayHandle, SegmentError> {
        tracing::info!(modules = driver.modules(), "digit display init start");
        location.refresh();

        arbiter
            .with_bus(|| driver.init())
            .map_err(SegmentError::Init)?;

        let state = Arc::new(Mutex::new(DisplayState::default()));
        let stop = StopSignal::new();
        let refresh = RefreshLoop {
            driver,
            arbiter,
            clock: Arc::clone(&clock),
            location,
            state: Arc::clone(&state),
            stop: stop.clone(),
            timing,
        };
        let thread = thread::Builder::new()
            .name("digit-refresh".into())
            .spawn(move || refresh.run())
            .map_err(SegmentError::Spawn)?;
        tracing::info!("digit display init done");

        Ok(DigitDisplayHandle {
            state,
            clock,
            stop,
            thread: Mutex::new(Some(thread)),
        })
    }
}

/// Control handle for a running digit display.
pub struct DigitDisplayHandle {
    state: Arc<Mutex<DisplayState>>,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DigitDisplayHandle {
    /// Mirror the mode. Also drops any frozen value, so the next
    /// [`freeze`](Self::freeze) snapshots the clock afresh.
    pub fn set_mode(&self, mode: DisplayMode) {
        let mut state = lock(&self.state);
        state.mode = mode;
        state.frozen = None;
    }

    /// Pin module 0 to the current clock value. No-op if already frozen.
    pub fn freeze(&self) {
        let mut state = lock(&self.state);
        if state.frozen.is_none() {
            let value = unix_time_field(self.clock.unix_secs());
            tracing::debug!(%value, "digits frozen");
            state.frozen = Some(value);
        }
    }

    /// Return module 0 to the live clock.
    pub fn unfreeze(&self) {
        lock(&self.state).frozen = None;
    }

    /// Current mode and frozen value.
    pub fn state(&self) -> DisplayState {
        lock(&self.state).clone()
    }

    /// Stop the loop and join it, waiting at most `timeout`.
    pub fn stop(&self, timeout: Duration) -> bool {
        self.stop.stop();
        let Some(thread) = lock(&self.thread).take() else {
            return true;
        };
        let joined = join_with_timeout(thread, timeout);
        if !joined {
            tracing::warn!(?timeout, "digit refresh thread did not stop in time");
        }
        joined
    }
}

// ---------------------------------------------------------------------------
// Refresh loop
// ---------------------------------------------------------------------------

struct RefreshLoop<D> {
    driver: D,
    arbiter: Arc<BusArbiter>,
    clock: Arc<dyn Clock>,
    location: LocationCache,
    state: Arc<Mutex<DisplayState>>,
    stop: StopSignal,
    timing: RefreshTiming,
}

impl<D: DigitDriver> RefreshLoop<D> {
    fn run(mut self) {
        tracing::info!("digit refresh loop running");
        let mut next_tick = Instant::now();

        while !self.stop.is_stopped() {
            if self.arbiter.is_busy() {
                self.arbiter.wait_idle(self.timing.busy_backoff);
                next_tick = Instant::now() + self.timing.period;
                continue;
            }

            let pause = match self.tick() {
                Ok(()) => {
                    next_tick += self.timing.period;
                    let now = Instant::now();
                    if next_tick > now {
                        next_tick - now
                    } else {
                        next_tick = now;
                        Duration::ZERO
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "digit refresh failed");
                    next_tick = Instant::now() + self.timing.error_backoff;
                    self.timing.error_backoff
                }
            };
            if self.stop.wait_timeout(pause) {
                break;
            }
        }
        tracing::info!("digit refresh loop stopped");
    }

    fn tick(&mut self) -> Result<(), DisplayError> {
        let frozen = lock(&self.state).frozen.clone();
        let clock_field = frozen.unwrap_or_else(|| unix_time_field(self.clock.unix_secs()));
        let coords = self.location.ensure();

        let fields = [
            clock_field,
            format_coordinate(coords.lat),
            format_coordinate(coords.lng),
        ];
        self.render(&fields)
    }

    /// Write all eight positions, abandoning the rest as soon as the panel
    /// goes busy.
    fn render(&mut self, fields: &[String]) -> Result<(), DisplayError> {
        let parsed: Vec<DigitCodes> = fields.iter().map(|f| parse_digits(f)).collect();
        let modules = self.driver.modules();
        let mut column = Vec::with_capacity(modules);

        for (slot, position) in (1..=DIGITS_PER_MODULE as u8).enumerate() {
            if self.arbiter.is_busy() {
                tracing::debug!(position, "panel busy, digit refresh abandoned");
                return self.driver.release();
            }
            column.clear();
            column.extend((0..modules).map(|m| parsed.get(m).map_or(BLANK, |codes| codes[slot])));

            let written = self
                .arbiter
                .with_bus(|| self.driver.write_position(position, &column));
            if let Err(e) = written {
                // Leave the chip deselected even when the write failed.
                let _ = self.driver.release();
                return Err(e);
            }
        }
        Ok(())
    }
}
