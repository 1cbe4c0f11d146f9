//! Mock implementations for testing
//!
//! This module provides recording implementations of all platform traits
//! for use in unit and integration tests. Each mock keeps its log behind an
//! `Arc`, so a test can hand the device to a controller thread and still
//! inspect what happened through a cloned handle.

#![cfg(any(test, feature = "mocks"))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::bus::lock;
use crate::*;

/// One call observed by [`MockPanel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCall {
    /// `init()`
    Init,
    /// `clear()`
    Clear,
    /// `display(black, accent)`
    Display {
        /// Black/white plane as uploaded
        black: Vec<u8>,
        /// Accent plane as uploaded
        accent: Vec<u8>,
    },
    /// `sleep()`
    Sleep,
}

#[derive(Debug, Default)]
struct PanelLog {
    calls: Vec<PanelCall>,
    busy_during_calls: Vec<bool>,
    fail_init: bool,
    fail_displays: usize,
}

/// Mock e-paper panel
pub struct MockPanel {
    width: u32,
    height: u32,
    latency: Duration,
    arbiter: Option<Arc<BusArbiter>>,
    log: Arc<Mutex<PanelLog>>,
}

/// Inspection handle for a [`MockPanel`] that has been moved elsewhere.
#[derive(Clone)]
pub struct MockPanelHandle {
    log: Arc<Mutex<PanelLog>>,
}

impl MockPanel {
    /// Create new mock panel
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            latency: Duration::ZERO,
            arbiter: None,
            log: Arc::default(),
        }
    }

    /// Make every call take `latency` (simulates the slow refresh).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Record whether `arbiter` reported busy during each call.
    pub fn observing(mut self, arbiter: Arc<BusArbiter>) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Handle for inspecting the call log.
    pub fn handle(&self) -> MockPanelHandle {
        MockPanelHandle {
            log: Arc::clone(&self.log),
        }
    }

    fn record(&self, call: PanelCall) {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let busy = self.arbiter.as_ref().is_some_and(|a| a.is_busy());
        let mut log = lock(&self.log);
        log.calls.push(call);
        log.busy_during_calls.push(busy);
    }
}

impl MockPanelHandle {
    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<PanelCall> {
        lock(&self.log).calls.clone()
    }

    /// Busy flag as seen by each call (only when built with `observing`).
    pub fn busy_during_calls(&self) -> Vec<bool> {
        lock(&self.log).busy_during_calls.clone()
    }

    /// Number of `display` calls so far.
    pub fn display_count(&self) -> usize {
        lock(&self.log)
            .calls
            .iter()
            .filter(|c| matches!(c, PanelCall::Display { .. }))
            .count()
    }

    /// Make `init` fail until reset with `false`.
    pub fn set_fail_init(&self, fail: bool) {
        lock(&self.log).fail_init = fail;
    }

    /// Make the next `count` `display` calls fail.
    pub fn fail_next_displays(&self, count: usize) {
        lock(&self.log).fail_displays = count;
    }
}

impl PanelDevice for MockPanel {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        self.record(PanelCall::Init);
        if lock(&self.log).fail_init {
            return Err(DisplayError::InitFailed);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.record(PanelCall::Clear);
        Ok(())
    }

    fn display(&mut self, black: &[u8], accent: &[u8]) -> Result<(), DisplayError> {
        self.record(PanelCall::Display {
            black: black.to_vec(),
            accent: accent.to_vec(),
        });
        let mut log = lock(&self.log);
        if log.fail_displays > 0 {
            log.fail_displays -= 1;
            return Err(DisplayError::Communication);
        }
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), DisplayError> {
        self.record(PanelCall::Sleep);
        Ok(())
    }
}

/// Hook run by [`MockDigits`] before each `write_position`.
pub type WriteHook = Box<dyn FnMut(u8) + Send>;

#[derive(Default)]
struct DigitLog {
    writes: Vec<(u8, Vec<u8>)>,
    releases: usize,
    inits: usize,
    fail_position: Option<u8>,
}

/// Mock seven-segment chain
pub struct MockDigits {
    modules: usize,
    hook: Option<WriteHook>,
    log: Arc<Mutex<DigitLog>>,
}

/// Inspection handle for a [`MockDigits`] that has been moved elsewhere.
#[derive(Clone)]
pub struct MockDigitsHandle {
    log: Arc<Mutex<DigitLog>>,
}

impl MockDigits {
    /// Create a chain of `modules` modules.
    pub fn new(modules: usize) -> Self {
        Self {
            modules,
            hook: None,
            log: Arc::default(),
        }
    }

    /// Run `hook(position)` before every position write.
    pub fn with_hook(mut self, hook: impl FnMut(u8) + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Handle for inspecting the write log.
    pub fn handle(&self) -> MockDigitsHandle {
        MockDigitsHandle {
            log: Arc::clone(&self.log),
        }
    }
}

impl MockDigitsHandle {
    /// Every `(position, codes)` latched so far.
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        lock(&self.log).writes.clone()
    }

    /// Number of `release` calls so far.
    pub fn releases(&self) -> usize {
        lock(&self.log).releases
    }

    /// Number of `init` calls so far.
    pub fn inits(&self) -> usize {
        lock(&self.log).inits
    }

    /// Fail every write to `position`.
    pub fn fail_position(&self, position: Option<u8>) {
        lock(&self.log).fail_position = position;
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        let mut log = lock(&self.log);
        log.writes.clear();
        log.releases = 0;
    }
}

impl DigitDriver for MockDigits {
    fn modules(&self) -> usize {
        self.modules
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        lock(&self.log).inits += 1;
        Ok(())
    }

    fn write_position(&mut self, position: u8, codes: &[u8]) -> Result<(), DisplayError> {
        if let Some(hook) = self.hook.as_mut() {
            hook(position);
        }
        let mut log = lock(&self.log);
        if log.fail_position == Some(position) {
            return Err(DisplayError::Gpio);
        }
        log.writes.push((position, codes.to_vec()));
        Ok(())
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        lock(&self.log).releases += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Mock location provider: replays scripted answers, then repeats `fallback`.
pub struct MockLocation {
    script: VecDeque<Result<Coordinates, LocationError>>,
    fallback: Result<Coordinates, LocationError>,
    lookups: Arc<AtomicU64>,
}

impl MockLocation {
    /// Always answer `coords`.
    pub fn fixed(coords: Coordinates) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Ok(coords),
            lookups: Arc::default(),
        }
    }

    /// Always fail with [`LocationError::Unavailable`].
    pub fn unavailable() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Err(LocationError::Unavailable),
            lookups: Arc::default(),
        }
    }

    /// Answer `script` in order before falling back.
    pub fn scripted(
        script: impl IntoIterator<Item = Result<Coordinates, LocationError>>,
        fallback: Result<Coordinates, LocationError>,
    ) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback,
            lookups: Arc::default(),
        }
    }

    /// Shared counter of `lookup` calls.
    pub fn lookup_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.lookups)
    }
}

impl LocationProvider for MockLocation {
    fn lookup(&mut self) -> Result<Coordinates, LocationError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Settable [`Clock`].
#[derive(Debug, Clone)]
pub struct MockClock {
    bits: Arc<AtomicU64>,
}

impl MockClock {
    /// Clock frozen at `unix_seconds`.
    pub fn new(unix_seconds: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(unix_seconds.to_bits())),
        }
    }

    /// Jump to `unix_seconds`.
    pub fn set(&self, unix_seconds: f64) {
        self.bits.store(unix_seconds.to_bits(), Ordering::SeqCst);
    }

    /// Move forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        self.set(self.unix_seconds() + seconds);
    }
}

impl Clock for MockClock {
    fn unix_seconds(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_panel_records_calls() {
        let mut panel = MockPanel::new(16, 2);
        let handle = panel.handle();

        panel.init().unwrap();
        panel.display(&[1, 2, 3, 4], &[0; 4]).unwrap();
        panel.clear().unwrap();

        assert_eq!(handle.display_count(), 1);
        assert_eq!(handle.calls().first(), Some(&PanelCall::Init));
        assert_eq!(handle.calls().last(), Some(&PanelCall::Clear));
    }

    #[test]
    fn test_mock_panel_injected_failures() {
        let mut panel = MockPanel::new(8, 1);
        let handle = panel.handle();

        handle.set_fail_init(true);
        assert_eq!(panel.init(), Err(DisplayError::InitFailed));

        handle.fail_next_displays(1);
        assert_eq!(panel.display(&[0], &[0]), Err(DisplayError::Communication));
        assert!(panel.display(&[0], &[0]).is_ok());
    }

    #[test]
    fn test_mock_digits_hook_and_failure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut digits = MockDigits::new(3).with_hook(move |p| sink.lock().unwrap().push(p));
        let handle = digits.handle();

        digits.write_position(1, &[1, 2, 3]).unwrap();
        handle.fail_position(Some(2));
        assert_eq!(digits.write_position(2, &[1, 2, 3]), Err(DisplayError::Gpio));
        digits.release().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(handle.writes(), vec![(1, vec![1, 2, 3])]);
        assert_eq!(handle.releases(), 1);
    }

    #[test]
    fn test_mock_location_script_then_fallback() {
        let mut location = MockLocation::scripted(
            [Err(LocationError::Unavailable)],
            Ok(Coordinates::new(35.0, 139.0)),
        );
        assert_eq!(location.lookup(), Err(LocationError::Unavailable));
        assert_eq!(location.lookup(), Ok(Coordinates::new(35.0, 139.0)));
        assert_eq!(location.lookup_counter().load(Ordering::SeqCst), 2);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_mock_clock() {
        let clock = MockClock::new(100.5);
        clock.advance(1.0);
        assert_eq!(clock.unix_seconds(), 101.5);
        assert_eq!(clock.unix_secs(), 101);
    }
}
