//! Debounced push buttons.
//!
//! Each button gets its own polling thread. Buttons are active-low with a
//! pull-up, so a low level means "pressed". A level change is reported only
//! after it has been stable for the button's debounce time; the event is
//! timestamped at that moment, which delays press and release equally and
//! leaves the measured hold time intact.
//!
//! | Button | BCM pin | Debounce |
//! |--------|---------|----------|
//! | Toggle | 23      | 50 ms    |
//! | Reset  | 26      | 100 ms   |

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embedded_hal::digital::InputPin;
use platform::{Button, ButtonEdge, InputEvent, StopSignal};

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Level debouncer for one button.
#[derive(Debug, Clone)]
pub struct Debouncer {
    stable: bool,
    candidate: bool,
    since: Instant,
    debounce: Duration,
}

impl Debouncer {
    /// Start released.
    pub fn new(debounce: Duration, now: Instant) -> Self {
        Self {
            stable: false,
            candidate: false,
            since: now,
            debounce,
        }
    }

    /// Debounced state: `true` while pressed.
    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    /// Feed one raw sample; returns the edge once a new level has held for
    /// the debounce time.
    pub fn update(&mut self, pressed: bool, now: Instant) -> Option<ButtonEdge> {
        if pressed != self.candidate {
            self.candidate = pressed;
            self.since = now;
        }
        if self.candidate == self.stable
            || now.saturating_duration_since(self.since) < self.debounce
        {
            return None;
        }
        self.stable = self.candidate;
        Some(if self.stable {
            ButtonEdge::Pressed
        } else {
            ButtonEdge::Released
        })
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Default sampling interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Polls one active-low input pin and reports debounced edges.
pub struct ButtonPoller<P> {
    button: Button,
    pin: P,
    debouncer: Debouncer,
    interval: Duration,
    read_failed: bool,
}

impl<P: InputPin> ButtonPoller<P> {
    /// Watch `pin` for `button`.
    pub fn new(button: Button, pin: P, debounce: Duration) -> Self {
        Self {
            button,
            pin,
            debouncer: Debouncer::new(debounce, Instant::now()),
            interval: POLL_INTERVAL,
            read_failed: false,
        }
    }

    /// Sample every `interval` instead of [`POLL_INTERVAL`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Take one sample at `now`.
    ///
    /// Read errors are logged once per outage and count as "no change".
    pub fn poll(&mut self, now: Instant) -> Option<InputEvent> {
        match self.pin.is_low() {
            Ok(pressed) => {
                if self.read_failed {
                    tracing::info!(button = self.button.name(), "button readable again");
                    self.read_failed = false;
                }
                self.debouncer.update(pressed, now).map(|edge| InputEvent {
                    button: self.button,
                    edge,
                })
            }
            Err(e) => {
                if !self.read_failed {
                    tracing::warn!(button = self.button.name(), error = ?e, "button read failed");
                    self.read_failed = true;
                }
                None
            }
        }
    }
}

impl<P: InputPin + Send + 'static> ButtonPoller<P> {
    /// Poll on a dedicated thread until `stop`, calling `on_event` for every
    /// debounced edge.
    pub fn spawn(
        mut self,
        stop: StopSignal,
        mut on_event: impl FnMut(InputEvent) + Send + 'static,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("button-{}", self.button.name()))
            .spawn(move || {
                tracing::debug!(button = self.button.name(), "button poller running");
                loop {
                    if let Some(event) = self.poll(Instant::now()) {
                        tracing::debug!(button = self.button.name(), edge = ?event.edge, "button edge");
                        on_event(event);
                    }
                    if stop.wait_timeout(self.interval) {
                        break;
                    }
                }
                tracing::debug!(button = self.button.name(), "button poller stopped");
            })
    }
}
