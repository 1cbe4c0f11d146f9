//! Mode controller
//!
//! Two states, flipped by a completed press-and-release of the toggle
//! button:
//!
//! ```text
//!            toggle: freeze, derive task, draw
//!   IDLE ─────────────────────────────────────► ACTIVE
//!    ▲                                            │
//!    └─────────── toggle: freeze, clear, unfreeze ┘
//!    ▲
//!    └── reset (any state): clear
//! ```
//!
//! The controller only talks to its collaborators through [`PatternSink`]
//! and [`SegmentControl`], so tests can substitute recording fakes.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pattern::{DrawTask, NoiseScales};
use platform::config::MIN_PRESS;
use platform::{lock, Button, ButtonEdge, Coordinates, InputEvent, PanelDevice};

use crate::display::{PanelController, PanelError};
use crate::location::LocationCache;
use crate::segment::DigitDisplayHandle;

/// Application mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// Live clock, blank panel.
    #[default]
    Idle,
    /// Pattern on the panel, clock frozen while switching.
    Active,
}

/// Where patterns go.
pub trait PatternSink: Send + Sync {
    /// Blank the panel; blocks until done.
    fn clear(&self) -> Result<(), PanelError>;
    /// Queue a draw; never waits for the bus.
    fn draw_async(&self, task: DrawTask) -> Result<(), PanelError>;
}

impl<D: PanelDevice + 'static> PatternSink for PanelController<D> {
    fn clear(&self) -> Result<(), PanelError> {
        PanelController::clear(self)
    }

    fn draw_async(&self, task: DrawTask) -> Result<(), PanelError> {
        PanelController::draw_async(self, task)
    }
}

/// The digit display as seen by the mode controller.
pub trait SegmentControl: Send + Sync {
    /// Mirror the mode (drops any frozen value).
    fn set_mode(&self, mode: DisplayMode);
    /// Snapshot the clock onto module 0.
    fn freeze(&self);
    /// Back to the live clock.
    fn unfreeze(&self);
}

impl SegmentControl for DigitDisplayHandle {
    fn set_mode(&self, mode: DisplayMode) {
        DigitDisplayHandle::set_mode(self, mode);
    }

    fn freeze(&self) {
        DigitDisplayHandle::freeze(self);
    }

    fn unfreeze(&self) {
        DigitDisplayHandle::unfreeze(self);
    }
}

/// Map any value onto a noise scale in `[0.01, 0.10)` via its fractional
/// part. Non-finite input maps to `0.01`.
pub fn noise_scale(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.01;
    }
    let frac = value - value.floor();
    // Tiny negative values round up to exactly 1.0.
    let frac = if frac < 1.0 { frac } else { 0.0 };
    0.01 + frac * 0.09
}

/// Build the draw task for a press of length `held` at `coords`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn derive_task(coords: Coordinates, held: Duration) -> DrawTask {
    let seed = (coords.lat * 100.0 + coords.lng * 100.0).abs();
    DrawTask {
        block_size: (held.as_secs() as usize).max(1),
        // `as` saturates and maps NaN to 0.
        hash_mode: (seed % 11.0) as u8,
        perlin: (seed as u64) % 2 == 0,
        scales: NoiseScales {
            scale: noise_scale(coords.lat + coords.lng),
            x: noise_scale(coords.lat),
            y: noise_scale(coords.lng),
        },
    }
}

#[derive(Debug, Default)]
struct ModeState {
    mode: DisplayMode,
    pressed_at: Option<Instant>,
}

/// Button-driven state machine.
pub struct ModeController {
    panel: Arc<dyn PatternSink>,
    digits: Arc<dyn SegmentControl>,
    location: LocationCache,
    min_press: Duration,
    state: Mutex<ModeState>,
}

impl ModeController {
    /// Start in [`DisplayMode::Idle`].
    pub fn new(
        panel: Arc<dyn PatternSink>,
        digits: Arc<dyn SegmentControl>,
        location: LocationCache,
    ) -> Self {
        Self {
            panel,
            digits,
            location,
            min_press: MIN_PRESS,
            state: Mutex::default(),
        }
    }

    /// Presses shorter than `min_press` are ignored.
    pub fn with_min_press(mut self, min_press: Duration) -> Self {
        self.min_press = min_press;
        self
    }

    /// Current mode.
    pub fn mode(&self) -> DisplayMode {
        lock(&self.state).mode
    }

    /// Feed a debounced button edge observed now.
    pub fn handle(&self, event: InputEvent) {
        self.handle_at(event, Instant::now());
    }

    /// Feed a debounced button edge observed at `now`.
    pub fn handle_at(&self, event: InputEvent, now: Instant) {
        tracing::debug!(button = event.button.name(), edge = ?event.edge, "button edge");
        match (event.button, event.edge) {
            (Button::Toggle, ButtonEdge::Pressed) => {
                lock(&self.state).pressed_at = Some(now);
            }
            (Button::Toggle, ButtonEdge::Released) => {
                let Some(pressed_at) = lock(&self.state).pressed_at.take() else {
                    return;
                };
                let held = now.saturating_duration_since(pressed_at);
                tracing::info!(held_ms = held.as_millis(), "toggle released");
                if held < self.min_press {
                    tracing::debug!(held_ms = held.as_millis(), "ignoring very short press");
                    return;
                }
                self.toggle(held);
            }
            (Button::Reset, ButtonEdge::Pressed) => self.reset(),
            (Button::Reset, ButtonEdge::Released) => {}
        }
    }

    /// Flip the mode after a press of length `held`.
    pub fn toggle(&self, held: Duration) {
        let mut state = lock(&self.state);
        match state.mode {
            DisplayMode::Idle => {
                state.mode = DisplayMode::Active;
                tracing::info!(held_ms = held.as_millis(), "switch to ACTIVE");
                self.digits.set_mode(DisplayMode::Active);
                self.digits.freeze();

                let coords = self.location.ensure();
                let task = derive_task(coords, held);
                tracing::info!(
                    block_size = task.block_size,
                    hash_mode = task.hash_mode,
                    perlin = task.perlin,
                    scale = task.scales.scale,
                    scale_x = task.scales.x,
                    scale_y = task.scales.y,
                    "draw task derived"
                );
                if let Err(e) = self.panel.draw_async(task) {
                    tracing::error!(error = %e, "draw request failed");
                }
            }
            DisplayMode::Active => {
                state.mode = DisplayMode::Idle;
                tracing::info!(held_ms = held.as_millis(), "switch to IDLE");
                self.digits.set_mode(DisplayMode::Idle);
                self.digits.freeze();
                if let Err(e) = self.panel.clear() {
                    tracing::error!(error = %e, "clear failed");
                }
                self.digits.unfreeze();
            }
        }
    }

    /// Back to [`DisplayMode::Idle`] and blank the panel, whatever the
    /// current state. A failed clear is only a warning.
    pub fn reset(&self) {
        tracing::info!("reset");
        let mut state = lock(&self.state);
        state.mode = DisplayMode::Idle;
        state.pressed_at = None;
        self.digits.set_mode(DisplayMode::Idle);
        if let Err(e) = self.panel.clear() {
            tracing::warn!(error = %e, "panel clear failed");
        }
        self.digits.unfreeze();
    }
}
