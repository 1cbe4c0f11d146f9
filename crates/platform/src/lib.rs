//! Hardware Abstraction Layer (HAL) for the Noise Clock
//!
//! This crate provides the shared-bus arbitration primitives and the
//! trait-based peripheral abstractions used by the application, enabling
//! development and testing without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate: controllers, loops, drivers)
//!         ↓
//! Pattern generation (pattern crate, pure)
//!         ↓
//! Platform HAL (this crate - bus arbiter + trait abstractions)
//!         ↓
//! Linux userspace HAL (spidev, gpio-cdev via linux-embedded-hal)
//! ```
//!
//! # Contents
//!
//! - [`BusArbiter`] - bus token + advisory busy flag
//! - [`StopSignal`] - cancellation token for background threads
//! - [`Clock`] - wall-clock source
//! - [`PanelDevice`] / [`DigitDriver`] - output peripherals
//! - [`LocationProvider`] - approximate device location
//! - [`InputEvent`] - debounced button edges
//!
//! # Features
//!
//! - `mocks`: recording test doubles for every trait ([`mocks`])
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use platform::BusArbiter;
//!
//! let arbiter = BusArbiter::new(Duration::ZERO);
//! let written = arbiter.transaction(|| {
//!     assert!(arbiter.is_busy());
//!     42
//! });
//! assert_eq!(written, 42);
//! assert!(!arbiter.is_busy());
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing over println! in lib code
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide

pub mod bus;
pub mod clock;
pub mod config;
pub mod display;
pub mod input;
pub mod location;
pub mod mocks;
pub mod signal;

pub use bus::{lock, BusArbiter};
pub use clock::{Clock, SystemClock};
pub use display::{DigitDriver, DisplayError, PanelDevice};
pub use input::{Button, ButtonEdge, InputEvent};
pub use location::{Coordinates, LocationError, LocationProvider};
pub use signal::{join_with_timeout, StopSignal};
