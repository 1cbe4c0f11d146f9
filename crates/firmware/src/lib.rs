//! Noise Clock application
//!
//! Drives a Waveshare 7.5" (B) V2 e-paper panel and a chain of MAX7219
//! seven-segment modules from one Raspberry Pi. A toggle button switches
//! between a live clock/location readout and a generated noise pattern.
//!
//! # Architecture
//!
//! ```text
//! Buttons (input) ──► ModeController (mode)
//!                        │            │
//!                        ▼            ▼
//!          PanelController        DigitDisplay
//!          (display, worker)      (segment, refresh loop)
//!                        │            │
//!                        └──► BusArbiter ◄──┘   (platform)
//!                        │
//!                        ▼
//!                 pattern::render   (pure)
//! ```
//!
//! Every component takes its shared state (`Arc<BusArbiter>`,
//! `Arc<dyn Clock>`, [`location::LocationCache`]) by injection, so the whole
//! stack runs against `platform::mocks` in tests.
//!
//! # Features
//!
//! - `hardware` - Linux userspace HAL (spidev, gpio-cdev), HTTPS geolocation,
//!   and the `noise-clock` binary
//!
//! ```bash
//! cargo run -p firmware --features hardware --release
//! ```

// Upgrade relevant warns to deny; keep pedantic as warn
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Logging discipline
#![warn(clippy::print_stdout)] // prefer tracing over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
// Pedantic lints too noisy for driver code (register widths, pixel math):
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod display;
pub mod input;
pub mod location;
pub mod mode;
pub mod segment;

// Re-export key types
pub use config::Settings;
pub use display::{Epd7in5bV2, PanelController, PanelError};
pub use input::{ButtonPoller, Debouncer};
pub use location::LocationCache;
pub use mode::{DisplayMode, ModeController, PatternSink, SegmentControl};
pub use segment::{DigitDisplay, DigitDisplayHandle, Max7219Chain, RefreshTiming, SegmentError};
