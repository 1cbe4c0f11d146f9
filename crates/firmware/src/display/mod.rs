//! E-paper panel: hardware driver plus the controller that serialises
//! pattern draws onto it.

pub mod controller;
pub mod driver;

pub use controller::{PanelCommand, PanelController, PanelError};
pub use driver::{Command, Epd7in5bV2, SPI_CHUNK};
