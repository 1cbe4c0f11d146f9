//! Input device abstraction

/// Input events from the physical buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Which button changed state
    pub button: Button,
    /// Direction of the change
    pub edge: ButtonEdge,
}

impl InputEvent {
    /// Button went down
    pub const fn pressed(button: Button) -> Self {
        Self {
            button,
            edge: ButtonEdge::Pressed,
        }
    }

    /// Button came back up
    pub const fn released(button: Button) -> Self {
        Self {
            button,
            edge: ButtonEdge::Released,
        }
    }
}

/// Debounced edge direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    /// Button pressed
    Pressed,
    /// Button released
    Released,
}

/// Physical buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Toggles between the idle clock and the pattern draw
    Toggle,
    /// Forces idle mode and blanks the panel
    Reset,
}

impl Button {
    /// Short name used in log fields and GPIO line labels.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::Reset => "reset",
        }
    }
}
