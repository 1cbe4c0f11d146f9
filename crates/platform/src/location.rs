//! Location provider abstraction.

/// A latitude/longitude pair in decimal degrees.
///
/// `(0, 0)` is reserved for "unknown": providers never report it and
/// consumers treat it as a cue to refetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude, degrees north.
    pub lat: f64,
    /// Longitude, degrees east.
    pub lng: f64,
}

impl Coordinates {
    /// The "unknown location" sentinel.
    pub const UNKNOWN: Self = Self { lat: 0.0, lng: 0.0 };

    /// Construct from latitude and longitude.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `true` for the `(0, 0)` sentinel.
    #[allow(clippy::float_cmp)]
    pub fn is_unknown(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Source of the device's approximate location.
///
/// One call is one attempt; retry policy belongs to the caller.
pub trait LocationProvider: Send {
    /// Look up the current location.
    fn lookup(&mut self) -> Result<Coordinates, LocationError>;
}

/// Location lookup failures. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The provider answered but had no coordinates for us.
    #[error("location unavailable")]
    Unavailable,
    /// Network or transport failure.
    #[error("location transport error: {0}")]
    Transport(String),
    /// The provider's answer could not be parsed.
    #[error("malformed location response: {0}")]
    Malformed(String),
}
