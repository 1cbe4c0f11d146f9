//! Location cache and IP geolocation.
//!
//! The digit loop and the mode controller both need the device's rough
//! position. [`LocationCache`] holds the last answer and the provider behind
//! one shared handle: `(0, 0)` means "unknown", and the next reader refetches.

use std::sync::{Arc, Mutex};

use platform::{lock, Coordinates, LocationError, LocationProvider};
use serde::Deserialize;

/// Shared, cloneable location cache.
#[derive(Clone)]
pub struct LocationCache {
    provider: Arc<Mutex<Box<dyn LocationProvider>>>,
    coords: Arc<Mutex<Coordinates>>,
}

impl LocationCache {
    /// Wrap `provider`. The cache starts out unknown; nothing is fetched yet.
    pub fn new(provider: impl LocationProvider + 'static) -> Self {
        Self {
            provider: Arc::new(Mutex::new(Box::new(provider))),
            coords: Arc::new(Mutex::new(Coordinates::UNKNOWN)),
        }
    }

    /// Last known coordinates, `(0, 0)` if none.
    pub fn current(&self) -> Coordinates {
        *lock(&self.coords)
    }

    /// One lookup attempt. A failure resets the cache to unknown.
    pub fn refresh(&self) -> Coordinates {
        let result = lock(&self.provider).lookup();
        let coords = match result {
            Ok(coords) => {
                tracing::info!(lat = coords.lat, lng = coords.lng, "location fetched");
                coords
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not get location");
                Coordinates::UNKNOWN
            }
        };
        *lock(&self.coords) = coords;
        coords
    }

    /// Cached coordinates, fetching first if they are still unknown.
    pub fn ensure(&self) -> Coordinates {
        let coords = self.current();
        if coords.is_unknown() {
            self.refresh()
        } else {
            coords
        }
    }
}

impl std::fmt::Debug for LocationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationCache")
            .field("coords", &self.current())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// IP geolocation
// ---------------------------------------------------------------------------

/// Subset of an `ipinfo.io`-style JSON answer.
#[derive(Debug, Deserialize)]
struct IpInfo {
    loc: Option<String>,
}

/// Parse an `ipinfo.io`-style body (`"loc": "lat,lng"`).
///
/// A missing `loc` or a `0,0` answer is [`LocationError::Unavailable`].
pub fn parse_ipinfo(body: &str) -> Result<Coordinates, LocationError> {
    let info: IpInfo =
        serde_json::from_str(body).map_err(|e| LocationError::Malformed(e.to_string()))?;
    let loc = info.loc.ok_or(LocationError::Unavailable)?;

    let (lat, lng) = loc
        .split_once(',')
        .ok_or_else(|| LocationError::Malformed(format!("loc without comma: {loc:?}")))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| LocationError::Malformed(format!("bad coordinate: {s:?}")))
    };
    let coords = Coordinates::new(parse(lat)?, parse(lng)?);

    if coords.is_unknown() {
        return Err(LocationError::Unavailable);
    }
    Ok(coords)
}

/// Blocking HTTPS geolocation by public IP address.
#[cfg(feature = "hardware")]
pub struct IpGeolocator {
    client: reqwest::blocking::Client,
    url: String,
}

#[cfg(feature = "hardware")]
impl IpGeolocator {
    /// Query `url` (for example `https://ipinfo.io/json`) with a short timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, LocationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| LocationError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[cfg(feature = "hardware")]
impl LocationProvider for IpGeolocator {
    fn lookup(&mut self) -> Result<Coordinates, LocationError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|e| LocationError::Transport(e.to_string()))?;
        parse_ipinfo(&body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::MockLocation;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_parse_ipinfo() {
        let body = r#"{"ip":"203.0.113.7","city":"Tokyo","loc":"35.6895,139.6917","timezone":"Asia/Tokyo"}"#;
        assert_eq!(parse_ipinfo(body), Ok(Coordinates::new(35.6895, 139.6917)));
    }

    #[test]
    fn test_parse_ipinfo_negative_with_spaces() {
        let body = r#"{"loc":"-33.8688, -151.2093"}"#;
        assert_eq!(parse_ipinfo(body), Ok(Coordinates::new(-33.8688, -151.2093)));
    }

    #[test]
    fn test_parse_ipinfo_failures() {
        assert_eq!(parse_ipinfo(r#"{"ip":"10.0.0.1"}"#), Err(LocationError::Unavailable));
        assert_eq!(parse_ipinfo(r#"{"loc":"0,0"}"#), Err(LocationError::Unavailable));
        assert!(matches!(parse_ipinfo("<html>"), Err(LocationError::Malformed(_))));
        assert!(matches!(parse_ipinfo(r#"{"loc":"35.0"}"#), Err(LocationError::Malformed(_))));
        assert!(matches!(parse_ipinfo(r#"{"loc":"NaN,1"}"#), Err(LocationError::Malformed(_))));
    }

    #[test]
    fn test_cache_starts_unknown_and_does_not_fetch() {
        let provider = MockLocation::fixed(Coordinates::new(35.0, 139.0));
        let lookups = provider.lookup_counter();
        let cache = LocationCache::new(provider);
        assert!(cache.current().is_unknown());
        assert_eq!(lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ensure_fetches_once_when_known() {
        let provider = MockLocation::fixed(Coordinates::new(35.0, 139.0));
        let lookups = provider.lookup_counter();
        let cache = LocationCache::new(provider);

        assert_eq!(cache.ensure(), Coordinates::new(35.0, 139.0));
        assert_eq!(cache.ensure(), Coordinates::new(35.0, 139.0));
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_lookup_degrades_and_retries() {
        let provider = MockLocation::scripted(
            [Err(LocationError::Transport("timeout".into()))],
            Ok(Coordinates::new(51.5, -0.12)),
        );
        let lookups = provider.lookup_counter();
        let cache = LocationCache::new(provider);

        assert!(cache.ensure().is_unknown());
        assert_eq!(cache.ensure(), Coordinates::new(51.5, -0.12));
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_refresh_overwrites_known_location() {
        let provider = MockLocation::scripted(
            [Ok(Coordinates::new(35.0, 139.0))],
            Err(LocationError::Unavailable),
        );
        let cache = LocationCache::new(provider);
        cache.refresh();
        assert!(!cache.current().is_unknown());
        assert!(cache.refresh().is_unknown());
        assert!(cache.current().is_unknown());
    }

    #[test]
    fn test_clones_share_state() {
        let cache = LocationCache::new(MockLocation::fixed(Coordinates::new(1.0, 2.0)));
        let other = cache.clone();
        cache.refresh();
        assert_eq!(other.current(), Coordinates::new(1.0, 2.0));
    }
}
