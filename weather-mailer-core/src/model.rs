use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Kathmandu; used whenever the caller's coordinates are missing or unusable.
pub const DEFAULT_LAT: f64 = 27.7172;
pub const DEFAULT_LON: f64 = 85.3240;

/// A validated latitude/longitude pair.
///
/// Only constructible through [`Coordinates::resolve`] or
/// [`Coordinates::default_location`], so every value in circulation is in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    /// Accept `(lat, lon)` when both are finite and in range, otherwise fall
    /// back to the default location. Never fails.
    pub fn resolve(lat: f64, lon: f64) -> Self {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);

        if valid {
            Self { lat, lon }
        } else {
            tracing::info!(lat, lon, "invalid coordinates, using default location");
            Self::default_location()
        }
    }

    pub const fn default_location() -> Self {
        Self { lat: DEFAULT_LAT, lon: DEFAULT_LON }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// `"lat,lon"` as accepted by the forecast provider's `q` parameter.
    pub fn query(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

/// Interpret a loosely-typed JSON coordinate.
///
/// Numbers pass through, numeric strings are parsed, anything else is NaN so
/// that [`Coordinates::resolve`] substitutes the default.
pub fn coordinate_from_json(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// First hourly slot with heavy precipitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeavyRainHour {
    /// Local time as `"YYYY-MM-DD HH:MM"`.
    pub time: String,
    pub precip_mm: f64,
}

impl HeavyRainHour {
    /// The `HH:MM` part of [`HeavyRainHour::time`].
    pub fn clock_time(&self) -> &str {
        self.time.split_once(' ').map_or(self.time.as_str(), |(_, t)| t)
    }
}

/// One normalized forecast for a location and day. Numeric fields are already
/// rendered to the precision the messages print them with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    pub location_name: String,
    pub condition_text: String,
    pub max_temp: String,
    pub min_temp: String,
    pub humidity: String,
    pub precipitation: String,
    pub rain_chance: u8,
    pub rain_start: Option<String>,
    pub rain_end: Option<String>,
    /// Empty when the provider reported no alerts.
    pub storm_warning: String,
    pub heavy_rain_hour: Option<HeavyRainHour>,
}

impl ForecastSnapshot {
    /// `Some((start, end))` only when both ends of the rain window are known.
    pub fn rain_window(&self) -> Option<(&str, &str)> {
        match (&self.rain_start, &self.rain_end) {
            (Some(start), Some(end)) => Some((start.as_str(), end.as_str())),
            _ => None,
        }
    }
}

/// Which kind of broadcast is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastKind {
    /// Daily run or the immediate send after a signup.
    Regular,
    /// Re-broadcast some hours after a signup, with a delta against the last
    /// snapshot.
    FollowUp,
}

impl BroadcastKind {
    pub fn is_follow_up(self) -> bool {
        matches!(self, BroadcastKind::FollowUp)
    }
}

/// Validate a submitted address. The raw string is kept as-is.
pub fn validate_email(email: Option<&str>) -> Result<&str, ValidationError> {
    match email {
        Some(e) if e.contains('@') => Ok(e),
        _ => Err(ValidationError::InvalidEmail),
    }
}
