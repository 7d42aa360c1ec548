//! Upstream seams: the forecast provider and the reverse geocoder.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::ProviderError, model::Coordinates};

pub mod nominatim;
pub mod weatherapi;

pub use nominatim::NominatimGeocoder;
pub use weatherapi::WeatherApiProvider;

/// Location names as reported by the forecast provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLocation {
    pub name: String,
    pub region: String,
    pub country: String,
}

/// Whole-day summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDay {
    pub condition_text: String,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub avg_humidity: f64,
    pub total_precip_mm: f64,
    pub chance_of_rain: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawHour {
    /// Local `"YYYY-MM-DD HH:MM"`.
    pub time: String,
    pub chance_of_rain: f64,
    pub precip_mm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawAlert {
    pub event: String,
    pub headline: String,
}

/// Today's forecast as delivered by a provider, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawForecast {
    pub location: RawLocation,
    pub day: RawDay,
    /// In chronological order.
    pub hours: Vec<RawHour>,
    pub alerts: Vec<RawAlert>,
}

#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    /// One-day forecast with alerts for the given location.
    async fn forecast(&self, coords: Coordinates) -> Result<RawForecast, ProviderError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Human-readable place name for the given location.
    async fn reverse(&self, coords: Coordinates) -> Result<String, ProviderError>;
}
