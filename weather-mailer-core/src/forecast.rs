//! Turns provider output into a [`ForecastSnapshot`].

use std::sync::Arc;

use crate::{
    error::ProviderError,
    model::{Coordinates, ForecastSnapshot, HeavyRainHour},
    provider::{ForecastProvider, Geocoder, RawForecast, RawLocation},
};

/// Rain chance (percent) an hour must exceed to join the rain window.
const RAIN_WINDOW_MIN_CHANCE: f64 = 30.0;
/// Precipitation an hour must exceed to join the rain window.
const RAIN_WINDOW_MIN_PRECIP_MM: f64 = 0.0;
/// First hour at or above this triggers a heavy-rain alert.
pub const HEAVY_RAIN_PRECIP_MM: f64 = 2.0;

/// Forecast and geocoding behind one call.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    provider: Arc<dyn ForecastProvider>,
    geocoder: Arc<dyn Geocoder>,
}

impl ForecastClient {
    pub fn new(provider: Arc<dyn ForecastProvider>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { provider, geocoder }
    }

    /// Fetch today's forecast for `coords`.
    ///
    /// Geocoding failures are logged and replaced by the provider's own
    /// location name; forecast failures are returned.
    pub async fn fetch(&self, coords: Coordinates) -> Result<ForecastSnapshot, ProviderError> {
        let raw = self.provider.forecast(coords).await?;

        let location_name = match self.geocoder.reverse(coords).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(error = %e, "reverse geocoding failed, using provider location");
                fallback_location_name(&raw.location)
            }
        };

        let snapshot = normalize(raw, location_name);
        tracing::info!(
            lat = coords.lat(),
            lon = coords.lon(),
            location = %snapshot.location_name,
            precipitation = %snapshot.precipitation,
            rain_chance = snapshot.rain_chance,
            heavy_rain = snapshot.heavy_rain_hour.is_some(),
            "fetched forecast"
        );
        Ok(snapshot)
    }
}

/// `"name, region, country"` with empty parts dropped.
pub fn fallback_location_name(location: &RawLocation) -> String {
    [&location.name, &location.region, &location.country]
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build a snapshot from a raw forecast and an already-resolved place name.
pub fn normalize(raw: RawForecast, location_name: String) -> ForecastSnapshot {
    let rain_hours: Vec<_> = raw
        .hours
        .iter()
        .filter(|h| h.chance_of_rain > RAIN_WINDOW_MIN_CHANCE && h.precip_mm > RAIN_WINDOW_MIN_PRECIP_MM)
        .collect();

    let rain_start = rain_hours.first().map(|h| clock_part(&h.time));
    let rain_end = rain_hours.last().map(|h| clock_part(&h.time));

    let storm_warning = raw
        .alerts
        .first()
        .filter(|a| !a.event.is_empty())
        .map(|a| format!("{} - {}", a.event, a.headline))
        .unwrap_or_default();

    let heavy_rain_hour = raw
        .hours
        .iter()
        .find(|h| h.precip_mm >= HEAVY_RAIN_PRECIP_MM)
        .map(|h| HeavyRainHour { time: h.time.clone(), precip_mm: h.precip_mm });

    let rain_chance = raw.day.chance_of_rain.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8;

    ForecastSnapshot {
        location_name,
        condition_text: raw.day.condition_text,
        max_temp: one_decimal(raw.day.max_temp_c),
        min_temp: one_decimal(raw.day.min_temp_c),
        humidity: format!("{:.0}", raw.day.avg_humidity.round()),
        precipitation: one_decimal(raw.day.total_precip_mm),
        rain_chance,
        rain_start,
        rain_end,
        storm_warning,
        heavy_rain_hour,
    }
}

/// One decimal place, ties rounded away from zero.
fn one_decimal(value: f64) -> String {
    format!("{:.1}", (value * 10.0).round() / 10.0)
}

fn clock_part(time: &str) -> String {
    time.split_once(' ').map_or(time, |(_, t)| t).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{RawAlert, RawDay, RawHour};
    use crate::testing::{FakeGeocoder, FakeProvider};

    fn hour(time: &str, chance: f64, precip: f64) -> RawHour {
        RawHour { time: time.to_string(), chance_of_rain: chance, precip_mm: precip }
    }

    fn raw(hours: Vec<RawHour>) -> RawForecast {
        RawForecast {
            location: RawLocation {
                name: "Kathmandu".into(),
                region: "Bagmati".into(),
                country: "Nepal".into(),
            },
            day: RawDay {
                condition_text: "Patchy rain nearby".into(),
                max_temp_c: 27.46,
                min_temp_c: 18.04,
                avg_humidity: 81.6,
                total_precip_mm: 4.26,
                chance_of_rain: Some(86.0),
            },
            hours,
            alerts: vec![],
        }
    }

    #[test]
    fn numbers_are_rendered_at_fixed_precision() {
        let snap = normalize(raw(vec![]), "Here".into());
        assert_eq!(snap.max_temp, "27.5");
        assert_eq!(snap.min_temp, "18.0");
        assert_eq!(snap.humidity, "82");
        assert_eq!(snap.precipitation, "4.3");
        assert_eq!(snap.rain_chance, 86);
    }

    #[test]
    fn ties_round_away_from_zero() {
        let mut forecast = raw(vec![]);
        forecast.day.max_temp_c = 26.25;
        forecast.day.min_temp_c = -0.25;
        forecast.day.avg_humidity = 82.5;
        forecast.day.total_precip_mm = 1.25;

        let snap = normalize(forecast, "Here".into());
        assert_eq!(
            (snap.max_temp.as_str(), snap.min_temp.as_str(), snap.humidity.as_str(), snap.precipitation.as_str()),
            ("26.3", "-0.3", "83", "1.3")
        );
    }

    #[test]
    fn rain_window_spans_first_and_last_qualifying_hours() {
        let snap = normalize(
            raw(vec![
                hour("2025-06-01 09:00", 20.0, 0.5),
                hour("2025-06-01 10:00", 40.0, 0.0),
                hour("2025-06-01 11:00", 45.0, 0.2),
                hour("2025-06-01 12:00", 10.0, 1.0),
                hour("2025-06-01 15:00", 80.0, 1.4),
                hour("2025-06-01 16:00", 30.0, 1.0),
            ]),
            "Here".into(),
        );
        assert_eq!(snap.rain_start.as_deref(), Some("11:00"));
        assert_eq!(snap.rain_end.as_deref(), Some("15:00"));
        assert_eq!(snap.rain_window(), Some(("11:00", "15:00")));
    }

    #[test]
    fn no_qualifying_hours_means_no_window() {
        let snap = normalize(raw(vec![hour("2025-06-01 09:00", 31.0, 0.0)]), "Here".into());
        assert_eq!(snap.rain_start, None);
        assert_eq!(snap.rain_end, None);
        assert_eq!(snap.rain_window(), None);
    }

    #[test]
    fn heavy_rain_is_first_match_not_maximum() {
        let snap = normalize(
            raw(vec![
                hour("2025-06-01 13:00", 50.0, 1.9),
                hour("2025-06-01 14:00", 60.0, 2.0),
                hour("2025-06-01 15:00", 90.0, 9.0),
            ]),
            "Here".into(),
        );
        let heavy = snap.heavy_rain_hour.expect("heavy rain hour");
        assert_eq!(heavy.time, "2025-06-01 14:00");
        assert_eq!(heavy.precip_mm, 2.0);
    }

    #[test]
    fn below_threshold_has_no_heavy_rain() {
        let snap = normalize(raw(vec![hour("2025-06-01 14:00", 60.0, 1.99)]), "Here".into());
        assert!(snap.heavy_rain_hour.is_none());
    }

    #[test]
    fn storm_warning_uses_first_alert() {
        let mut r = raw(vec![]);
        r.alerts = vec![
            RawAlert { event: "Heavy Rain".into(), headline: "Orange warning".into() },
            RawAlert { event: "Wind".into(), headline: "Yellow".into() },
        ];
        let snap = normalize(r, "Here".into());
        assert_eq!(snap.storm_warning, "Heavy Rain - Orange warning");
    }

    #[test]
    fn alert_without_event_is_ignored() {
        let mut r = raw(vec![]);
        r.alerts = vec![RawAlert { event: String::new(), headline: "Something".into() }];
        assert_eq!(normalize(r, "Here".into()).storm_warning, "");
    }

    #[test]
    fn missing_chance_of_rain_is_zero() {
        let mut r = raw(vec![]);
        r.day.chance_of_rain = None;
        assert_eq!(normalize(r, "Here".into()).rain_chance, 0);
    }

    #[test]
    fn fallback_name_drops_empty_parts() {
        let loc = RawLocation { name: "Lalitpur".into(), region: String::new(), country: "Nepal".into() };
        assert_eq!(fallback_location_name(&loc), "Lalitpur, Nepal");
    }

    #[tokio::test]
    async fn fetch_prefers_geocoded_name() {
        let client = ForecastClient::new(
            Arc::new(FakeProvider::returning(raw(vec![]))),
            Arc::new(FakeGeocoder::named("Thamel, Kathmandu, Bagmati, Nepal")),
        );
        let snap = client.fetch(Coordinates::default_location()).await.expect("fetch");
        assert_eq!(snap.location_name, "Thamel, Kathmandu, Bagmati, Nepal");
    }

    #[tokio::test]
    async fn fetch_falls_back_when_geocoding_fails() {
        let client = ForecastClient::new(
            Arc::new(FakeProvider::returning(raw(vec![]))),
            Arc::new(FakeGeocoder::failing()),
        );
        let snap = client.fetch(Coordinates::default_location()).await.expect("fetch");
        assert_eq!(snap.location_name, "Kathmandu, Bagmati, Nepal");
    }

    #[tokio::test]
    async fn fetch_propagates_provider_failure() {
        let client = ForecastClient::new(
            Arc::new(FakeProvider::failing()),
            Arc::new(FakeGeocoder::named("Anywhere")),
        );
        let err = client.fetch(Coordinates::default_location()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }
}
