use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    error::{ProviderError, truncate_body},
    model::Coordinates,
};

use super::{ForecastProvider, RawAlert, RawDay, RawForecast, RawHour, RawLocation};

const SERVICE: &str = "WeatherAPI";

/// WeatherAPI.com `forecast.json` client.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to build WeatherAPI client, using defaults");
            Client::new()
        });

        Self { api_key, base_url: base_url.into().trim_end_matches('/').to_string(), http }
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    avghumidity: f64,
    totalprecip_mm: f64,
    #[serde(default)]
    daily_chance_of_rain: Option<f64>,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaHour {
    time: String,
    #[serde(default)]
    chance_of_rain: f64,
    #[serde(default)]
    precip_mm: f64,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    day: WaDay,
    #[serde(default)]
    hour: Vec<WaHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Default, Deserialize)]
struct WaAlert {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    headline: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WaAlerts {
    #[serde(default)]
    alert: Vec<WaAlert>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    forecast: WaForecast,
    #[serde(default)]
    alerts: Option<WaAlerts>,
}

impl WaForecastResponse {
    fn into_raw(self) -> Result<RawForecast, ProviderError> {
        let today = self.forecast.forecastday.into_iter().next().ok_or_else(|| {
            ProviderError::Malformed {
                service: SERVICE,
                reason: "response contained no forecastday data".to_string(),
            }
        })?;

        let alerts = self
            .alerts
            .unwrap_or_default()
            .alert
            .into_iter()
            .map(|a| RawAlert {
                event: a.event.unwrap_or_default(),
                headline: a.headline.unwrap_or_default(),
            })
            .collect();

        Ok(RawForecast {
            location: RawLocation {
                name: self.location.name,
                region: self.location.region,
                country: self.location.country,
            },
            day: RawDay {
                condition_text: today.day.condition.text,
                max_temp_c: today.day.maxtemp_c,
                min_temp_c: today.day.mintemp_c,
                avg_humidity: today.day.avghumidity,
                total_precip_mm: today.day.totalprecip_mm,
                chance_of_rain: today.day.daily_chance_of_rain,
            },
            hours: today
                .hour
                .into_iter()
                .map(|h| RawHour {
                    time: h.time,
                    chance_of_rain: h.chance_of_rain,
                    precip_mm: h.precip_mm,
                })
                .collect(),
            alerts,
        })
    }
}

#[async_trait]
impl ForecastProvider for WeatherApiProvider {
    async fn forecast(&self, coords: Coordinates) -> Result<RawForecast, ProviderError> {
        let url = format!("{}/forecast.json", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", coords.query().as_str()),
                ("days", "1"),
                ("alerts", "yes"),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::Request { service: SERVICE, source })?;

        let status = res.status();
        let body =
            res.text().await.map_err(|source| ProviderError::Request { service: SERVICE, source })?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                service: SERVICE,
                status,
                body: truncate_body(&body),
            });
        }

        let parsed: WaForecastResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed {
                service: SERVICE,
                reason: e.to_string(),
            })?;

        parsed.into_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> Result<RawForecast, ProviderError> {
        let parsed: WaForecastResponse = serde_json::from_value(json).expect("shape should parse");
        parsed.into_raw()
    }

    #[test]
    fn empty_forecastday_is_malformed() {
        let err = parse(serde_json::json!({
            "location": { "name": "Kathmandu", "region": "Bagmati", "country": "Nepal" },
            "forecast": { "forecastday": [] }
        }))
        .unwrap_err();

        assert!(matches!(err, ProviderError::Malformed { .. }));
        assert!(err.to_string().contains("no forecastday"));
    }

    #[test]
    fn alerts_are_optional_and_fields_default_to_empty() {
        let raw = parse(serde_json::json!({
            "location": { "name": "Pokhara" },
            "forecast": { "forecastday": [{
                "day": {
                    "maxtemp_c": 25.0, "mintemp_c": 15.0, "avghumidity": 70.0,
                    "totalprecip_mm": 0.0, "condition": { "text": "Sunny" }
                },
                "hour": []
            }]},
            "alerts": { "alert": [{ "event": "Flood" }] }
        }))
        .expect("valid payload");

        assert_eq!(raw.location.name, "Pokhara");
        assert_eq!(raw.location.region, "");
        assert_eq!(raw.day.chance_of_rain, None);
        assert_eq!(raw.alerts, vec![RawAlert { event: "Flood".into(), headline: String::new() }]);
    }
}
