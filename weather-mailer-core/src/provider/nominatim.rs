//! Reverse geocoding through Nominatim (OpenStreetMap). No API key required,
//! but a descriptive `User-Agent` is.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    error::{ProviderError, truncate_body},
    model::Coordinates,
};

use super::Geocoder;

const SERVICE: &str = "Nominatim";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    http: Client,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build geocoding client, using defaults");
                Client::new()
            });

        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// Most to least specific, empty parts dropped.
    fn composite_name(self) -> String {
        [self.neighbourhood, self.suburb, self.city, self.state, self.country]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, coords: Coordinates) -> Result<String, ProviderError> {
        let url = format!("{}/reverse", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", coords.lat().to_string()),
                ("lon", coords.lon().to_string()),
                ("zoom", "16".to_string()),
                ("addressdetails", "1".to_string()),
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

        let parsed: NominatimResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed {
                service: SERVICE,
                reason: e.to_string(),
            })?;

        let name = parsed.address.unwrap_or_default().composite_name();
        if name.is_empty() {
            return Err(ProviderError::Malformed {
                service: SERVICE,
                reason: "address had no usable parts".to_string(),
            });
        }

        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_name_skips_missing_and_empty_parts() {
        let addr = NominatimAddress {
            neighbourhood: None,
            suburb: Some("Thamel".into()),
            city: Some("Kathmandu".into()),
            state: Some(String::new()),
            country: Some("Nepal".into()),
        };
        assert_eq!(addr.composite_name(), "Thamel, Kathmandu, Nepal");
    }

    #[test]
    fn composite_name_of_nothing_is_empty() {
        assert_eq!(NominatimAddress::default().composite_name(), "");
    }
}
