//! HTTP geolocation adapter.
//!
//! Calls `GET {endpoint}/{ip}` and expects
//! `{ "country_code": "DE", "confidence": 0.8 }`. A 404 means the
//! provider has no answer for the address.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

use crate::domain::foundation::{CountryCode, DomainError};
use crate::ports::{GeoLocation, GeoLocator};

#[derive(Debug, Deserialize)]
struct GeoResponse {
    country_code: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

pub struct HttpGeoLocator {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpGeoLocator {
    /// `timeout` bounds the whole request, on top of any caller deadline.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::unavailable("geolocation", format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url_for(&self, ip: IpAddr) -> String {
        format!("{}/{}", self.endpoint, ip)
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoLocation>, DomainError> {
        let url = self.url_for(ip);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DomainError::timeout("geolocation")
            } else {
                DomainError::unavailable("geolocation", format!("Request failed: {}", e))
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DomainError::unavailable(
                "geolocation",
                format!("Geolocation endpoint returned {}", response.status()),
            ));
        }

        let body: GeoResponse = response.json().await.map_err(|e| {
            DomainError::unavailable("geolocation", format!("Failed to parse response: {}", e))
        })?;

        let country_code = CountryCode::new(&body.country_code).map_err(|e| {
            DomainError::unavailable("geolocation", format!("Provider returned bad country code: {}", e))
        })?;

        Ok(Some(GeoLocation {
            country_code,
            confidence: body.confidence.clamp(0.0, 1.0),
        }))
    }
}
