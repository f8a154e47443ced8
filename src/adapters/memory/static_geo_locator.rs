//! Fixed IP table geolocator for tests and offline runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use crate::domain::foundation::{CountryCode, DomainError};
use crate::ports::{GeoLocation, GeoLocator};

#[derive(Default)]
pub struct StaticGeoLocator {
    table: HashMap<IpAddr, GeoLocation>,
    delay: Option<Duration>,
    failing: bool,
}

impl StaticGeoLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, ip: IpAddr, country_code: CountryCode, confidence: f64) -> Self {
        self.table.insert(
            ip,
            GeoLocation {
                country_code,
                confidence,
            },
        );
        self
    }

    /// Sleeps before answering, to exercise caller timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl GeoLocator for StaticGeoLocator {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoLocation>, DomainError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(DomainError::unavailable("geolocation", "lookup service unreachable"));
        }
        Ok(self.table.get(&ip).cloned())
    }
}
