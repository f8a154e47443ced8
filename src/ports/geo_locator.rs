//! GeoLocator port - IP address to country lookup.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::domain::foundation::{CountryCode, DomainError};

/// Result of a geolocation lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub country_code: CountryCode,
    /// Provider confidence in [0, 1].
    pub confidence: f64,
}

/// Port for resolving a client IP to a country.
///
/// Callers bound every lookup with a timeout; implementations need not.
#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// `Ok(None)` when the provider has no answer for the address.
    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoLocation>, DomainError>;
}
