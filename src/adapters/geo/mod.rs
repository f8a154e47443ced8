//! Geolocation adapters.

mod http_geo_locator;

pub use http_geo_locator::HttpGeoLocator;
