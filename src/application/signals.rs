//! Request context and detection-signal collection.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::domain::detection::{parse_locale, DetectionMethod, DetectionSignal};
use crate::domain::emotion::BehavioralTelemetry;
use crate::domain::foundation::{CountryCode, SessionId};
use crate::ports::GeoLocator;

/// Confidence of an explicit user selection.
pub const MANUAL_CONFIDENCE: f64 = 1.0;

/// A country claim carried in from outside the request, e.g. remembered
/// from a prior session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryHint {
    pub country_code: CountryCode,
    pub confidence: f64,
}

impl CountryHint {
    pub fn new(country_code: CountryCode, confidence: f64) -> Self {
        Self {
            country_code,
            confidence,
        }
    }
}

/// Everything the session layer supplies for one request.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonalizationRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub client_ip: Option<IpAddr>,
    #[serde(default)]
    pub accept_language: Option<String>,
    /// Cultural memory from an earlier session.
    #[serde(default)]
    pub prior_session: Option<CountryHint>,
    /// Country suggested by behavioral heuristics upstream.
    #[serde(default)]
    pub behavior_hint: Option<CountryHint>,
    /// Explicit user choice; always wins.
    #[serde(default)]
    pub manual_country: Option<CountryCode>,
    #[serde(default)]
    pub telemetry: Option<BehavioralTelemetry>,
}

impl PersonalizationRequest {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            client_ip: None,
            accept_language: None,
            prior_session: None,
            behavior_hint: None,
            manual_country: None,
            telemetry: None,
        }
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn with_accept_language(mut self, header: impl Into<String>) -> Self {
        self.accept_language = Some(header.into());
        self
    }

    pub fn with_prior_session(mut self, hint: CountryHint) -> Self {
        self.prior_session = Some(hint);
        self
    }

    pub fn with_behavior_hint(mut self, hint: CountryHint) -> Self {
        self.behavior_hint = Some(hint);
        self
    }

    pub fn with_manual_country(mut self, country: CountryCode) -> Self {
        self.manual_country = Some(country);
        self
    }

    pub fn with_telemetry(mut self, telemetry: BehavioralTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

/// Turns a request into detection signals.
pub struct SignalCollector {
    geo: Option<Arc<dyn GeoLocator>>,
    geo_timeout: Duration,
}

impl SignalCollector {
    pub fn new(geo: Option<Arc<dyn GeoLocator>>, geo_timeout: Duration) -> Self {
        Self { geo, geo_timeout }
    }

    /// Collects every signal the request supports. A failed or slow
    /// geolocation lookup only drops the ip signal.
    pub async fn collect(&self, request: &PersonalizationRequest) -> Vec<DetectionSignal> {
        let mut signals = Vec::new();

        if let Some(ip) = request.client_ip {
            if let Some(signal) = self.ip_signal(ip, &request.session_id).await {
                signals.push(signal);
            }
        }

        if let Some(header) = &request.accept_language {
            match parse_locale(header) {
                Some(claim) => signals.push(DetectionSignal::new(
                    DetectionMethod::Locale,
                    claim.country_code,
                    claim.confidence,
                )),
                None => tracing::debug!(session_id = %request.session_id, header = %header, "Unusable locale header"),
            }
        }

        if let Some(hint) = &request.prior_session {
            signals.push(DetectionSignal::new(
                DetectionMethod::NeuralMemory,
                hint.country_code.clone(),
                hint.confidence,
            ));
        }

        if let Some(hint) = &request.behavior_hint {
            signals.push(DetectionSignal::new(
                DetectionMethod::Behavior,
                hint.country_code.clone(),
                hint.confidence,
            ));
        }

        if let Some(country) = &request.manual_country {
            signals.push(DetectionSignal::new(
                DetectionMethod::Manual,
                country.clone(),
                MANUAL_CONFIDENCE,
            ));
        }

        signals
    }

    async fn ip_signal(&self, ip: IpAddr, session_id: &SessionId) -> Option<DetectionSignal> {
        let geo = self.geo.as_ref()?;
        match time::timeout(self.geo_timeout, geo.lookup(ip)).await {
            Ok(Ok(Some(location))) => Some(DetectionSignal::new(
                DetectionMethod::Ip,
                location.country_code,
                location.confidence,
            )),
            Ok(Ok(None)) => {
                tracing::debug!(session_id = %session_id, "Geolocation has no answer for client ip");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(session_id = %session_id, error = %e, "Geolocation failed, dropping ip signal");
                None
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %session_id,
                    timeout_ms = self.geo_timeout.as_millis() as u64,
                    "Geolocation timed out, dropping ip signal"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::StaticGeoLocator;

    fn code(s: &str) -> CountryCode {
        CountryCode::new(s).unwrap()
    }

    fn request() -> PersonalizationRequest {
        PersonalizationRequest::new(SessionId::new("s-1").unwrap())
    }

    #[tokio::test]
    async fn collects_all_supplied_signals() {
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        let geo = StaticGeoLocator::new().with_entry(ip, code("DE"), 0.9);
        let collector = SignalCollector::new(Some(Arc::new(geo)), Duration::from_millis(250));

        let signals = collector
            .collect(
                &request()
                    .with_ip(ip)
                    .with_accept_language("fr-CA,fr;q=0.8")
                    .with_prior_session(CountryHint::new(code("US"), 0.7))
                    .with_manual_country(code("JP")),
            )
            .await;

        let methods: Vec<DetectionMethod> = signals.iter().map(|s| s.method).collect();
        assert_eq!(
            methods,
            vec![
                DetectionMethod::Ip,
                DetectionMethod::Locale,
                DetectionMethod::NeuralMemory,
                DetectionMethod::Manual
            ]
        );
        assert_eq!(signals[1].country_code, code("CA"));
        assert_eq!(signals[3].confidence.value(), 1.0);
    }

    #[tokio::test]
    async fn geolocation_failure_drops_only_ip() {
        let collector = SignalCollector::new(
            Some(Arc::new(StaticGeoLocator::failing())),
            Duration::from_millis(250),
        );
        let signals = collector
            .collect(
                &request()
                    .with_ip("198.51.100.2".parse().unwrap())
                    .with_accept_language("de-DE"),
            )
            .await;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].method, DetectionMethod::Locale);
    }

    #[tokio::test]
    async fn slow_geolocation_is_abandoned() {
        let ip: IpAddr = "198.51.100.3".parse().unwrap();
        let geo = StaticGeoLocator::new()
            .with_entry(ip, code("BR"), 0.9)
            .with_delay(Duration::from_secs(5));
        let collector = SignalCollector::new(Some(Arc::new(geo)), Duration::from_millis(20));

        let signals = collector.collect(&request().with_ip(ip)).await;
        assert!(signals.is_empty());
    }

    #[test]
    fn request_deserializes_from_json() {
        let request: PersonalizationRequest = serde_json::from_str(
            r#"{
                "session_id": "abc",
                "client_ip": "203.0.113.1",
                "accept_language": "ja-JP",
                "prior_session": { "country_code": "jp", "confidence": 0.8 }
            }"#,
        )
        .unwrap();
        assert_eq!(request.session_id.as_str(), "abc");
        assert_eq!(request.prior_session.unwrap().country_code, code("JP"));
        assert!(request.manual_country.is_none());
        assert!(request.telemetry.is_none());
    }

    #[tokio::test]
    async fn no_geolocator_means_no_ip_signal() {
        let collector = SignalCollector::new(None, Duration::from_millis(250));
        let signals = collector
            .collect(&request().with_ip("198.51.100.4".parse().unwrap()))
            .await;
        assert!(signals.is_empty());
    }
}
