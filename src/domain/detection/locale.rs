//! Browser locale parsing.
//!
//! Turns an `Accept-Language` header (or a bare locale tag) into a country
//! claim. An explicit region subtag is trusted more than a language whose
//! default region has to be guessed.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::domain::foundation::CountryCode;

/// Confidence for tags carrying an explicit region (`de-AT`).
pub const REGION_SUBTAG_CONFIDENCE: f64 = 0.9;

/// Confidence for language-only tags resolved through the default region.
pub const LANGUAGE_ONLY_CONFIDENCE: f64 = 0.6;

static DEFAULT_REGIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("ar", "SA"),
        ("da", "DK"),
        ("de", "DE"),
        ("el", "GR"),
        ("en", "US"),
        ("es", "ES"),
        ("fi", "FI"),
        ("fr", "FR"),
        ("he", "IL"),
        ("hi", "IN"),
        ("id", "ID"),
        ("it", "IT"),
        ("ja", "JP"),
        ("ko", "KR"),
        ("nb", "NO"),
        ("nl", "NL"),
        ("pl", "PL"),
        ("pt", "BR"),
        ("ru", "RU"),
        ("sv", "SE"),
        ("th", "TH"),
        ("tr", "TR"),
        ("uk", "UA"),
        ("vi", "VN"),
        ("zh", "CN"),
    ])
});

/// A country inferred from a locale, with the confidence of the inference.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleClaim {
    pub country_code: CountryCode,
    pub confidence: f64,
}

/// Parses the highest-quality tag of an `Accept-Language` value.
///
/// Returns `None` for empty headers, wildcards, and languages with no known
/// default region.
pub fn parse_locale(header: &str) -> Option<LocaleClaim> {
    let mut best: Option<(f64, &str)> = None;
    for entry in header.split(',') {
        let mut parts = entry.trim().split(';');
        let tag = parts.next().unwrap_or("").trim();
        if tag.is_empty() || tag == "*" {
            continue;
        }
        let quality = parts
            .find_map(|p| p.trim().strip_prefix("q="))
            .and_then(|q| q.parse::<f64>().ok())
            .unwrap_or(1.0);
        if best.map_or(true, |(q, _)| quality > q) {
            best = Some((quality, tag));
        }
    }

    let (_, tag) = best?;
    claim_for_tag(tag)
}

fn claim_for_tag(tag: &str) -> Option<LocaleClaim> {
    let mut subtags = tag.split(['-', '_']);
    let language = subtags.next()?.to_ascii_lowercase();

    // Region is the first two-letter alphabetic subtag after the language
    // (skips scripts such as `zh-Hant-TW`).
    let region = subtags.find(|s| s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()));
    if let Some(region) = region {
        if let Ok(country_code) = CountryCode::new(region) {
            return Some(LocaleClaim {
                country_code,
                confidence: REGION_SUBTAG_CONFIDENCE,
            });
        }
    }

    let default_region = DEFAULT_REGIONS.get(language.as_str())?;
    CountryCode::new(default_region)
        .ok()
        .map(|country_code| LocaleClaim {
            country_code,
            confidence: LANGUAGE_ONLY_CONFIDENCE,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_subtag_is_trusted() {
        let claim = parse_locale("de-AT").unwrap();
        assert_eq!(claim.country_code.as_str(), "AT");
        assert_eq!(claim.confidence, REGION_SUBTAG_CONFIDENCE);
    }

    #[test]
    fn language_only_uses_default_region() {
        let claim = parse_locale("ja").unwrap();
        assert_eq!(claim.country_code.as_str(), "JP");
        assert_eq!(claim.confidence, LANGUAGE_ONLY_CONFIDENCE);
    }

    #[test]
    fn highest_quality_entry_wins() {
        let claim = parse_locale("en;q=0.5, fr-CA;q=0.9, *;q=0.1").unwrap();
        assert_eq!(claim.country_code.as_str(), "CA");
    }

    #[test]
    fn script_subtag_is_skipped() {
        let claim = parse_locale("zh-Hant-TW").unwrap();
        assert_eq!(claim.country_code.as_str(), "TW");
    }

    #[test]
    fn unknown_or_empty_yields_none() {
        assert!(parse_locale("").is_none());
        assert!(parse_locale("*").is_none());
        assert!(parse_locale("xx").is_none());
    }
}
