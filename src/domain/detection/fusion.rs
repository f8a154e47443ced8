//! Multi-signal weighted fusion.
//!
//! Each signal contributes `method_weight * confidence` to its claimed
//! country; the country with the highest accumulated score wins and the
//! output confidence is that score capped at 1.0. Exact ties prefer the
//! country backed by the most trusted method, then the lexicographically
//! smallest country code.

use std::collections::BTreeMap;

use super::signal::{DetectionMethod, DetectionSignal, MethodWeights};
use crate::domain::foundation::CountryCode;

/// Scores closer than this are treated as tied.
const SCORE_EPSILON: f64 = 1e-9;

/// Outcome of fusing a non-empty signal set.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFusion {
    pub country_code: CountryCode,
    /// Accumulated score of the winner, capped at 1.0.
    pub confidence: f64,
    /// Method that contributed most to the winning country.
    pub method: DetectionMethod,
    /// Accumulated (uncapped) score per claimed country.
    pub scores: BTreeMap<CountryCode, f64>,
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    score: f64,
    max_method_weight: f64,
    lead: Contribution,
}

#[derive(Debug, Clone, Copy)]
struct Contribution {
    value: f64,
    method_weight: f64,
    method: DetectionMethod,
}

impl Contribution {
    fn outranks(&self, other: &Contribution) -> bool {
        if (self.value - other.value).abs() > SCORE_EPSILON {
            return self.value > other.value;
        }
        if (self.method_weight - other.method_weight).abs() > SCORE_EPSILON {
            return self.method_weight > other.method_weight;
        }
        self.method < other.method
    }
}

/// Stateless weighted-fusion detector.
pub struct MultiSignalDetector;

impl MultiSignalDetector {
    /// Fuses signals into a single country decision.
    ///
    /// Returns `None` only when `signals` is empty; callers substitute the
    /// fallback profile in that case.
    pub fn fuse(signals: &[DetectionSignal], weights: &MethodWeights) -> Option<SignalFusion> {
        let mut tallies: BTreeMap<CountryCode, Tally> = BTreeMap::new();

        for signal in signals {
            let method_weight = weights.weight(signal.method);
            let contribution = Contribution {
                value: method_weight * signal.confidence.value(),
                method_weight,
                method: signal.method,
            };

            tallies
                .entry(signal.country_code.clone())
                .and_modify(|tally| {
                    tally.score += contribution.value;
                    tally.max_method_weight = tally.max_method_weight.max(method_weight);
                    if contribution.outranks(&tally.lead) {
                        tally.lead = contribution;
                    }
                })
                .or_insert(Tally {
                    score: contribution.value,
                    max_method_weight: method_weight,
                    lead: contribution,
                });
        }

        // BTreeMap iterates in ascending country order, so keeping the
        // incumbent on a full tie yields the lexicographic tie-break.
        let mut winner: Option<(&CountryCode, &Tally)> = None;
        for (country, tally) in &tallies {
            winner = match winner {
                None => Some((country, tally)),
                Some((_, best)) if Self::beats(tally, best) => Some((country, tally)),
                keep => keep,
            };
        }

        let (country, tally) = winner?;
        Some(SignalFusion {
            country_code: country.clone(),
            confidence: tally.score.min(1.0),
            method: tally.lead.method,
            scores: tallies.iter().map(|(c, t)| (c.clone(), t.score)).collect(),
        })
    }

    fn beats(candidate: &Tally, incumbent: &Tally) -> bool {
        if (candidate.score - incumbent.score).abs() > SCORE_EPSILON {
            return candidate.score > incumbent.score;
        }
        candidate.max_method_weight > incumbent.max_method_weight + SCORE_EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(method: DetectionMethod, country: &str, confidence: f64) -> DetectionSignal {
        DetectionSignal::new(method, CountryCode::new(country).unwrap(), confidence)
    }

    fn fuse(signals: &[DetectionSignal]) -> SignalFusion {
        MultiSignalDetector::fuse(signals, &MethodWeights::default()).unwrap()
    }

    #[test]
    fn empty_signal_set_yields_none() {
        assert!(MultiSignalDetector::fuse(&[], &MethodWeights::default()).is_none());
    }

    #[test]
    fn single_ip_signal_is_weighted() {
        let result = fuse(&[signal(DetectionMethod::Ip, "DE", 0.6)]);
        assert_eq!(result.country_code.as_str(), "DE");
        assert!((result.confidence - 0.18).abs() < 1e-9);
        assert_eq!(result.method, DetectionMethod::Ip);
    }

    #[test]
    fn corroborating_signals_accumulate() {
        let result = fuse(&[
            signal(DetectionMethod::Ip, "DE", 0.6),
            signal(DetectionMethod::Locale, "DE", 0.9),
        ]);
        assert_eq!(result.country_code.as_str(), "DE");
        assert!((result.confidence - 0.36).abs() < 1e-9);
        // Equal contributions: the more trusted method leads.
        assert_eq!(result.method, DetectionMethod::Ip);
    }

    #[test]
    fn weighted_score_beats_raw_confidence() {
        let result = fuse(&[
            signal(DetectionMethod::NeuralMemory, "JP", 0.5),
            signal(DetectionMethod::Ip, "US", 0.9),
        ]);
        assert_eq!(result.country_code.as_str(), "US");
        assert!((result.confidence - 0.27).abs() < 1e-9);
        assert!((result.scores[&CountryCode::new("JP").unwrap()] - 0.2).abs() < 1e-9);
    }

    #[test]
    fn tie_prefers_higher_method_weight() {
        // FR: ip 0.3 * 0.5 = 0.15; ES: locale 0.2 * 0.75 = 0.15
        let result = fuse(&[
            signal(DetectionMethod::Locale, "ES", 0.75),
            signal(DetectionMethod::Ip, "FR", 0.5),
        ]);
        assert_eq!(result.country_code.as_str(), "FR");
    }

    #[test]
    fn full_tie_prefers_lexicographic_country() {
        let result = fuse(&[
            signal(DetectionMethod::Ip, "NL", 0.5),
            signal(DetectionMethod::Ip, "BE", 0.5),
        ]);
        assert_eq!(result.country_code.as_str(), "BE");
    }

    #[test]
    fn confidence_is_capped_at_one() {
        let result = fuse(&[
            signal(DetectionMethod::Manual, "IT", 1.0),
            signal(DetectionMethod::NeuralMemory, "IT", 1.0),
            signal(DetectionMethod::Ip, "IT", 1.0),
        ]);
        assert_eq!(result.confidence, 1.0);
    }
}
