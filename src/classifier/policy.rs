//! Confidence threshold policy.
//!
//! Maps a classification result to its side effects. Safe results never
//! produce anything, at any confidence.

use crate::config::ThresholdConfig;
use crate::types::{ClassificationResult, RiskLevel};

/// Side effects a result qualifies for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyDecision {
    pub place_marker: bool,
    pub raise_alert: bool,
}

impl PolicyDecision {
    pub const NONE: PolicyDecision = PolicyDecision {
        place_marker: false,
        raise_alert: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    thresholds: ThresholdConfig,
}

impl ThresholdPolicy {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn evaluate(&self, result: &ClassificationResult) -> PolicyDecision {
        let confidence = result.confidence;
        match result.risk_level {
            RiskLevel::Safe => PolicyDecision::NONE,
            RiskLevel::Caution => PolicyDecision {
                place_marker: confidence > self.thresholds.caution_marker,
                raise_alert: false,
            },
            RiskLevel::Danger => {
                let raise_alert = confidence > self.thresholds.danger_alert;
                PolicyDecision {
                    // An alert always comes with a marker
                    place_marker: raise_alert || confidence > self.thresholds.danger_marker,
                    raise_alert,
                }
            }
        }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(ThresholdConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(level: RiskLevel, confidence: f64) -> (bool, bool) {
        let decision = ThresholdPolicy::default().evaluate(&ClassificationResult::new(level, confidence));
        (decision.place_marker, decision.raise_alert)
    }

    #[test]
    fn test_danger_thresholds() {
        assert_eq!(decide(RiskLevel::Danger, 0.2), (false, false));
        assert_eq!(decide(RiskLevel::Danger, 0.25), (false, false));
        assert_eq!(decide(RiskLevel::Danger, 0.3), (true, false));
        assert_eq!(decide(RiskLevel::Danger, 0.5), (true, false));
        assert_eq!(decide(RiskLevel::Danger, 0.6), (true, true));
        assert_eq!(decide(RiskLevel::Danger, 0.82), (true, true));
    }

    #[test]
    fn test_caution_thresholds() {
        assert_eq!(decide(RiskLevel::Caution, 0.3), (false, false));
        assert_eq!(decide(RiskLevel::Caution, 0.31), (true, false));
        assert_eq!(decide(RiskLevel::Caution, 1.0), (true, false));
    }

    #[test]
    fn test_safe_never_acts() {
        for confidence in [0.0, 0.5, 0.95, 1.0] {
            assert_eq!(decide(RiskLevel::Safe, confidence), (false, false));
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let policy = ThresholdPolicy::new(ThresholdConfig {
            danger_alert: 0.9,
            danger_marker: 0.1,
            caution_marker: 0.8,
        });
        let decision = policy.evaluate(&ClassificationResult::new(RiskLevel::Danger, 0.6));
        assert_eq!(
            decision,
            PolicyDecision {
                place_marker: true,
                raise_alert: false
            }
        );
        assert_eq!(
            policy.evaluate(&ClassificationResult::new(RiskLevel::Caution, 0.6)),
            PolicyDecision::NONE
        );
    }
}
