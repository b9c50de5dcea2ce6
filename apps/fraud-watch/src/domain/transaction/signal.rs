//! Fraud signal normalization.
//!
//! The predictor reports fraud through any mix of `is_fraud`, `prediction`,
//! `fraud_probability` and `status`. [`RiskSignal::classify`] is the single
//! rule that turns them into one tagged value:
//!
//! 1. `Confirmed` when `is_fraud` is true or `status == "fraud"`.
//! 2. Otherwise `Suspected` when `prediction` is true, `status ==
//!    "hot_potential"`, or the score is `>= alert_cutoff`.
//! 3. Otherwise `Clear`.
//!
//! The score is [`FraudSignal::score`]: `fraud_probability`, else the
//! upstream `features.risk_score`. Alerting, the high-risk cutoff and
//! [`RiskBand`] all read that same value.

use serde::{Deserialize, Serialize};

/// Status enum reported by some predictor variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudStatus {
    /// Confirmed fraud.
    Fraud,
    /// Likely fraud, pending review.
    HotPotential,
    /// Cleared.
    NoFraud,
    /// Any other value, kept verbatim.
    Other(String),
}

impl FraudStatus {
    /// Parse a status string, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "fraud" => Self::Fraud,
            "hot_potential" | "hot-potential" => Self::HotPotential,
            "no_fraud" | "no-fraud" => Self::NoFraud,
            _ => Self::Other(s.to_string()),
        }
    }
}

/// Raw fraud fields carried by a transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FraudSignal {
    /// Ground-truth or confirmed fraud flag.
    pub is_fraud: Option<bool>,
    /// Model's boolean decision.
    pub prediction: Option<bool>,
    /// Model's fraud probability in `[0, 1]`.
    pub fraud_probability: Option<f64>,
    /// Status enum.
    pub status: Option<FraudStatus>,
    /// Upstream feature `risk_score` in `[0, 1]`.
    pub risk_score: Option<f64>,
}

impl FraudSignal {
    /// Best available continuous score: the model probability, else the
    /// upstream risk score.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.fraud_probability.or(self.risk_score)
    }
}

/// Normalized risk of a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "level", content = "probability", rename_all = "snake_case")]
pub enum RiskSignal {
    /// Confirmed fraud.
    Confirmed,
    /// Suspected fraud, with the score when one was reported.
    Suspected(Option<f64>),
    /// No material risk.
    Clear,
}

impl RiskSignal {
    /// Classify raw fraud fields against the alert cutoff.
    #[must_use]
    pub fn classify(signal: &FraudSignal, alert_cutoff: f64) -> Self {
        if signal.is_fraud == Some(true) || signal.status == Some(FraudStatus::Fraud) {
            return Self::Confirmed;
        }

        let score = signal.score();
        let over_cutoff = score.is_some_and(|p| p >= alert_cutoff);

        if signal.prediction == Some(true)
            || signal.status == Some(FraudStatus::HotPotential)
            || over_cutoff
        {
            return Self::Suspected(score);
        }

        Self::Clear
    }

    /// Whether this signal crosses the alert threshold.
    #[must_use]
    pub const fn is_alert(self) -> bool {
        matches!(self, Self::Confirmed | Self::Suspected(_))
    }

    /// Short label used for logging and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Suspected(_) => "suspected",
            Self::Clear => "clear",
        }
    }
}

/// Coarse risk band used for the distribution chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    /// Score at or above the alert cutoff.
    High,
    /// Score at or above the medium cutoff.
    Medium,
    /// Everything else.
    Low,
}

impl RiskBand {
    /// Band a transaction by its score, falling back to its signal when the
    /// predictor reported no score.
    #[must_use]
    pub fn of(score: Option<f64>, risk: RiskSignal, alert_cutoff: f64, medium_cutoff: f64) -> Self {
        match score {
            Some(s) if s >= alert_cutoff => Self::High,
            Some(s) if s >= medium_cutoff => Self::Medium,
            Some(_) => Self::Low,
            None => match risk {
                RiskSignal::Confirmed => Self::High,
                RiskSignal::Suspected(_) => Self::Medium,
                RiskSignal::Clear => Self::Low,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const CUTOFF: f64 = 0.7;

    fn signal(
        is_fraud: Option<bool>,
        prediction: Option<bool>,
        probability: Option<f64>,
        status: Option<&str>,
    ) -> FraudSignal {
        FraudSignal {
            is_fraud,
            prediction,
            fraud_probability: probability,
            status: status.map(FraudStatus::parse),
            risk_score: None,
        }
    }

    #[test_case(signal(Some(true), None, None, None), RiskSignal::Confirmed ; "fraud flag")]
    #[test_case(signal(None, None, None, Some("fraud")), RiskSignal::Confirmed ; "fraud status")]
    #[test_case(signal(Some(true), Some(false), Some(0.1), None), RiskSignal::Confirmed ; "flag beats low probability")]
    #[test_case(signal(None, Some(true), None, None), RiskSignal::Suspected(None) ; "prediction")]
    #[test_case(signal(None, None, None, Some("hot_potential")), RiskSignal::Suspected(None) ; "hot potential status")]
    #[test_case(signal(None, None, Some(0.7), None), RiskSignal::Suspected(Some(0.7)) ; "probability at cutoff")]
    #[test_case(signal(None, None, Some(0.69), None), RiskSignal::Clear ; "probability below cutoff")]
    #[test_case(signal(Some(false), Some(false), None, Some("no_fraud")), RiskSignal::Clear ; "all clear")]
    #[test_case(FraudSignal::default(), RiskSignal::Clear ; "no fields")]
    fn classify(input: FraudSignal, expected: RiskSignal) {
        assert_eq!(RiskSignal::classify(&input, CUTOFF), expected);
    }

    #[test]
    fn risk_score_alone_drives_alert_and_band() {
        let s = FraudSignal {
            risk_score: Some(0.95),
            ..FraudSignal::default()
        };
        let risk = RiskSignal::classify(&s, CUTOFF);

        assert_eq!(risk, RiskSignal::Suspected(Some(0.95)));
        assert!(risk.is_alert());
        assert_eq!(RiskBand::of(s.score(), risk, CUTOFF, 0.3), RiskBand::High);

        let low = FraudSignal {
            risk_score: Some(0.5),
            ..FraudSignal::default()
        };
        assert_eq!(RiskSignal::classify(&low, CUTOFF), RiskSignal::Clear);
    }

    #[test]
    fn probability_outranks_risk_score() {
        let s = FraudSignal {
            fraud_probability: Some(0.2),
            risk_score: Some(0.95),
            ..FraudSignal::default()
        };
        assert_eq!(RiskSignal::classify(&s, CUTOFF), RiskSignal::Clear);
    }

    #[test]
    fn alert_threshold() {
        assert!(RiskSignal::Confirmed.is_alert());
        assert!(RiskSignal::Suspected(None).is_alert());
        assert!(!RiskSignal::Clear.is_alert());
    }

    #[test]
    fn score_prefers_probability() {
        let s = FraudSignal {
            fraud_probability: Some(0.4),
            risk_score: Some(0.9),
            ..FraudSignal::default()
        };
        assert_eq!(s.score(), Some(0.4));

        let s = FraudSignal {
            risk_score: Some(0.9),
            ..FraudSignal::default()
        };
        assert_eq!(s.score(), Some(0.9));
    }

    #[test]
    fn status_parsing_is_lenient() {
        assert_eq!(FraudStatus::parse(" Fraud "), FraudStatus::Fraud);
        assert_eq!(FraudStatus::parse("hot-potential"), FraudStatus::HotPotential);
        assert_eq!(
            FraudStatus::parse("escalated"),
            FraudStatus::Other("escalated".to_string())
        );
    }

    #[test]
    fn bands() {
        assert_eq!(RiskBand::of(Some(0.95), RiskSignal::Clear, 0.7, 0.3), RiskBand::High);
        assert_eq!(RiskBand::of(Some(0.3), RiskSignal::Clear, 0.7, 0.3), RiskBand::Medium);
        assert_eq!(RiskBand::of(Some(0.1), RiskSignal::Confirmed, 0.7, 0.3), RiskBand::Low);
        assert_eq!(RiskBand::of(None, RiskSignal::Confirmed, 0.7, 0.3), RiskBand::High);
        assert_eq!(RiskBand::of(None, RiskSignal::Suspected(None), 0.7, 0.3), RiskBand::Medium);
    }
}
