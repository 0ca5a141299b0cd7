use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{Rate, Score};
use crate::RiskError;

/// Points contributed by each raised red flag.
pub const FLAG_POINTS: Decimal = dec!(33);

/// Composite score at or above which a record is High risk.
pub const HIGH_RISK_CUTOFF: Score = dec!(70);

/// Composite score at or above which a record is Medium risk.
pub const MEDIUM_RISK_CUTOFF: Score = dec!(40);

// ---------------------------------------------------------------------------
// Weight scenarios
// ---------------------------------------------------------------------------

/// Blend of model score and rule-based flag score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightScenario {
    #[default]
    #[serde(rename = "AI 60% - Flags 40%")]
    Ai60Flags40,
    #[serde(rename = "AI 50% - Flags 50%")]
    Ai50Flags50,
    #[serde(rename = "AI 70% - Flags 30%")]
    Ai70Flags30,
}

impl WeightScenario {
    pub const ALL: [WeightScenario; 3] = [
        WeightScenario::Ai60Flags40,
        WeightScenario::Ai50Flags50,
        WeightScenario::Ai70Flags30,
    ];

    /// (AI weight, flag weight); the pair always sums to one.
    pub fn weights(&self) -> (Rate, Rate) {
        match self {
            Self::Ai60Flags40 => (dec!(0.6), dec!(0.4)),
            Self::Ai50Flags50 => (dec!(0.5), dec!(0.5)),
            Self::Ai70Flags30 => (dec!(0.7), dec!(0.3)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ai60Flags40 => "AI 60% - Flags 40%",
            Self::Ai50Flags50 => "AI 50% - Flags 50%",
            Self::Ai70Flags30 => "AI 70% - Flags 30%",
        }
    }

    pub fn alias(&self) -> &'static str {
        match self {
            Self::Ai60Flags40 => "ai60-flags40",
            Self::Ai50Flags50 => "ai50-flags50",
            Self::Ai70Flags30 => "ai70-flags30",
        }
    }
}

impl fmt::Display for WeightScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for WeightScenario {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|w| {
                w.label().eq_ignore_ascii_case(wanted) || w.alias().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| RiskError::InvalidInput {
                field: "weight_scenario".into(),
                reason: format!(
                    "Unknown scenario '{wanted}'. Use one of: {}",
                    Self::ALL.map(|w| w.alias()).join(", ")
                ),
            })
    }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskBucket {
    High,
    Medium,
    Low,
}

impl fmt::Display for RiskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        };
        write!(f, "{}", s)
    }
}

/// Whether a score sitting exactly on a cutoff falls into the higher bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketBoundary {
    /// `score >= cutoff`
    #[default]
    Inclusive,
    /// `score > cutoff`
    Strict,
}

impl BucketBoundary {
    fn reaches(&self, score: Score, cutoff: Score) -> bool {
        match self {
            Self::Inclusive => score >= cutoff,
            Self::Strict => score > cutoff,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

pub fn flag_score(flag_count: u8) -> Score {
    Decimal::from(flag_count) * FLAG_POINTS
}

pub fn composite_score(
    ai_anomaly_score: Score,
    flag_score: Score,
    scenario: WeightScenario,
) -> Score {
    let (w_ai, w_flags) = scenario.weights();
    w_ai * ai_anomaly_score + w_flags * flag_score
}

pub fn assign_bucket(score: Score, boundary: BucketBoundary) -> RiskBucket {
    if boundary.reaches(score, HIGH_RISK_CUTOFF) {
        RiskBucket::High
    } else if boundary.reaches(score, MEDIUM_RISK_CUTOFF) {
        RiskBucket::Medium
    } else {
        RiskBucket::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        for w in WeightScenario::ALL {
            let (a, f) = w.weights();
            assert_eq!(a + f, Decimal::ONE, "{w}");
        }
    }

    #[test]
    fn test_parse_labels_and_aliases() {
        assert_eq!(
            "AI 50% - Flags 50%".parse::<WeightScenario>().unwrap(),
            WeightScenario::Ai50Flags50
        );
        assert_eq!(
            "AI70-FLAGS30".parse::<WeightScenario>().unwrap(),
            WeightScenario::Ai70Flags30
        );
        assert!("ai80-flags20".parse::<WeightScenario>().is_err());
    }

    #[test]
    fn test_serde_uses_scenario_labels() {
        let json = serde_json::to_string(&WeightScenario::Ai70Flags30).unwrap();
        assert_eq!(json, "\"AI 70% - Flags 30%\"");
    }

    #[test]
    fn test_flag_score() {
        assert_eq!(flag_score(0), Decimal::ZERO);
        assert_eq!(flag_score(1), dec!(33));
        assert_eq!(flag_score(3), dec!(99));
    }

    #[test]
    fn test_composite_default_scenario() {
        // 0.6 * 100 + 0.4 * 66 = 86.4
        assert_eq!(
            composite_score(dec!(100), dec!(66), WeightScenario::Ai60Flags40),
            dec!(86.4)
        );
        // 0.7 * 0 + 0.3 * 33 = 9.9
        assert_eq!(
            composite_score(Decimal::ZERO, dec!(33), WeightScenario::Ai70Flags30),
            dec!(9.9)
        );
    }

    #[test]
    fn test_inclusive_boundaries() {
        let b = BucketBoundary::Inclusive;
        assert_eq!(assign_bucket(dec!(70), b), RiskBucket::High);
        assert_eq!(assign_bucket(dec!(69.99), b), RiskBucket::Medium);
        assert_eq!(assign_bucket(dec!(40), b), RiskBucket::Medium);
        assert_eq!(assign_bucket(dec!(39.99), b), RiskBucket::Low);
    }

    #[test]
    fn test_strict_boundaries() {
        let b = BucketBoundary::Strict;
        assert_eq!(assign_bucket(dec!(70), b), RiskBucket::Medium);
        assert_eq!(assign_bucket(dec!(70.01), b), RiskBucket::High);
        assert_eq!(assign_bucket(dec!(40), b), RiskBucket::Low);
    }

    #[test]
    fn test_bucket_is_monotonic() {
        let rank = |b: RiskBucket| match b {
            RiskBucket::Low => 0,
            RiskBucket::Medium => 1,
            RiskBucket::High => 2,
        };
        let mut prev = 0;
        for i in 0..=1000 {
            let score = Decimal::from(i) / dec!(10);
            let r = rank(assign_bucket(score, BucketBoundary::Inclusive));
            assert!(r >= prev);
            prev = r;
        }
    }
}
