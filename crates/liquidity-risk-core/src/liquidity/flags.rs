use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::ratios::LiquidityRatios;
use crate::types::Multiple;

/// Default days-sales-outstanding threshold.
pub const DEFAULT_DSO_THRESHOLD: Decimal = dec!(120);

/// Default CFO / PAT threshold.
pub const DEFAULT_CFO_PAT_THRESHOLD: Multiple = dec!(0.7);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagThresholds {
    pub dso_threshold: Decimal,
    pub cfo_pat_threshold: Multiple,
}

impl Default for FlagThresholds {
    fn default() -> Self {
        Self {
            dso_threshold: DEFAULT_DSO_THRESHOLD,
            cfo_pat_threshold: DEFAULT_CFO_PAT_THRESHOLD,
        }
    }
}

/// The three red flags as 0/1 indicators plus their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlags {
    #[serde(rename = "Flag_High_DSO")]
    pub high_dso: u8,
    #[serde(rename = "Flag_TACR_Mismatch")]
    pub tacr_mismatch: u8,
    #[serde(rename = "Flag_Low_Cash_Profit")]
    pub low_cash_profit: u8,
    #[serde(rename = "Flag_Count")]
    pub flag_count: u8,
}

impl RedFlags {
    fn new(high_dso: bool, tacr_mismatch: bool, low_cash_profit: bool) -> Self {
        let (a, b, c) = (high_dso as u8, tacr_mismatch as u8, low_cash_profit as u8);
        Self {
            high_dso: a,
            tacr_mismatch: b,
            low_cash_profit: c,
            flag_count: a + b + c,
        }
    }
}

/// Evaluate the red-flag rules. An undefined ratio never raises a flag.
pub fn evaluate_flags(ratios: &LiquidityRatios, thresholds: &FlagThresholds) -> RedFlags {
    let high_dso = ratios.dso.is_some_and(|d| d > thresholds.dso_threshold);

    // Comfortable headline ratio but trade-adjusted cover below 1x
    let tacr_mismatch = match (ratios.cr, ratios.tacr) {
        (Some(cr), Some(tacr)) => cr > Decimal::ONE && tacr < Decimal::ONE,
        _ => false,
    };

    let low_cash_profit = ratios
        .cfo_to_pat
        .is_some_and(|r| r < thresholds.cfo_pat_threshold);

    RedFlags::new(high_dso, tacr_mismatch, low_cash_profit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratios(cr: &str, tacr: &str, dso: &str, cfo_to_pat: &str) -> LiquidityRatios {
        let p = |s: &str| s.parse::<Decimal>().ok();
        LiquidityRatios {
            cr: p(cr),
            tacr: p(tacr),
            dso: p(dso),
            cfo_to_pat: p(cfo_to_pat),
            cfo_margin: None,
        }
    }

    #[test]
    fn test_reference_record_flags() {
        let f = evaluate_flags(
            &ratios("2", "1.3333", "109.5", "0.2"),
            &FlagThresholds::default(),
        );
        assert_eq!(f.high_dso, 0);
        assert_eq!(f.tacr_mismatch, 0);
        assert_eq!(f.low_cash_profit, 1);
        assert_eq!(f.flag_count, 1);
    }

    #[test]
    fn test_all_flags_raised() {
        let f = evaluate_flags(&ratios("1.5", "0.8", "150", "0.3"), &FlagThresholds::default());
        assert_eq!(f, RedFlags::new(true, true, true));
        assert_eq!(f.flag_count, 3);
    }

    #[test]
    fn test_dso_threshold_is_strict() {
        let f = evaluate_flags(&ratios("", "", "120", ""), &FlagThresholds::default());
        assert_eq!(f.high_dso, 0);
    }

    #[test]
    fn test_undefined_ratios_never_flag() {
        let f = evaluate_flags(&ratios("", "0.5", "", ""), &FlagThresholds::default());
        assert_eq!(f, RedFlags::default());
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = FlagThresholds {
            dso_threshold: dec!(60),
            cfo_pat_threshold: dec!(-1),
        };
        let f = evaluate_flags(&ratios("0.9", "0.5", "90", "-0.5"), &thresholds);
        assert_eq!(f.high_dso, 1);
        assert_eq!(f.tacr_mismatch, 0);
        assert_eq!(f.low_cash_profit, 0);
    }
}
