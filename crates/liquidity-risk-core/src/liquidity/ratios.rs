use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::schema::FinancialRecord;
use crate::types::{Money, Multiple};

/// Days in the DSO year convention.
const DAYS_PER_YEAR: Decimal = dec!(365);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// When CFO / PAT is defined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CfoPatPolicy {
    /// Only for strictly positive net profit.
    #[default]
    PositiveProfit,
    /// For any non-zero net profit, losses included.
    NonZeroProfit,
}

/// Liquidity ratios for one record. `None` is an undefined ratio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiquidityRatios {
    #[serde(rename = "CR")]
    pub cr: Option<Multiple>,
    #[serde(rename = "TACR")]
    pub tacr: Option<Multiple>,
    #[serde(rename = "DSO")]
    pub dso: Option<Decimal>,
    #[serde(rename = "CFO_to_PAT")]
    pub cfo_to_pat: Option<Multiple>,
    #[serde(rename = "CFO_margin")]
    pub cfo_margin: Option<Multiple>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the five liquidity ratios for a single record.
pub fn compute_ratios(record: &FinancialRecord, policy: CfoPatPolicy) -> LiquidityRatios {
    let cr = safe_ratio(record.total_current_assets, record.total_current_liabilities);

    let tacr = safe_ratio(
        checked_sum(record.cash, record.receivables),
        checked_sum(record.trade_payables, record.short_term_borrowings),
    );

    // Scale before dividing so an exact day count is not rounded at 28 digits
    let dso = safe_ratio(
        record.receivables.and_then(|r| r.checked_mul(DAYS_PER_YEAR)),
        record.sales,
    );

    let pat = record.net_profit.filter(|np| match policy {
        CfoPatPolicy::PositiveProfit => *np > Decimal::ZERO,
        CfoPatPolicy::NonZeroProfit => !np.is_zero(),
    });
    let cfo_to_pat = safe_ratio(record.cfo, pat);

    let cfo_margin = safe_ratio(record.cfo, record.sales);

    LiquidityRatios {
        cr,
        tacr,
        dso,
        cfo_to_pat,
        cfo_margin,
    }
}

/// Division that degrades to `None` on an undefined operand, a zero
/// denominator, or decimal overflow.
pub fn safe_ratio(numerator: Option<Money>, denominator: Option<Money>) -> Option<Decimal> {
    let (n, d) = (numerator?, denominator?);
    if d.is_zero() {
        return None;
    }
    n.checked_div(d)
}

fn checked_sum(a: Option<Money>, b: Option<Money>) -> Option<Money> {
    a?.checked_add(b?)
}
