//! Portfolio-level figures over a scored batch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::pipeline::ScoredRecord;
use super::scoring::RiskBucket;
use crate::types::Score;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyScore {
    pub year: i32,
    pub firm_years: usize,
    pub mean_risk_score: Score,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub companies_analyzed: usize,
    pub firm_years: usize,
    pub high_risk_firm_years: usize,
    pub medium_risk_firm_years: usize,
    pub low_risk_firm_years: usize,
    /// Firm-years with at least one red flag.
    pub flagged_firm_years: usize,
    /// Firm-years the anomaly model labelled as outliers.
    pub model_outliers: usize,
    /// Mean composite score per year, ascending.
    pub mean_score_by_year: Vec<YearlyScore>,
}

pub fn summarize(records: &[ScoredRecord]) -> PortfolioSummary {
    let companies: BTreeSet<&str> = records.iter().map(|r| r.record.company.as_str()).collect();
    let count = |bucket: RiskBucket| {
        records
            .iter()
            .filter(|r| r.scores.risk_bucket == bucket)
            .count()
    };

    let mut by_year: BTreeMap<i32, (usize, Decimal)> = BTreeMap::new();
    for r in records {
        let entry = by_year.entry(r.record.year).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += r.scores.liquidity_risk_score;
    }

    PortfolioSummary {
        companies_analyzed: companies.len(),
        firm_years: records.len(),
        high_risk_firm_years: count(RiskBucket::High),
        medium_risk_firm_years: count(RiskBucket::Medium),
        low_risk_firm_years: count(RiskBucket::Low),
        flagged_firm_years: records.iter().filter(|r| r.flags.flag_count > 0).count(),
        model_outliers: records.iter().filter(|r| r.model_outlier).count(),
        mean_score_by_year: by_year
            .into_iter()
            .map(|(year, (n, total))| YearlyScore {
                year,
                firm_years: n,
                mean_risk_score: total / Decimal::from(n),
            })
            .collect(),
    }
}
