use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::anomaly::{self, AnomalyConfig};
use super::flags::{self, FlagThresholds, RedFlags};
use super::ratios::{self, CfoPatPolicy, LiquidityRatios};
use super::schema::{self, FinancialRecord, RecordTable};
use super::scoring::{self, BucketBoundary, RiskBucket, WeightScenario};
use super::summary::{self, PortfolioSummary};
use super::table_io::DERIVED_COLUMNS;
use crate::types::*;
use crate::{RiskError, RiskResult};

const DSO_THRESHOLD_MIN: Decimal = dec!(30);
const DSO_THRESHOLD_MAX: Decimal = dec!(365);
const CFO_PAT_THRESHOLD_LIMIT: Decimal = dec!(5);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Days; DSO above this raises Flag_High_DSO.
    pub dso_threshold: Decimal,
    /// CFO / PAT below this raises Flag_Low_Cash_Profit.
    pub cfo_pat_threshold: Multiple,
    pub weight_scenario: WeightScenario,
    pub cfo_pat_policy: CfoPatPolicy,
    pub bucket_boundary: BucketBoundary,
    pub anomaly: AnomalyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dso_threshold: flags::DEFAULT_DSO_THRESHOLD,
            cfo_pat_threshold: flags::DEFAULT_CFO_PAT_THRESHOLD,
            weight_scenario: WeightScenario::default(),
            cfo_pat_policy: CfoPatPolicy::default(),
            bucket_boundary: BucketBoundary::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn flag_thresholds(&self) -> FlagThresholds {
        FlagThresholds {
            dso_threshold: self.dso_threshold,
            cfo_pat_threshold: self.cfo_pat_threshold,
        }
    }

    pub fn validate(&self) -> RiskResult<()> {
        if self.dso_threshold < DSO_THRESHOLD_MIN || self.dso_threshold > DSO_THRESHOLD_MAX {
            return Err(RiskError::InvalidInput {
                field: "dso_threshold".into(),
                reason: format!(
                    "Must be between {DSO_THRESHOLD_MIN} and {DSO_THRESHOLD_MAX} days."
                ),
            });
        }
        if self.cfo_pat_threshold.abs() > CFO_PAT_THRESHOLD_LIMIT {
            return Err(RiskError::InvalidInput {
                field: "cfo_pat_threshold".into(),
                reason: format!(
                    "Must be between -{CFO_PAT_THRESHOLD_LIMIT} and {CFO_PAT_THRESHOLD_LIMIT}."
                ),
            });
        }
        self.anomaly.validate()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScores {
    #[serde(rename = "AI_Anomaly_Score")]
    pub ai_anomaly_score: Score,
    #[serde(rename = "Flag_Score")]
    pub flag_score: Score,
    #[serde(rename = "Liquidity_Risk_Score")]
    pub liquidity_risk_score: Score,
    #[serde(rename = "Risk_Bucket")]
    pub risk_bucket: RiskBucket,
}

/// A record with every derived column populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: FinancialRecord,
    #[serde(flatten)]
    pub ratios: LiquidityRatios,
    #[serde(flatten)]
    pub flags: RedFlags,
    #[serde(flatten)]
    pub scores: RiskScores,
    #[serde(skip)]
    pub model_outlier: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub records: Vec<ScoredRecord>,
    pub summary: PortfolioSummary,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Score every company-year in the table.
///
/// Fails before computing anything when a required column is missing.
/// Anomaly scores are normalized over this batch only, so a record's
/// `AI_Anomaly_Score` depends on which other rows were uploaded with it.
pub fn run_risk_pipeline(
    table: &RecordTable,
    config: &PipelineConfig,
) -> RiskResult<ComputationOutput<RiskReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // -- Validation ----------------------------------------------------------
    config.validate()?;
    schema::validate_columns(table)?;
    if table.is_empty() {
        return Err(RiskError::InsufficientData(
            "The uploaded table has no data rows.".into(),
        ));
    }
    for header in table.headers.iter().filter(|h| DERIVED_COLUMNS.contains(&h.as_str())) {
        warn!(column = %header, "input column is recomputed");
        warnings.push(format!(
            "Input column '{header}' is a derived column; uploaded values are replaced."
        ));
    }

    let records = schema::parse_records(table)?;
    debug!(rows = records.len(), "parsed financial records");

    // -- Ratios --------------------------------------------------------------
    let ratio_rows: Vec<LiquidityRatios> = records
        .iter()
        .map(|r| ratios::compute_ratios(r, config.cfo_pat_policy))
        .collect();
    warnings.extend(undefined_ratio_warnings(&ratio_rows));

    // -- Flags ---------------------------------------------------------------
    let thresholds = config.flag_thresholds();
    let flag_rows: Vec<RedFlags> = ratio_rows
        .iter()
        .map(|r| flags::evaluate_flags(r, &thresholds))
        .collect();

    // -- Anomaly score -------------------------------------------------------
    let features = anomaly::feature_matrix(&ratio_rows);
    let outcome = anomaly::score_batch(&features, &config.anomaly)?;
    if outcome.degenerate {
        warn!(rows = records.len(), "anomaly normalization degenerate; scores set to 0");
        warnings.push(
            "Raw anomaly signal is constant across the batch; \
             AI_Anomaly_Score set to 0 for every row."
                .into(),
        );
    }

    // -- Composite -----------------------------------------------------------
    let scored: Vec<ScoredRecord> = records
        .into_iter()
        .zip(ratio_rows)
        .zip(flag_rows)
        .zip(outcome.scores.into_iter().zip(outcome.outliers))
        .map(|(((record, ratios), flags), (ai_score, outlier))| {
            let flag_score = scoring::flag_score(flags.flag_count);
            let composite = scoring::composite_score(ai_score, flag_score, config.weight_scenario);
            ScoredRecord {
                record,
                ratios,
                flags,
                scores: RiskScores {
                    ai_anomaly_score: ai_score,
                    flag_score,
                    liquidity_risk_score: composite,
                    risk_bucket: scoring::assign_bucket(composite, config.bucket_boundary),
                },
                model_outlier: outlier,
            }
        })
        .collect();

    let summary = summary::summarize(&scored);
    info!(
        firm_years = summary.firm_years,
        high_risk = summary.high_risk_firm_years,
        "liquidity risk pipeline complete"
    );

    let (w_ai, w_flags) = config.weight_scenario.weights();
    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "dso_threshold_days": config.dso_threshold.to_string(),
        "cfo_pat_threshold": config.cfo_pat_threshold.to_string(),
        "cfo_to_pat_policy": config.cfo_pat_policy,
        "weight_scenario": config.weight_scenario.label(),
        "weights": { "ai": w_ai.to_string(), "flags": w_flags.to_string() },
        "flag_points": scoring::FLAG_POINTS.to_string(),
        "bucket_boundary": config.bucket_boundary,
        "anomaly_model": "isolation_forest",
        "anomaly_signal": config.anomaly.signal,
        "contamination": config.anomaly.contamination,
        "n_estimators": config.anomaly.n_estimators,
        "seed": config.anomaly.seed,
        "anomaly_scale": "batch-relative min-max, 0-100",
        "degenerate_fallback": config.anomaly.degenerate_fallback,
        "undefined_features": "substituted with 0",
    });

    Ok(with_metadata(
        "Liquidity manipulation screen (ratio red flags + isolation forest)",
        &assumptions,
        warnings,
        elapsed,
        RiskReport {
            records: scored,
            summary,
        },
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn undefined_ratio_warnings(rows: &[LiquidityRatios]) -> Vec<String> {
    let columns: [(&str, fn(&LiquidityRatios) -> Option<Decimal>); 4] = [
        ("CR", |r| r.cr),
        ("TACR", |r| r.tacr),
        ("DSO", |r| r.dso),
        ("CFO_to_PAT", |r| r.cfo_to_pat),
    ];
    columns
        .iter()
        .filter_map(|(name, get)| {
            let undefined = rows.iter().filter(|r| get(r).is_none()).count();
            (undefined > 0).then(|| {
                format!(
                    "{name} undefined for {undefined} of {} rows; \
                     its flag is not raised and the model sees 0.",
                    rows.len()
                )
            })
        })
        .collect()
}
