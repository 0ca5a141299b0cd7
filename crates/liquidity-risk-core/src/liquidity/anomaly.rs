//! Isolation-forest anomaly scoring over the liquidity feature set.
//!
//! Each tree isolates points by recursive random axis-aligned splits on a
//! sub-sample of the batch; points that isolate in few splits are
//! anomalous. The batch's raw signal is then min-max normalized to 0-100,
//! so scores are relative to the other rows of the same upload.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ratios::LiquidityRatios;
use crate::types::Score;
use crate::{RiskError, RiskResult};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Decimal places kept on the normalized score.
const SCORE_DP: u32 = 6;

/// CR, TACR, DSO, CFO_to_PAT.
pub const FEATURE_COUNT: usize = 4;

pub type FeatureRow = [f64; FEATURE_COUNT];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which model output is sign-inverted and normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySignal {
    /// Outlier label: +1 for the contamination share of the batch, -1 otherwise.
    #[default]
    Label,
    /// Continuous isolation score in (0, 1].
    Score,
}

/// What to do when the raw signal is constant across the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateFallback {
    /// Every row scores 0.
    #[default]
    Zero,
    /// Abort with `RiskError::DegenerateBatch`.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Expected share of anomalous rows, in (0, 0.5].
    pub contamination: f64,
    pub n_estimators: usize,
    /// Sub-sample size per tree, capped at the batch size.
    pub max_samples: usize,
    /// Optional seed for reproducibility.
    pub seed: Option<u64>,
    pub signal: AnomalySignal,
    pub degenerate_fallback: DegenerateFallback,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.25,
            n_estimators: 200,
            max_samples: 256,
            seed: Some(42),
            signal: AnomalySignal::default(),
            degenerate_fallback: DegenerateFallback::default(),
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(RiskError::InvalidInput {
                field: "contamination".into(),
                reason: "Must be in (0, 0.5].".into(),
            });
        }
        if self.n_estimators == 0 {
            return Err(RiskError::InvalidInput {
                field: "n_estimators".into(),
                reason: "At least one tree is required.".into(),
            });
        }
        if self.max_samples < 2 {
            return Err(RiskError::InvalidInput {
                field: "max_samples".into(),
                reason: "Must be at least 2.".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Grow `n_estimators` isolation trees on sub-samples of `data`.
    pub fn fit(
        data: &[FeatureRow],
        n_estimators: usize,
        max_samples: usize,
        rng: &mut StdRng,
    ) -> RiskResult<Self> {
        if data.len() < 2 {
            return Err(RiskError::InsufficientData(
                "Isolation forest needs at least two rows".into(),
            ));
        }
        let sample_size = max_samples.clamp(2, data.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..n_estimators)
            .map(|_| {
                let sample = index::sample(&mut *rng, data.len(), sample_size).into_vec();
                grow(data, sample, 0, height_limit, &mut *rng)
            })
            .collect();

        Ok(Self { trees, sample_size })
    }

    /// Anomaly score per row in (0, 1]; higher is more anomalous.
    pub fn score_samples(&self, data: &[FeatureRow]) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        data.iter()
            .map(|x| {
                let total: f64 = self.trees.iter().map(|t| path_length(t, x, 0)).sum();
                let mean = total / self.trees.len() as f64;
                2f64.powf(-mean / norm)
            })
            .collect()
    }
}

fn grow(
    data: &[FeatureRow],
    sample: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    // Only features that still vary within the node can split it
    let candidates: Vec<(usize, f64, f64)> = (0..FEATURE_COUNT)
        .filter_map(|f| {
            let (lo, hi) = sample
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(data[i][f]), hi.max(data[i][f]))
                });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();
    if candidates.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) = sample
        .into_iter()
        .partition(|&i| data[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(data, left, depth + 1, height_limit, rng)),
        right: Box::new(grow(data, right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, x: &FeatureRow, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if x[*feature] <= *threshold {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ---------------------------------------------------------------------------
// Batch scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyOutcome {
    /// Normalized 0-100 score per row.
    pub scores: Vec<Score>,
    /// Model outlier label per row.
    pub outliers: Vec<bool>,
    /// True when the fallback replaced an undefined normalization.
    pub degenerate: bool,
}

/// Feature rows in CR, TACR, DSO, CFO_to_PAT order; undefined ratios become 0.
pub fn feature_matrix(ratios: &[LiquidityRatios]) -> Vec<FeatureRow> {
    let f = |v: Option<Decimal>| v.and_then(|d| d.to_f64()).unwrap_or(0.0);
    ratios
        .iter()
        .map(|r| [f(r.cr), f(r.tacr), f(r.dso), f(r.cfo_to_pat)])
        .collect()
}

/// Min-max scale to 0-100. `None` when fewer than two values or max == min.
pub fn min_max_normalize(raw: &[f64]) -> Option<Vec<f64>> {
    if raw.len() < 2 {
        return None;
    }
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > min) {
        return None;
    }
    Some(raw.iter().map(|v| (v - min) / (max - min) * 100.0).collect())
}

/// Fit the forest on the batch and produce normalized anomaly scores.
pub fn score_batch(
    features: &[FeatureRow],
    config: &AnomalyConfig,
) -> RiskResult<AnomalyOutcome> {
    config.validate()?;
    let n = features.len();
    if n < 2 {
        return degenerate_outcome(n, vec![false; n], config);
    }

    let mut rng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let forest = IsolationForest::fit(
        features,
        config.n_estimators,
        config.max_samples,
        &mut rng,
    )?;
    let scores = forest.score_samples(features);

    // Decision offset at the contamination quantile of the inverted scores
    let inverted: Vec<f64> = scores.iter().map(|s| -s).collect();
    let offset = percentile(&inverted, config.contamination * 100.0);
    let outliers: Vec<bool> = inverted.iter().map(|s| *s < offset).collect();
    debug!(
        rows = n,
        outliers = outliers.iter().filter(|o| **o).count(),
        "isolation forest fitted"
    );

    let raw: Vec<f64> = match config.signal {
        AnomalySignal::Label => outliers
            .iter()
            .map(|&o| if o { 1.0 } else { -1.0 })
            .collect(),
        AnomalySignal::Score => scores,
    };

    match min_max_normalize(&raw) {
        Some(normalized) => Ok(AnomalyOutcome {
            scores: normalized.into_iter().map(to_score).collect(),
            outliers,
            degenerate: false,
        }),
        None => degenerate_outcome(n, outliers, config),
    }
}

fn degenerate_outcome(
    n: usize,
    outliers: Vec<bool>,
    config: &AnomalyConfig,
) -> RiskResult<AnomalyOutcome> {
    match config.degenerate_fallback {
        DegenerateFallback::Zero => Ok(AnomalyOutcome {
            scores: vec![Decimal::ZERO; n],
            outliers,
            degenerate: true,
        }),
        DegenerateFallback::Fail => Err(RiskError::DegenerateBatch(format!(
            "raw anomaly signal is constant across {n} row(s); normalization undefined"
        ))),
    }
}

fn to_score(v: f64) -> Score {
    Decimal::from_f64(v).unwrap_or_default().round_dp(SCORE_DP)
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
