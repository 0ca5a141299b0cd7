use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

use liquidity_risk_core::liquidity::anomaly::{AnomalySignal, DegenerateFallback};
use liquidity_risk_core::liquidity::ratios::CfoPatPolicy;
use liquidity_risk_core::liquidity::schema::{self, REQUIRED_COLUMNS};
use liquidity_risk_core::liquidity::scoring::{BucketBoundary, WeightScenario};
use liquidity_risk_core::liquidity::{pipeline, table_io, PipelineConfig, RecordTable};

use crate::input;

/// Arguments for scoring a financial statements table
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct AnalyzeArgs {
    /// Financial statements CSV or .xlsx workbook (reads piped CSV when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Path to a JSON pipeline configuration (flags below override it)
    #[arg(long)]
    pub config: Option<String>,

    /// Write the input table plus every derived column to this CSV or .xlsx file
    #[arg(long)]
    pub output_file: Option<String>,

    /// DSO threshold in days (30 to 365)
    #[arg(long)]
    pub dso_threshold: Option<Decimal>,

    /// CFO / PAT threshold (-5.0 to 5.0)
    #[arg(long)]
    pub cfo_pat_threshold: Option<Decimal>,

    /// Weight scenario: ai60-flags40, ai50-flags50, ai70-flags30
    #[arg(long)]
    pub weights: Option<WeightScenario>,

    /// When CFO / PAT is defined
    #[arg(long, value_enum)]
    pub cfo_pat_policy: Option<PolicyArg>,

    /// Whether a score equal to 40 or 70 moves up a bucket
    #[arg(long, value_enum)]
    pub bucket_boundary: Option<BoundaryArg>,

    /// Model output fed into the anomaly score
    #[arg(long, value_enum)]
    pub anomaly_signal: Option<SignalArg>,

    /// Seed for the anomaly model
    #[arg(long)]
    pub seed: Option<u64>,

    /// Behaviour when anomaly scores cannot be normalized
    #[arg(long, value_enum)]
    pub on_degenerate: Option<FallbackArg>,
}

/// Arguments for table validation
#[derive(Args)]
pub struct ValidateArgs {
    /// Financial statements CSV or .xlsx workbook (reads piped CSV when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    PositiveProfit,
    NonZeroProfit,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BoundaryArg {
    Inclusive,
    Strict,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SignalArg {
    Label,
    Score,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FallbackArg {
    Zero,
    Fail,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    let table = load_table(&args.input)?;

    let result = pipeline::run_risk_pipeline(&table, &config)?;

    if let Some(ref path) = args.output_file {
        let augmented = table_io::augment_table(&table, &result.result.records)?;
        table_io::write_table_to_path(&augmented, Path::new(path))
            .map_err(|e| format!("Failed to write '{}': {}", path, e))?;
        info!(path = %path, rows = augmented.len(), "wrote augmented table");
    }

    Ok(serde_json::to_value(result)?)
}

pub fn run_validate(args: ValidateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let table = load_table(&args.input)?;
    let records = schema::parse_records(&table)?;

    let extra: Vec<&String> = table
        .headers
        .iter()
        .filter(|h| !REQUIRED_COLUMNS.contains(&h.as_str()))
        .collect();

    Ok(json!({
        "valid": true,
        "rows": records.len(),
        "required_columns": REQUIRED_COLUMNS,
        "extra_columns": extra,
    }))
}

fn build_config(args: &AnalyzeArgs) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config: PipelineConfig = match args.config {
        Some(ref path) => input::file::read_json(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(v) = args.dso_threshold {
        config.dso_threshold = v;
    }
    if let Some(v) = args.cfo_pat_threshold {
        config.cfo_pat_threshold = v;
    }
    if let Some(v) = args.weights {
        config.weight_scenario = v;
    }
    if let Some(v) = args.cfo_pat_policy {
        config.cfo_pat_policy = match v {
            PolicyArg::PositiveProfit => CfoPatPolicy::PositiveProfit,
            PolicyArg::NonZeroProfit => CfoPatPolicy::NonZeroProfit,
        };
    }
    if let Some(v) = args.bucket_boundary {
        config.bucket_boundary = match v {
            BoundaryArg::Inclusive => BucketBoundary::Inclusive,
            BoundaryArg::Strict => BucketBoundary::Strict,
        };
    }
    if let Some(v) = args.anomaly_signal {
        config.anomaly.signal = match v {
            SignalArg::Label => AnomalySignal::Label,
            SignalArg::Score => AnomalySignal::Score,
        };
    }
    if let Some(seed) = args.seed {
        config.anomaly.seed = Some(seed);
    }
    if let Some(v) = args.on_degenerate {
        config.anomaly.degenerate_fallback = match v {
            FallbackArg::Zero => DegenerateFallback::Zero,
            FallbackArg::Fail => DegenerateFallback::Fail,
        };
    }

    config.validate()?;
    Ok(config)
}

fn load_table(path: &Option<String>) -> Result<RecordTable, Box<dyn std::error::Error>> {
    if let Some(ref path) = path {
        input::file::read_table(path)
    } else if let Some(text) = input::stdin::read_stdin()? {
        Ok(table_io::read_table(text.as_bytes())?)
    } else {
        Err("Provide --input or pipe CSV via stdin".into())
    }
}
