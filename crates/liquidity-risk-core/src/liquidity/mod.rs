//! Liquidity manipulation screening.
//!
//! A single-pass pipeline over a table of company-year financial
//! statements: liquidity ratios, threshold red flags, an isolation-forest
//! anomaly score normalized across the batch, and a weighted composite
//! risk score bucketed into High / Medium / Low.

pub mod anomaly;
pub mod flags;
pub mod pipeline;
pub mod ratios;
pub mod schema;
pub mod scoring;
pub mod summary;
pub mod table_io;

pub use pipeline::{run_risk_pipeline, PipelineConfig, RiskReport, ScoredRecord};
pub use schema::{FinancialRecord, RecordTable};
