pub mod csv_out;
pub mod minimal;
pub mod table;

use liquidity_risk_core::liquidity::schema::REQUIRED_COLUMNS;
use liquidity_risk_core::liquidity::table_io::DERIVED_COLUMNS;
use serde_json::Value;

use crate::OutputFormat;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Pretty-print JSON to stdout.
fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// Scored records inside an analysis envelope, if that is what `value` is.
pub fn scored_records(value: &Value) -> Option<&Vec<Value>> {
    value.get("result")?.get("records")?.as_array()
}

/// Record columns in file order: inputs, then derived columns.
pub fn record_columns() -> impl Iterator<Item = &'static str> {
    REQUIRED_COLUMNS.into_iter().chain(DERIVED_COLUMNS)
}

/// Render a scalar cell; null (an undefined ratio) renders as `null_text`.
pub fn format_cell(value: &Value, null_text: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => null_text.to_string(),
        Value::Array(arr) => arr
            .iter()
            .map(|v| format_cell(v, null_text))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
