use rust_decimal::Decimal;
use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{format_cell, scored_records};

/// Columns shown per record in the terminal view.
const RECORD_VIEW: [&str; 10] = [
    "Company",
    "Year",
    "CR",
    "TACR",
    "DSO",
    "CFO_to_PAT",
    "Flag_Count",
    "AI_Anomaly_Score",
    "Liquidity_Risk_Score",
    "Risk_Bucket",
];

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    if let Some(records) = scored_records(value) {
        print_records(records);
        if let Some(summary) = value.get("result").and_then(|r| r.get("summary")) {
            print_summary(summary);
        }
        print_envelope_notes(value);
        return;
    }

    match value {
        Value::Object(map) => {
            if let Some(Value::Array(scenarios)) = map.get("scenarios") {
                print_array_table(scenarios);
            } else {
                print_flat_object(value);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_records(records: &[Value]) {
    if records.is_empty() {
        println!("(no records)");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(RECORD_VIEW);
    for record in records {
        let row: Vec<String> = RECORD_VIEW
            .iter()
            .map(|col| record.get(*col).map(display_number).unwrap_or_default())
            .collect();
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn print_summary(summary: &Value) {
    let Value::Object(map) = summary else {
        return;
    };

    println!("\nSummary:");
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map.iter().filter(|(k, _)| k.as_str() != "mean_score_by_year") {
        builder.push_record([key.as_str(), &format_cell(val, "-")]);
    }
    println!("{}", Table::from(builder));

    if let Some(Value::Array(years)) = map.get("mean_score_by_year") {
        println!("\nMean liquidity risk score by year:");
        let mut builder = Builder::default();
        builder.push_record(["Year", "Firm-years", "Mean score"]);
        for y in years {
            builder.push_record([
                y.get("year").map(display_number).unwrap_or_default(),
                y.get("firm_years").map(display_number).unwrap_or_default(),
                y.get("mean_risk_score").map(display_number).unwrap_or_default(),
            ]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_envelope_notes(envelope: &Value) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_cell(val, "-")]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_array_table(arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        println!("(empty)");
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in arr {
        let row: Vec<String> = headers
            .iter()
            .map(|h| item.get(h.as_str()).map(|v| format_cell(v, "-")).unwrap_or_default())
            .collect();
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

/// Decimal strings are rounded to two places for the terminal.
fn display_number(value: &Value) -> String {
    match value {
        Value::String(s) => s
            .parse::<Decimal>()
            .map(|d| d.round_dp(2).normalize().to_string())
            .unwrap_or_else(|_| s.clone()),
        other => format_cell(other, "-"),
    }
}
