use serde_json::Value;

use super::format_cell;

/// Print just the key answer from the output.
///
/// For an analysis that is the high-risk count; otherwise the first
/// well-known field, then the first field of the object.
pub fn print_minimal(value: &Value) {
    if let Some(summary) = value.get("result").and_then(|r| r.get("summary")) {
        let high = summary.get("high_risk_firm_years").cloned().unwrap_or(Value::Null);
        let total = summary.get("firm_years").cloned().unwrap_or(Value::Null);
        println!(
            "{} high-risk of {} firm-years",
            format_cell(&high, "0"),
            format_cell(&total, "0")
        );
        return;
    }

    let priority_keys = ["valid", "rows", "scenarios"];

    if let Value::Object(map) = value {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(value));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.get("alias")
                    .map(|a| format_cell(a, ""))
                    .unwrap_or_else(|| format_cell(v, ""))
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => format_cell(other, "null"),
    }
}
