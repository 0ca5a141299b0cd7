use serde_json::Value;
use std::io;

use super::{format_cell, record_columns, scored_records};

/// Write output as CSV to stdout.
///
/// An analysis prints one line per scored record; anything else prints as
/// field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Some(records) = scored_records(value) {
        let headers: Vec<&str> = record_columns().collect();
        let _ = wtr.write_record(&headers);
        for record in records {
            let row: Vec<String> = headers
                .iter()
                .map(|h| record.get(*h).map(|v| format_cell(v, "")).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    } else if let Some(Value::Array(scenarios)) = value.get("scenarios") {
        write_array_csv(&mut wtr, scenarios);
    } else if let Value::Object(map) = value {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in map {
            let cell = format_cell(val, "");
            let _ = wtr.write_record([key.as_str(), cell.as_str()]);
        }
    } else {
        let _ = wtr.write_record([&format_cell(value, "")]);
    }

    let _ = wtr.flush();
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        return;
    };
    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);

    for item in arr {
        let row: Vec<String> = headers
            .iter()
            .map(|h| item.get(*h).map(|v| format_cell(v, "")).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&row);
    }
}
