//! Spreadsheet input (CSV or the first sheet of an `.xlsx` workbook) and the
//! augmented result file.

use calamine::{Data, Reader, Xlsx};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use super::pipeline::ScoredRecord;
use super::schema::RecordTable;
use crate::{RiskError, RiskResult};

/// Derived columns in computation order, appended after the input columns.
pub const DERIVED_COLUMNS: [&str; 13] = [
    "CR",
    "TACR",
    "DSO",
    "CFO_to_PAT",
    "CFO_margin",
    "Flag_High_DSO",
    "Flag_TACR_Mismatch",
    "Flag_Low_Cash_Profit",
    "Flag_Count",
    "AI_Anomaly_Score",
    "Flag_Score",
    "Liquidity_Risk_Score",
    "Risk_Bucket",
];

/// On-disk table format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    /// `.xlsx` (any case) is a workbook; everything else is read as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => TableFormat::Xlsx,
            _ => TableFormat::Csv,
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read a header row plus data rows. Rows whose cells are all blank are skipped.
pub fn read_table<R: Read>(reader: R) -> RiskResult<RecordTable> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    let mut row_numbers = Vec::new();
    let mut skipped = 0usize;
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            skipped += 1;
            continue;
        }
        // Line 1 is the header, so line N holds data row N - 1
        let line = record.position().map_or(i + 2, |p| p.line() as usize);
        row_numbers.push(line.saturating_sub(1));
        rows.push(record.iter().map(String::from).collect());
    }
    debug!(rows = rows.len(), skipped, "read input table");

    Ok(RecordTable::with_row_numbers(headers, rows, row_numbers))
}

/// Read the first worksheet of an `.xlsx` workbook. The first non-empty row is
/// the header; all-blank rows below it are skipped.
pub fn read_xlsx<R: Read + Seek>(reader: R) -> RiskResult<RecordTable> {
    let mut workbook = Xlsx::new(reader)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RiskError::InvalidInput {
            field: "workbook".into(),
            reason: "The workbook has no worksheets.".into(),
        })??;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .map(|r| r.iter().map(cell_text).collect())
        .unwrap_or_default();

    let mut rows = Vec::new();
    let mut row_numbers = Vec::new();
    let mut skipped = 0usize;
    for (i, cells) in sheet_rows.enumerate() {
        let row: Vec<String> = cells.iter().map(cell_text).collect();
        if row.iter().all(|c| c.trim().is_empty()) {
            skipped += 1;
            continue;
        }
        row_numbers.push(i + 1);
        rows.push(row);
    }
    debug!(rows = rows.len(), skipped, "read input workbook");

    Ok(RecordTable::with_row_numbers(headers, rows, row_numbers))
}

pub fn read_table_from_path(path: &Path) -> RiskResult<RecordTable> {
    let file = File::open(path)?;
    match TableFormat::from_path(path) {
        TableFormat::Csv => read_table(file),
        TableFormat::Xlsx => read_xlsx(BufReader::new(file)),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write the table with its header row and no index column.
pub fn write_table<W: Write>(table: &RecordTable, writer: W) -> RiskResult<()> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the table as a single-sheet workbook. Numeric cells are stored as
/// numbers, everything else as text, and blank cells are left empty.
pub fn write_xlsx<W: Write>(table: &RecordTable, mut writer: W) -> RiskResult<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string(0, col as u16, header)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let sheet_row = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            if cell.is_empty() {
                continue;
            }
            match Decimal::from_str(cell).ok().and_then(|d| d.to_f64()) {
                Some(number) => sheet.write_number(sheet_row, col, number)?,
                None => sheet.write_string(sheet_row, col, cell)?,
            };
        }
    }

    writer.write_all(&workbook.save_to_buffer()?)?;
    writer.flush()?;
    Ok(())
}

pub fn write_table_to_path(table: &RecordTable, path: &Path) -> RiskResult<()> {
    let file = File::create(path)?;
    match TableFormat::from_path(path) {
        TableFormat::Csv => write_table(table, file),
        TableFormat::Xlsx => write_xlsx(table, file),
    }
}

/// The uploaded table with every derived column appended, row for row.
///
/// Input columns that share a name with a derived column are replaced.
pub fn augment_table(source: &RecordTable, records: &[ScoredRecord]) -> RiskResult<RecordTable> {
    if source.len() != records.len() {
        return Err(RiskError::InvalidInput {
            field: "records".into(),
            reason: format!(
                "{} scored records for {} table rows.",
                records.len(),
                source.len()
            ),
        });
    }

    // without_columns pads short rows and drops cells beyond the header
    let mut table = source.without_columns(&DERIVED_COLUMNS);
    table.headers.extend(DERIVED_COLUMNS.iter().map(|c| c.to_string()));
    for (row, scored) in table.rows.iter_mut().zip(records) {
        row.extend(derived_cells(scored));
    }
    Ok(table)
}

fn derived_cells(r: &ScoredRecord) -> [String; 13] {
    [
        fmt_opt(r.ratios.cr),
        fmt_opt(r.ratios.tacr),
        fmt_opt(r.ratios.dso),
        fmt_opt(r.ratios.cfo_to_pat),
        fmt_opt(r.ratios.cfo_margin),
        r.flags.high_dso.to_string(),
        r.flags.tacr_mismatch.to_string(),
        r.flags.low_cash_profit.to_string(),
        r.flags.flag_count.to_string(),
        fmt_dec(r.scores.ai_anomaly_score),
        fmt_dec(r.scores.flag_score),
        fmt_dec(r.scores.liquidity_risk_score),
        r.scores.risk_bucket.to_string(),
    ]
}

fn fmt_dec(d: Decimal) -> String {
    d.normalize().to_string()
}

fn fmt_opt(d: Option<Decimal>) -> String {
    d.map(fmt_dec).unwrap_or_default()
}
