//! Tabular input and the company-year record model.
//!
//! Cells arrive as raw strings (one row per company-year) and are parsed
//! into `FinancialRecord`s only after the header has been checked for the
//! eleven required columns.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::Money;
use crate::{RiskError, RiskResult};

pub const COMPANY: &str = "Company";
pub const YEAR: &str = "Year";
pub const TOTAL_CURRENT_ASSETS: &str = "TotalCurrentAssets";
pub const TOTAL_CURRENT_LIABILITIES: &str = "TotalCurrentLiabilities";
pub const CASH: &str = "Cash";
pub const RECEIVABLES: &str = "Receivables";
pub const TRADE_PAYABLES: &str = "TradePayables";
pub const SHORT_TERM_BORROWINGS: &str = "ShortTermBorrowings";
pub const CFO: &str = "CFO";
pub const SALES: &str = "Sales";
pub const NET_PROFIT: &str = "NetProfit";

/// Columns every uploaded table must carry, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    COMPANY,
    YEAR,
    TOTAL_CURRENT_ASSETS,
    TOTAL_CURRENT_LIABILITIES,
    CASH,
    RECEIVABLES,
    TRADE_PAYABLES,
    SHORT_TERM_BORROWINGS,
    CFO,
    SALES,
    NET_PROFIT,
];

/// Cell spellings treated as an undefined numeric value.
const NULL_MARKERS: [&str; 6] = ["", "nan", "null", "na", "n/a", "none"];

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Raw spreadsheet contents: a header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based data-row position of each row in the source file, blank rows
    /// included. Error messages report this position.
    #[serde(skip)]
    pub row_numbers: Vec<usize>,
}

impl RecordTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_numbers = (1..=rows.len()).collect();
        Self::with_row_numbers(headers, rows, row_numbers)
    }

    pub fn with_row_numbers(
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        row_numbers: Vec<usize>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        Self {
            headers,
            rows,
            row_numbers,
        }
    }

    /// Source-file data-row number for row index `row`.
    pub fn source_row(&self, row: usize) -> usize {
        self.row_numbers.get(row).copied().unwrap_or(row + 1)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at (row, column); short rows read as blank.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Required column names absent from the header, in required order.
    pub fn missing_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|c| self.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect()
    }

    /// Copy of the table without the named columns.
    pub fn without_columns(&self, names: &[&str]) -> RecordTable {
        let keep: Vec<usize> = (0..self.headers.len())
            .filter(|&i| !names.contains(&self.headers[i].as_str()))
            .collect();
        RecordTable {
            headers: keep.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: (0..self.rows.len())
                .map(|r| keep.iter().map(|&i| self.cell(r, i).to_string()).collect())
                .collect(),
            row_numbers: self.row_numbers.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One company-year observation. Inputs are `None` when the cell was blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "TotalCurrentAssets")]
    pub total_current_assets: Option<Money>,
    #[serde(rename = "TotalCurrentLiabilities")]
    pub total_current_liabilities: Option<Money>,
    #[serde(rename = "Cash")]
    pub cash: Option<Money>,
    #[serde(rename = "Receivables")]
    pub receivables: Option<Money>,
    #[serde(rename = "TradePayables")]
    pub trade_payables: Option<Money>,
    #[serde(rename = "ShortTermBorrowings")]
    pub short_term_borrowings: Option<Money>,
    #[serde(rename = "CFO")]
    pub cfo: Option<Money>,
    #[serde(rename = "Sales")]
    pub sales: Option<Money>,
    #[serde(rename = "NetProfit")]
    pub net_profit: Option<Money>,
}

/// Fail fast with every missing required column.
pub fn validate_columns(table: &RecordTable) -> RiskResult<()> {
    let missing = table.missing_columns();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RiskError::MissingColumns { columns: missing })
    }
}

/// Parse every row into a `FinancialRecord`.
pub fn parse_records(table: &RecordTable) -> RiskResult<Vec<FinancialRecord>> {
    validate_columns(table)?;

    // validate_columns guarantees every lookup succeeds
    let idx = |name: &str| table.column_index(name).unwrap_or_default();
    let company = idx(COMPANY);
    let year = idx(YEAR);

    let mut records = Vec::with_capacity(table.len());
    for r in 0..table.len() {
        let line = table.source_row(r);
        let money = |name: &str| parse_money(table.cell(r, idx(name)), line, name);
        records.push(FinancialRecord {
            company: table.cell(r, company).trim().to_string(),
            year: parse_year(table.cell(r, year), line)?,
            total_current_assets: money(TOTAL_CURRENT_ASSETS)?,
            total_current_liabilities: money(TOTAL_CURRENT_LIABILITIES)?,
            cash: money(CASH)?,
            receivables: money(RECEIVABLES)?,
            trade_payables: money(TRADE_PAYABLES)?,
            short_term_borrowings: money(SHORT_TERM_BORROWINGS)?,
            cfo: money(CFO)?,
            sales: money(SALES)?,
            net_profit: money(NET_PROFIT)?,
        });
    }
    Ok(records)
}

/// Parse a numeric cell. Null markers map to `None`.
pub fn parse_money(cell: &str, row: usize, column: &str) -> RiskResult<Option<Money>> {
    let trimmed = cell.trim();
    if NULL_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    parse_decimal(trimmed).map(Some).ok_or_else(|| RiskError::InvalidValue {
        row,
        column: column.to_string(),
        value: cell.to_string(),
    })
}

fn parse_year(cell: &str, row: usize) -> RiskResult<i32> {
    let invalid = || RiskError::InvalidValue {
        row,
        column: YEAR.to_string(),
        value: cell.to_string(),
    };
    let value = parse_decimal(cell.trim()).ok_or_else(invalid)?;
    if value.fract() != Decimal::ZERO {
        return Err(invalid());
    }
    value.to_i32().ok_or_else(invalid)
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
