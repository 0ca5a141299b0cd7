use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("Invalid value in row {row}, column {column}: '{value}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Degenerate batch: {0}")]
    DegenerateBatch(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RiskError {
    fn from(e: serde_json::Error) -> Self {
        RiskError::SerializationError(e.to_string())
    }
}

#[cfg(feature = "liquidity")]
impl From<csv::Error> for RiskError {
    fn from(e: csv::Error) -> Self {
        RiskError::Csv(e.to_string())
    }
}

#[cfg(feature = "liquidity")]
impl From<calamine::XlsxError> for RiskError {
    fn from(e: calamine::XlsxError) -> Self {
        RiskError::Workbook(e.to_string())
    }
}

#[cfg(feature = "liquidity")]
impl From<rust_xlsxwriter::XlsxError> for RiskError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        RiskError::Workbook(e.to_string())
    }
}
