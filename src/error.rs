use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Missing required columns: {}", missing.join(", "))]
    DataValidation { missing: Vec<String> },

    #[error("Invalid configuration for '{field}': {details}")]
    InvalidConfig { field: String, details: String },

    #[error("Workbook has no readable sheet: {0}")]
    EmptyWorkbook(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Report parse error: {0}")]
    ReportParse(String),

    #[error("PDF export error: {0}")]
    Pdf(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<calamine::Error> for AnalyticsError {
    fn from(err: calamine::Error) -> Self {
        AnalyticsError::Spreadsheet(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
