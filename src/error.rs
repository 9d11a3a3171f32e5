use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No file uploaded")]
    NoFileUploaded,

    #[error("Uploaded sheet has no data rows")]
    EmptySheet,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Unknown panel: {0}")]
    UnknownPanel(String),

    #[error("Merchant percentages, start date and end date are all required")]
    MissingFilters,

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("No data available for panel {0}; upload a file first")]
    NoDataAvailable(String),

    #[error("No data found between {0} and {1}")]
    NoDataInRange(String, String),

    #[error("No matching data found for the selected merchants")]
    NoMatchingMerchantData,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    UnexpectedFailure(String),
}

impl ReportError {
    /// HTTP status class a host server would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnexpectedFailure(_) | Self::Settings(_) => 500,
            _ => 400,
        }
    }
}

macro_rules! unexpected_from {
    ($($source:ty => $label:literal),* $(,)?) => {
        $(
            impl From<$source> for ReportError {
                fn from(e: $source) -> Self {
                    ReportError::UnexpectedFailure(format!(concat!($label, ": {}"), e))
                }
            }
        )*
    };
}

unexpected_from! {
    rusqlite::Error => "Database error",
    std::io::Error => "IO error",
    csv::Error => "CSV error",
    serde_json::Error => "JSON error",
    calamine::Error => "Spreadsheet read error",
    rust_xlsxwriter::XlsxError => "Spreadsheet write error",
}

pub type Result<T> = std::result::Result<T, ReportError>;
