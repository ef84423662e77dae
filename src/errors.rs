use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookbackError {
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("API error {code}: {message}")]
    ApiError { code: String, message: String },

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Date parsing error: {0}")]
    DateError(#[from] chrono::ParseError),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("No price data for {identifier} within the last {days} day(s)")]
    NotFound { identifier: String, days: u32 },
}

impl LookbackError {
    /// Whether this is the terminal "window exhausted" outcome rather than a fault
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookbackError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, LookbackError>;
