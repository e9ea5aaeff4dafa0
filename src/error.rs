use thiserror::Error;

/// Failures that abort processing of an uploaded holdings file.
///
/// Field-level extraction misses are not represented here: they surface as
/// `null` fields on the record instead.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("No file uploaded.")]
    NoFileProvided,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Error parsing CSV file: {0}")]
    DecodeFailure(#[from] csv::Error),
}

impl ProcessError {
    /// True for errors caused by the caller's input rather than the server.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, ProcessError::NoFileProvided | ProcessError::MissingColumns(_))
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to load report font: {0}")]
    Font(String),

    #[error("failed to encode PDF: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("broker endpoint is not configured")]
    NotConfigured,

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
