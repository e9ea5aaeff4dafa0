//! Header gate for uploaded holdings exports.
//!
//! The broker export must expose every column in [`REQUIRED_HEADERS`] before a
//! single row is handed to the extractor.

use crate::error::ProcessError;

pub const EQUITIES: &str = "Equities";
pub const PRICE: &str = "Price";
pub const HOLDINGS: &str = "Holdings";
pub const COST: &str = "Cost";
pub const DAY_RETURN: &str = "1D return";
pub const UNREALIZED_RETURN: &str = "Unrealized return";

pub const REQUIRED_HEADERS: &[&str] = &[
    EQUITIES,
    PRICE,
    HOLDINGS,
    COST,
    DAY_RETURN,
    UNREALIZED_RETURN,
];

/// Normalize a header as it appears in the file (stray BOM, padding).
pub fn clean_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_string()
}

/// Required headers absent from `headers`, in required order.
pub fn missing_columns<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    REQUIRED_HEADERS
        .iter()
        .filter(|required| !headers.iter().any(|h| clean_header(h.as_ref()) == **required))
        .map(|required| required.to_string())
        .collect()
}

pub fn validate_headers<S: AsRef<str>>(headers: &[S]) -> Result<(), ProcessError> {
    let missing = missing_columns(headers);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProcessError::MissingColumns(missing))
    }
}
