//! Upload pipeline: decode CSV bytes, gate on headers, extract and sort.

use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, info};

use crate::error::ProcessError;
use crate::extract::extract_record;
use crate::record::{sort_by_holdings, NormalizedRecord, RawRow};
use crate::schema::{clean_header, validate_headers};

pub const SUCCESS_MESSAGE: &str = "Processed CSV successfully";

/// JSON body returned for a processed upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub message: String,
    pub data: Vec<NormalizedRecord>,
    /// Base64-encoded PDF summary, present only when a report was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

impl ProcessResponse {
    pub fn new(data: Vec<NormalizedRecord>) -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
            data,
            report: None,
        }
    }
}

/// Decode `input` and hand each data row to `on_row` as it is read.
///
/// Headers are checked before the first record is pulled from the decoder,
/// so a rejected file never reaches `on_row`. Returns the number of rows
/// delivered.
pub fn stream_rows<R, F>(input: R, mut on_row: F) -> Result<usize, ProcessError>
where
    R: Read,
    F: FnMut(RawRow),
{
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);

    let headers: Vec<String> = reader.headers()?.iter().map(clean_header).collect();
    validate_headers(&headers)?;
    debug!(columns = headers.len(), "header check passed");

    let mut delivered = 0;
    for result in reader.records() {
        let record = result?;
        let row: RawRow = record
            .iter()
            .enumerate()
            .map(|(i, value)| {
                // Cells past the header row get positional names.
                let column = headers.get(i).cloned().unwrap_or_else(|| format!("_{i}"));
                (column, value.to_string())
            })
            .collect();
        on_row(row);
        delivered += 1;
    }

    Ok(delivered)
}

/// Full pipeline for an upload. `None` means no file was attached.
pub fn process_csv(upload: Option<&[u8]>) -> Result<Vec<NormalizedRecord>, ProcessError> {
    let bytes = upload.ok_or(ProcessError::NoFileProvided)?;

    let mut records = Vec::new();
    let rows = stream_rows(bytes, |row| records.push(extract_record(&row)))?;
    sort_by_holdings(&mut records);

    info!(rows, "processed holdings upload");
    Ok(records)
}
