//! Ticker/company split of the `Equities` label, with a CSV export.
//!
//! Broker exports render the equity as `"AAPL logo Apple Inc."`. The `logo`
//! word is an artifact of the broker's logo image and is dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::io::{Read, Write};
use tracing::warn;

static LOGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\blogo\b").unwrap());
static TICKER_AND_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z]+)\s+(.*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SymbolEntry {
    pub symbol: String,
    pub company: String,
}

/// Split `"AAPL logo Apple Inc."` into `("AAPL", "Apple Inc.")`.
pub fn split_equity_label(label: &str) -> Option<SymbolEntry> {
    let cleaned = LOGO.replace(label.trim(), "");
    let caps = TICKER_AND_NAME.captures(cleaned.trim())?;
    Some(SymbolEntry {
        symbol: caps[1].to_string(),
        company: caps[2].trim().to_string(),
    })
}

/// Split the equities column of every row. Files without an equities column
/// yield nothing; labels that don't start with a ticker are skipped.
pub fn extract_symbols<R: Read>(input: R) -> Result<Vec<SymbolEntry>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);

    let Some(column) = reader
        .headers()?
        .iter()
        .position(|h| h.to_lowercase().contains("equities"))
    else {
        warn!("no equities column found");
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let label = record.get(column).unwrap_or_default();
        if label.trim().is_empty() {
            continue;
        }
        match split_equity_label(label) {
            Some(entry) => entries.push(entry),
            None => warn!(line = line + 1, label, "could not split equity label"),
        }
    }
    Ok(entries)
}

pub fn write_symbols_csv<W: Write>(entries: &[SymbolEntry], out: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    if entries.is_empty() {
        writer.write_record(["Symbol", "Company"])?;
    }
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}
