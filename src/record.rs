//! Row and record types plus the holdings-descending ordering of a record set.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::extract::extract_record;

/// One decoded data line: column name to raw cell text, in file column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Cell text for `column`, if the row carries that column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// `(column, value)` pairs in column order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}

/// A holding with its numeric fields pulled out of the broker's text cells.
///
/// Any field whose source text did not match stays `None` (`null` in JSON).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizedRecord {
    pub equities: String,
    pub holdings: Option<f64>,
    pub quantity: Option<f64>,
    pub total_cost: Option<f64>,
    pub cost_per_share: Option<f64>,
    pub unrealized_return_percent: Option<f64>,
    pub unrealized_return_dollars: Option<f64>,
}

impl NormalizedRecord {
    /// Holdings value used for ordering; a missing value counts as zero.
    pub fn sort_key(&self) -> f64 {
        self.holdings.unwrap_or(0.0)
    }
}

/// Stable sort by holdings, largest first. Equal values keep input order.
pub fn sort_by_holdings(records: &mut [NormalizedRecord]) {
    records.sort_by(|a, b| {
        b.sort_key()
            .partial_cmp(&a.sort_key())
            .unwrap_or(Ordering::Equal)
    });
}

/// Extract every row in input order, then order the set by holdings.
pub fn build_record_set<'a, I>(rows: I) -> Vec<NormalizedRecord>
where
    I: IntoIterator<Item = &'a RawRow>,
{
    let mut records: Vec<NormalizedRecord> = rows.into_iter().map(extract_record).collect();
    sort_by_holdings(&mut records);
    records
}
