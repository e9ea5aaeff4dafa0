//! Holdings summary report.
//!
//! Formatting only: each record becomes a four-line entry, entries are laid
//! out onto A4 pages and the document is returned as PDF bytes.

use base64::Engine;
use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use std::ops::Range;

use crate::error::ReportError;
use crate::record::NormalizedRecord;

pub const TITLE: &str = "Portfolio Holdings Summary";
const NOT_AVAILABLE: &str = "N/A";

// Page geometry in millimetres (A4 portrait).
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const TOP: f32 = 277.0;
const BOTTOM: f32 = 20.0;
const TITLE_BLOCK: f32 = 20.0;
const LINE_HEIGHT: f32 = 5.0;
const ENTRY_GAP: f32 = 3.0;
const ENTRY_HEIGHT: f32 = LINE_HEIGHT * 4.0 + ENTRY_GAP;

const TITLE_SIZE: f32 = 18.0;
const SUBTITLE_SIZE: f32 = 10.0;
const BODY_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 8.0;

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.2}", v))
}

/// Up to four decimals, trailing zeros removed: 10.0 -> "10", 38.6 -> "38.6".
fn plain(value: Option<f64>) -> String {
    let Some(v) = value else {
        return NOT_AVAILABLE.to_string();
    };
    let text = format!("{:.4}", v);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// The four lines describing one record; `index` is 1-based.
pub fn entry_lines(index: usize, record: &NormalizedRecord) -> [String; 4] {
    [
        format!("{}. {}", index, record.equities),
        format!(
            "   Holdings: ${} | Shares: {}",
            money(record.holdings),
            plain(record.quantity)
        ),
        format!(
            "   Cost: ${} @ ${}/share",
            money(record.total_cost),
            money(record.cost_per_share)
        ),
        format!(
            "   Return: {}% (${})",
            plain(record.unrealized_return_percent),
            money(record.unrealized_return_dollars)
        ),
    ]
}

fn subtitle(generated_on: NaiveDate, count: usize) -> String {
    format!("Generated {} - {} holdings", generated_on.format("%Y-%m-%d"), count)
}

/// Plain-text rendering of the report.
pub fn render_text(records: &[NormalizedRecord], generated_on: NaiveDate) -> String {
    let mut out = format!("{}\n{}\n", TITLE, subtitle(generated_on, records.len()));
    for (i, record) in records.iter().enumerate() {
        out.push('\n');
        for line in entry_lines(i + 1, record) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

fn entries_per_page(first: bool) -> usize {
    let top = if first { TOP - TITLE_BLOCK } else { TOP };
    ((top - BOTTOM) / ENTRY_HEIGHT).floor() as usize
}

/// Record index ranges for each page. Always at least one page.
pub fn page_ranges(count: usize) -> Vec<Range<usize>> {
    let mut pages = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + entries_per_page(pages.is_empty())).min(count);
        pages.push(start..end);
        if end >= count {
            return pages;
        }
        start = end;
    }
}

/// Render the records as a PDF document.
pub fn render_pdf(
    records: &[NormalizedRecord],
    generated_on: NaiveDate,
) -> Result<Vec<u8>, ReportError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Font(e.to_string()))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Font(e.to_string()))?;

    let pages = page_ranges(records.len());
    let total = pages.len();

    for (page_no, range) in pages.into_iter().enumerate() {
        let layer: PdfLayerReference = if page_no == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(p).get_layer(l)
        };

        let mut y = TOP;
        if page_no == 0 {
            text(&layer, &font_bold, y, TITLE_SIZE, TITLE);
            text(&layer, &font, y - 10.0, SUBTITLE_SIZE, &subtitle(generated_on, records.len()));
            y -= TITLE_BLOCK;
        }

        for i in range {
            for line in entry_lines(i + 1, &records[i]) {
                text(&layer, &font, y, BODY_SIZE, &line);
                y -= LINE_HEIGHT;
            }
            y -= ENTRY_GAP;
        }

        text(
            &layer,
            &font,
            BOTTOM - 10.0,
            FOOTER_SIZE,
            &format!("Page {} of {}", page_no + 1, total),
        );
    }

    doc.save_to_bytes()
        .map_err(|e| ReportError::Encode(e.to_string()))
}

fn text(layer: &PdfLayerReference, font: &IndirectFontRef, y: f32, size: f32, content: &str) {
    layer.use_text(content, size, Mm(MARGIN_LEFT), Mm(y), font);
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
