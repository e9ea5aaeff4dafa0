//! Field extraction from broker holdings rows.
//!
//! Each [`ExtractionRule`] knows one pair of numeric fields and two ways to
//! find it: a strict pattern over its own column cell, and a looser pattern
//! over the whole row joined into one string. The strict cell pattern is tried
//! first; the merged-row pattern only runs when the cell does not match, and
//! skips the neighbouring columns listed on the rule.
//!
//! Extraction never fails. A pattern that does not match leaves both fields of
//! its pair as `None`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;

use crate::record::{NormalizedRecord, RawRow};
use crate::schema::{COST, DAY_RETURN, EQUITIES, HOLDINGS, PRICE, UNREALIZED_RETURN};

/// Number as written inside a single cell: `2,347.60`, `10`, `0.5`.
const CELL_NUM: &str = r"\d[\d,]*(?:\.\d+)?";
/// Number in merged row text, where thousands may be split by a space: `2 347.60`.
const LOOSE_NUM: &str = r"\d+(?:[ ,]\d{3})*(?:\.\d+)?";
const SIGN: &str = r"[+\-−]";

/// Which text a rule is run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The rule's own named cell.
    Column,
    /// All cells of the row joined and whitespace-normalized.
    Merged,
}

/// Which match to use when a pattern occurs more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    First,
    Last,
}

/// Record fields a rule fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    HoldingsQuantity,
    CostBasis,
    UnrealizedReturn,
}

/// The two values a rule produced. Either may be `None` when the matched text
/// does not parse as a finite number.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldPair {
    pub first: Option<f64>,
    pub second: Option<f64>,
}

pub struct ExtractionRule {
    pub name: &'static str,
    pub column: &'static str,
    pub target: Target,
    cell: Regex,
    merged: Regex,
    merged_pick: Pick,
    /// Columns left out of the merged text; their values mimic this rule's pattern.
    merged_skip: &'static [&'static str],
}

impl ExtractionRule {
    fn new(
        name: &'static str,
        column: &'static str,
        target: Target,
        cell: &str,
        merged: &str,
        merged_pick: Pick,
        merged_skip: &'static [&'static str],
    ) -> Self {
        // Built from the constants above; compiled by the rule-table test.
        Self {
            name,
            column,
            target,
            cell: Regex::new(cell)
                .unwrap_or_else(|e| panic!("invalid cell pattern for {name}: {e}")),
            merged: Regex::new(merged)
                .unwrap_or_else(|e| panic!("invalid merged pattern for {name}: {e}")),
            merged_pick,
            merged_skip,
        }
    }

    /// Run the rule against `text`. `None` means the pattern did not match.
    pub fn apply(&self, text: &str, mode: Mode) -> Option<FieldPair> {
        let caps = match mode {
            Mode::Column => self.cell.captures(text),
            Mode::Merged => match self.merged_pick {
                Pick::First => self.merged.captures(text),
                Pick::Last => self.merged.captures_iter(text).last(),
            },
        }?;

        Some(FieldPair {
            first: signed_value(&caps, "a", "a_sign"),
            second: signed_value(&caps, "b", "b_sign"),
        })
    }

    /// Column mode on the rule's cell, falling back to the merged row text.
    pub fn extract(&self, row: &RawRow) -> Option<(FieldPair, Mode)> {
        if let Some(pair) = row.get(self.column).and_then(|cell| self.apply(cell, Mode::Column)) {
            return Some((pair, Mode::Column));
        }
        let merged = merged_text(row, self.merged_skip);
        self.apply(&merged, Mode::Merged).map(|pair| (pair, Mode::Merged))
    }
}

/// Rule table, in evaluation order. New broker formats are added here.
pub static RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        ExtractionRule::new(
            "holdings-quantity",
            HOLDINGS,
            Target::HoldingsQuantity,
            // "$2,347.60 10"
            &format!(r"^\s*\$\s?(?P<a>{CELL_NUM})\s+(?P<b>{CELL_NUM})(?:\s*shares?)?\s*$"),
            // "$2 347.60 10 shares"; the count must end the text, carry a unit,
            // or be followed by the next dollar amount
            &format!(r"\$\s?(?P<a>{LOOSE_NUM})\s+(?P<b>{LOOSE_NUM})(?:\s*shares?\b|\s+\$|\s*$)"),
            Pick::First,
            &[PRICE],
        ),
        ExtractionRule::new(
            "total-cost-per-share",
            COST,
            Target::CostBasis,
            // "$744.91 $1,054.93" or "$744.91 $1 054.93"
            &format!(
                r"^\s*\$?\s?(?P<a>{LOOSE_NUM})\s+\$?\s?(?P<b>{LOOSE_NUM})(?:\s*/\s*share)?\s*$"
            ),
            // "$744.91 $1 054.93/share"
            &format!(r"\$\s?(?P<a>{LOOSE_NUM})\s+\$\s?(?P<b>{LOOSE_NUM})\s*/\s*share\b"),
            Pick::First,
            &[],
        ),
        ExtractionRule::new(
            "unrealized-return",
            UNREALIZED_RETURN,
            Target::UnrealizedReturn,
            // "38.60% +$653.80"
            &format!(
                r"^\s*(?P<a_sign>{SIGN})?\s*(?P<a>{CELL_NUM})\s*%\s*(?P<b_sign>{SIGN})?\s*\$?\s?(?P<b>{CELL_NUM})\s*$"
            ),
            // "+38.60% +$653.80"; a 1D return may still precede it in a single cell
            &format!(
                r"(?P<a_sign>{SIGN})?\s?(?P<a>{LOOSE_NUM})\s*%\s*(?P<b_sign>{SIGN})?\s*\$\s?(?P<b>{LOOSE_NUM})"
            ),
            Pick::Last,
            &[DAY_RETURN],
        ),
    ]
});

/// Parse a matched numeric substring: thousands separators and any whitespace
/// are dropped, non-finite results are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn signed_value(caps: &Captures<'_>, value: &str, sign: &str) -> Option<f64> {
    let magnitude = parse_number(caps.name(value)?.as_str())?;
    match caps.name(sign).map(|m| m.as_str()) {
        Some("-") | Some("−") => Some(-magnitude),
        _ => Some(magnitude),
    }
}

/// Cell values outside `skip` joined with single spaces, whitespace runs collapsed.
pub fn merged_text(row: &RawRow, skip: &[&str]) -> String {
    row.cells()
        .filter(|(column, _)| !skip.contains(column))
        .flat_map(|(_, value)| value.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the normalized record for one row. Pure: same row, same record.
pub fn extract_record(row: &RawRow) -> NormalizedRecord {
    let mut record = NormalizedRecord {
        equities: row.get(EQUITIES).unwrap_or_default().to_string(),
        ..Default::default()
    };

    for rule in RULES.iter() {
        let Some((pair, mode)) = rule.extract(row) else {
            trace!(rule = rule.name, equities = %record.equities, "no match");
            continue;
        };
        if mode == Mode::Merged {
            trace!(rule = rule.name, equities = %record.equities, "matched merged row text");
        }

        match rule.target {
            Target::HoldingsQuantity => {
                record.holdings = pair.first;
                record.quantity = pair.second;
            }
            Target::CostBasis => {
                record.total_cost = pair.first;
                record.cost_per_share = pair.second;
            }
            Target::UnrealizedReturn => {
                record.unrealized_return_percent = pair.first;
                record.unrealized_return_dollars = pair.second;
            }
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn rule(target: Target) -> &'static ExtractionRule {
        RULES.iter().find(|r| r.target == target).unwrap()
    }

    #[test]
    fn rule_table_compiles_and_covers_every_target() {
        assert_eq!(RULES.len(), 3);
        for target in [Target::HoldingsQuantity, Target::CostBasis, Target::UnrealizedReturn] {
            assert!(RULES.iter().any(|r| r.target == target));
        }
    }

    #[test]
    fn parse_number_strips_separators() {
        assert_eq!(parse_number("2,347.60"), Some(2347.60));
        assert_eq!(parse_number("2 347.60"), Some(2347.60));
        assert_eq!(parse_number("1\u{a0}054.93"), Some(1054.93));
        assert_eq!(parse_number("10"), Some(10.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn holdings_cell() {
        let pair = rule(Target::HoldingsQuantity).apply("$2,347.60 10", Mode::Column).unwrap();
        assert_eq!(pair.first, Some(2347.60));
        assert_eq!(pair.second, Some(10.0));
    }

    #[test]
    fn holdings_cell_with_unit_and_fraction() {
        let pair = rule(Target::HoldingsQuantity)
            .apply("$512.00\n0.5 shares", Mode::Column)
            .unwrap();
        assert_eq!(pair.first, Some(512.0));
        assert_eq!(pair.second, Some(0.5));
    }

    #[test]
    fn cost_cell() {
        let pair = rule(Target::CostBasis).apply("$744.91 $1,054.93", Mode::Column).unwrap();
        assert_eq!(pair.first, Some(744.91));
        assert_eq!(pair.second, Some(1054.93));
    }

    #[test]
    fn cost_cell_with_spaced_thousands() {
        let pair = rule(Target::CostBasis).apply("$744.91 $1 054.93", Mode::Column).unwrap();
        assert_eq!(pair.first, Some(744.91));
        assert_eq!(pair.second, Some(1054.93));
    }

    #[test]
    fn cost_cell_without_dollar_signs() {
        let pair = rule(Target::CostBasis).apply("744.91 1,054.93", Mode::Column).unwrap();
        assert_eq!(pair.first, Some(744.91));
        assert_eq!(pair.second, Some(1054.93));
    }

    #[test]
    fn unrealized_return_cell() {
        let pair = rule(Target::UnrealizedReturn)
            .apply("38.60% +$653.80", Mode::Column)
            .unwrap();
        assert_eq!(pair.first, Some(38.60));
        assert_eq!(pair.second, Some(653.80));
    }

    #[test]
    fn unrealized_return_cell_spaced_plus() {
        let pair = rule(Target::UnrealizedReturn)
            .apply("38.60% + $653.80", Mode::Column)
            .unwrap();
        assert_eq!(pair.first, Some(38.60));
        assert_eq!(pair.second, Some(653.80));
    }

    #[test]
    fn unrealized_loss_keeps_sign() {
        let pair = rule(Target::UnrealizedReturn)
            .apply("-12.50% -$1,040.00", Mode::Column)
            .unwrap();
        assert_eq!(pair.first, Some(-12.5));
        assert_eq!(pair.second, Some(-1040.0));
    }

    #[test]
    fn spaced_thousands_do_not_match_strict_cell() {
        assert!(rule(Target::HoldingsQuantity).apply("$2 347.60 10", Mode::Column).is_none());
    }

    #[test]
    fn column_mode_record() {
        let raw = row(&[
            (EQUITIES, "AAPL"),
            (PRICE, "$234.76"),
            (HOLDINGS, "$2,347.60 10"),
            (COST, "$744.91 $1,054.93"),
            (DAY_RETURN, "+1.20% +$27.80"),
            (UNREALIZED_RETURN, "38.60% +$653.80"),
        ]);
        let rec = extract_record(&raw);
        assert_eq!(rec.equities, "AAPL");
        assert_eq!(rec.holdings, Some(2347.60));
        assert_eq!(rec.quantity, Some(10.0));
        assert_eq!(rec.total_cost, Some(744.91));
        assert_eq!(rec.cost_per_share, Some(1054.93));
        assert_eq!(rec.unrealized_return_percent, Some(38.60));
        assert_eq!(rec.unrealized_return_dollars, Some(653.80));
    }

    #[test]
    fn merged_mode_on_single_text_cell() {
        let raw = row(&[(
            EQUITIES,
            "AAPL logo Apple Inc. $2 347.60 10 shares $744.91 $1 054.93/share +38.60% +$653.80",
        )]);
        let rec = extract_record(&raw);
        assert_eq!(rec.holdings, Some(2347.60));
        assert_eq!(rec.quantity, Some(10.0));
        assert_eq!(rec.total_cost, Some(744.91));
        assert_eq!(rec.cost_per_share, Some(1054.93));
        assert_eq!(rec.unrealized_return_percent, Some(38.60));
        assert_eq!(rec.unrealized_return_dollars, Some(653.80));
    }

    #[test]
    fn merged_mode_when_cells_are_shifted() {
        // A logo label split the row at the wrong boundaries.
        let raw = row(&[
            (EQUITIES, "AAPL"),
            (PRICE, "logo Apple Inc."),
            (HOLDINGS, "$234.76 $2 347.60"),
            (COST, "10 shares $744.91"),
            (DAY_RETURN, "$1 054.93/share +1.20%"),
            (UNREALIZED_RETURN, "+$27.80 +38.60% +$653.80"),
        ]);
        let rec = extract_record(&raw);
        assert_eq!(rec.equities, "AAPL");
        assert_eq!(rec.holdings, Some(2347.60));
        assert_eq!(rec.quantity, Some(10.0));
        assert_eq!(rec.total_cost, Some(744.91));
        assert_eq!(rec.cost_per_share, Some(1054.93));
        assert_eq!(rec.unrealized_return_percent, Some(38.60));
        assert_eq!(rec.unrealized_return_dollars, Some(653.80));
    }

    #[test]
    fn merged_holdings_without_unit_before_next_amount() {
        let pair = rule(Target::HoldingsQuantity)
            .apply("MSFT $1 250.00 3 $900.00 $300.00/share", Mode::Merged)
            .unwrap();
        assert_eq!(pair.first, Some(1250.0));
        assert_eq!(pair.second, Some(3.0));
    }

    #[test]
    fn merged_holdings_ignores_price_before_holdings() {
        let pair = rule(Target::HoldingsQuantity)
            .apply("Apple Inc. $234.76 $2 347.60 10 shares", Mode::Merged)
            .unwrap();
        assert_eq!(pair.first, Some(2347.60));
        assert_eq!(pair.second, Some(10.0));
    }

    #[test]
    fn merged_holdings_splits_ambiguous_grouping() {
        let pair = rule(Target::HoldingsQuantity)
            .apply("$2 347 100 shares", Mode::Merged)
            .unwrap();
        assert_eq!(pair.first, Some(2347.0));
        assert_eq!(pair.second, Some(100.0));
    }

    #[test]
    fn unmatched_fields_stay_null() {
        let raw = row(&[
            (EQUITIES, "CASH"),
            (PRICE, "--"),
            (HOLDINGS, "n/a"),
            (COST, ""),
            (DAY_RETURN, ""),
            (UNREALIZED_RETURN, "pending"),
        ]);
        let rec = extract_record(&raw);
        assert_eq!(rec.equities, "CASH");
        assert_eq!(rec.holdings, None);
        assert_eq!(rec.quantity, None);
        assert_eq!(rec.total_cost, None);
        assert_eq!(rec.cost_per_share, None);
        assert_eq!(rec.unrealized_return_percent, None);
        assert_eq!(rec.unrealized_return_dollars, None);
    }

    #[test]
    fn one_bad_cell_does_not_affect_others() {
        let raw = row(&[
            (EQUITIES, "TSLA"),
            (HOLDINGS, "$1,000.00 4"),
            (COST, "unknown"),
            (UNREALIZED_RETURN, "5.00% +$50.00"),
        ]);
        let rec = extract_record(&raw);
        assert_eq!(rec.holdings, Some(1000.0));
        assert_eq!(rec.total_cost, None);
        assert_eq!(rec.cost_per_share, None);
        assert_eq!(rec.unrealized_return_percent, Some(5.0));
    }

    fn full_row(holdings: &str, cost: &str, unrealized: &str) -> RawRow {
        row(&[
            (EQUITIES, "AAPL"),
            (PRICE, "$234.76"),
            (HOLDINGS, holdings),
            (COST, cost),
            (DAY_RETURN, "+1.20% +$27.80"),
            (UNREALIZED_RETURN, unrealized),
        ])
    }

    #[test]
    fn day_return_is_not_taken_for_unrealized() {
        let rec = extract_record(&full_row("$2,347.60 10", "$744.91 $1,054.93", "--"));
        assert_eq!(rec.unrealized_return_percent, None);
        assert_eq!(rec.unrealized_return_dollars, None);
        assert_eq!(rec.holdings, Some(2347.60));
        assert_eq!(rec.total_cost, Some(744.91));
    }

    #[test]
    fn blank_unrealized_beside_day_return_stays_null() {
        let rec = extract_record(&full_row("$2,347.60 10", "$744.91 $1,054.93", ""));
        assert_eq!(rec.unrealized_return_percent, None);
        assert_eq!(rec.unrealized_return_dollars, None);
    }

    #[test]
    fn price_is_not_taken_for_holdings() {
        let rec = extract_record(&full_row("10 shares", "$744.91 $1,054.93", "38.60% +$653.80"));
        assert_eq!(rec.holdings, None);
        assert_eq!(rec.quantity, None);
        assert_eq!(rec.total_cost, Some(744.91));
        assert_eq!(rec.unrealized_return_percent, Some(38.60));
    }

    #[test]
    fn spaced_cost_cell_in_full_row() {
        let rec = extract_record(&full_row("$2 347.60 10", "$744.91 $1 054.93", "38.60% +$653.80"));
        assert_eq!(rec.holdings, Some(2347.60));
        assert_eq!(rec.quantity, Some(10.0));
        assert_eq!(rec.total_cost, Some(744.91));
        assert_eq!(rec.cost_per_share, Some(1054.93));
        assert_eq!(rec.unrealized_return_percent, Some(38.60));
        assert_eq!(rec.unrealized_return_dollars, Some(653.80));
    }

    #[test]
    fn merged_text_collapses_whitespace() {
        let raw = row(&[(EQUITIES, "  AAPL \n logo "), (HOLDINGS, "$2\u{a0}347.60\t10")]);
        assert_eq!(merged_text(&raw, &[]), "AAPL logo $2 347.60 10");
    }

    #[test]
    fn merged_text_leaves_out_skipped_columns() {
        let raw = row(&[(EQUITIES, "AAPL"), (PRICE, "$234.76"), (HOLDINGS, "10 shares")]);
        assert_eq!(merged_text(&raw, &[PRICE]), "AAPL 10 shares");
    }

    #[test]
    fn extraction_is_idempotent() {
        let raw = row(&[
            (EQUITIES, "NVDA"),
            (HOLDINGS, "$9,001.00 50"),
            (COST, "$4,000.00 $80.00"),
            (UNREALIZED_RETURN, "125.03% +$5,001.00"),
        ]);
        assert_eq!(extract_record(&raw), extract_record(&raw));
    }

    proptest! {
        #[test]
        fn never_panics_and_yields_finite_or_null(
            equities in ".{0,40}",
            holdings in ".{0,40}",
            cost in "[$0-9., /sharez]{0,40}",
            unrealized in "[-+$%0-9., ]{0,40}",
        ) {
            let raw = row(&[
                (EQUITIES, equities.as_str()),
                (HOLDINGS, holdings.as_str()),
                (COST, cost.as_str()),
                (UNREALIZED_RETURN, unrealized.as_str()),
            ]);
            let rec = extract_record(&raw);
            for value in [
                rec.holdings,
                rec.quantity,
                rec.total_cost,
                rec.cost_per_share,
                rec.unrealized_return_percent,
                rec.unrealized_return_dollars,
            ] {
                prop_assert!(value.map_or(true, f64::is_finite));
            }
            prop_assert_eq!(rec.equities, equities);
        }
    }
}
