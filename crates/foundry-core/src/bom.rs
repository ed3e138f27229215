//! Bill of materials inspection.
//!
//! Flags supply and pricing risks in a parsed BOM. Column lookup is loose
//! (case-insensitive substring) because BOM exports rarely agree on headers.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const MANUFACTURER_TERMS: &[&str] = &["Manufacturer", "Supplier", "Vendor", "Mfr"];
const PRICE_TERMS: &[&str] = &["Price", "Cost", "Unit Cost", "Unit Price"];

/// Share of rows above which one manufacturer is a dependency risk.
const DEPENDENCY_RATIO: f64 = 0.4;
/// Minimum number of rows naming a manufacturer before ratios mean anything.
const DEPENDENCY_MIN_ROWS: usize = 5;

pub const NO_RISKS_NOTE: &str = "No significant risks detected based on available data.";

/// A parsed table: headers plus rows of cells aligned to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BomTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BomTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// First header containing any of `terms`, ignoring case.
    pub fn find_column(&self, terms: &[&str]) -> Option<usize> {
        self.headers.iter().position(|header| {
            let header = header.to_lowercase();
            terms.iter().any(|term| header.contains(&term.to_lowercase()))
        })
    }

    fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BomReport {
    /// Row index → flags joined with `" | "`.
    pub flags: BTreeMap<usize, String>,
    /// Table-level findings, in the order they were produced.
    pub notes: Vec<String>,
}

impl BomReport {
    fn flag(&mut self, row: usize, message: String) {
        self.flags
            .entry(row)
            .and_modify(|existing| {
                existing.push_str(" | ");
                existing.push_str(&message);
            })
            .or_insert(message);
    }

    pub fn flag_for(&self, row: usize) -> Option<&str> {
        self.flags.get(&row).map(String::as_str)
    }

    pub fn flagged_rows(&self) -> usize {
        self.flags.len()
    }
}

/// Runs single-source and pricing analysis over `table`.
pub fn inspect(table: &BomTable) -> BomReport {
    let mut report = BomReport::default();

    match table.find_column(MANUFACTURER_TERMS) {
        Some(column) => check_dependency(table, column, &mut report),
        None => report.notes.push("Warning: No Manufacturer column found.".to_string()),
    }

    match table.find_column(PRICE_TERMS) {
        Some(column) => check_pricing(table, column, &mut report),
        None => report.notes.push("Warning: No Price column found.".to_string()),
    }

    if report.flags.is_empty() && report.notes.is_empty() {
        report.notes.push(NO_RISKS_NOTE.to_string());
    }
    report
}

fn check_dependency(table: &BomTable, column: usize, report: &mut BomReport) {
    // First-seen order keeps the notes stable for a given file
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;

    for row in 0..table.rows.len() {
        let manufacturer = table.cell(row, column);
        if manufacturer.is_empty() {
            continue;
        }
        let count = counts.entry(manufacturer).or_insert_with(|| {
            order.push(manufacturer);
            0
        });
        *count += 1;
        total += 1;
    }

    let mut risky: Vec<&str> = Vec::new();
    for manufacturer in order {
        let ratio = counts[manufacturer] as f64 / total as f64;
        if ratio > DEPENDENCY_RATIO && total > DEPENDENCY_MIN_ROWS {
            report.notes.push(format!(
                "High Dependency: {:.1}% of parts from \"{}\".",
                ratio * 100.0,
                manufacturer
            ));
            risky.push(manufacturer);
        }
    }

    if risky.is_empty() {
        return;
    }
    for row in 0..table.rows.len() {
        let manufacturer = table.cell(row, column);
        if risky.contains(&manufacturer) {
            report.flag(row, format!("Single Source Risk ({manufacturer})"));
        }
    }
}

fn check_pricing(table: &BomTable, column: usize, report: &mut BomReport) {
    let mut priced: Vec<(usize, f64)> = Vec::new();
    for row in 0..table.rows.len() {
        match parse_price(table.cell(row, column)) {
            Some(price) if price > 0.0 => priced.push((row, price)),
            _ => report.flag(row, "Missing Pricing".to_string()),
        }
    }

    if priced.is_empty() {
        return;
    }

    let n = priced.len() as f64;
    let mean = priced.iter().map(|(_, price)| price).sum::<f64>() / n;
    let variance = priced
        .iter()
        .map(|(_, price)| (price - mean).powi(2))
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    report.notes.push(format!(
        "Pricing Analysis: Mean {mean:.2}, StdDev {std_dev:.2}"
    ));

    let threshold = mean + 2.0 * std_dev;
    for (row, price) in priced {
        if price > threshold {
            report.flag(row, format!("High Price Outlier (${price})"));
        }
    }
}

/// Keeps digits and dots, then reads the longest leading decimal number.
/// `"$1,299.00"` → 1299.0, `"n/a"` → None.
fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    let end = cleaned
        .char_indices()
        .filter(|(_, c)| *c == '.')
        .nth(1)
        .map(|(index, _)| index)
        .unwrap_or(cleaned.len());
    cleaned[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> BomTable {
        BomTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$1,299.00"), Some(1299.0));
        assert_eq!(parse_price("0.45 USD"), Some(0.45));
        assert_eq!(parse_price("1.2.3"), Some(1.2));
        assert_eq!(parse_price("n/a"), None);
        assert_eq!(parse_price("."), None);
    }

    #[test]
    fn test_column_lookup_is_loose() {
        let table = table(&["Part", "Preferred VENDOR", "Unit Cost (USD)"], &[]);
        assert_eq!(table.find_column(MANUFACTURER_TERMS), Some(1));
        assert_eq!(table.find_column(PRICE_TERMS), Some(2));
        assert_eq!(table.find_column(&["Qty"]), None);
    }

    #[test]
    fn test_missing_columns_warn() {
        let report = inspect(&table(&["Part", "Qty"], &[&["R1", "2"]]));
        assert_eq!(
            report.notes,
            vec!["Warning: No Manufacturer column found.", "Warning: No Price column found."]
        );
        assert!(report.flags.is_empty());
    }

    #[test]
    fn test_single_source_risk() {
        let report = inspect(&table(
            &["Part", "Manufacturer", "Price"],
            &[
                &["R1", "Acme", "1"],
                &["R2", "Acme", "1"],
                &["R3", "Acme", "1"],
                &["C1", "Bolt Co", "1"],
                &["C2", "Bolt Co", "1"],
                &["U1", "Chipz", "1"],
            ],
        ));

        assert_eq!(report.notes[0], "High Dependency: 50.0% of parts from \"Acme\".");
        assert_eq!(report.flag_for(0), Some("Single Source Risk (Acme)"));
        assert_eq!(report.flag_for(3), None);
        assert_eq!(report.flagged_rows(), 3);
    }

    #[test]
    fn test_dependency_needs_more_than_five_rows() {
        let report = inspect(&table(
            &["Mfr", "Price"],
            &[&["Acme", "1"], &["Acme", "1"], &["Acme", "1"], &["Other", "1"], &["Other", "1"]],
        ));
        assert!(report.notes.iter().all(|note| !note.starts_with("High Dependency")));
    }

    #[test]
    fn test_pricing_flags_and_outliers() {
        let mut rows: Vec<Vec<String>> = (0..9)
            .map(|i| vec![format!("P{i}"), format!("Mfr{i}"), "10".to_string()])
            .collect();
        rows.push(vec!["P9".into(), "Mfr9".into(), "$100".into()]);
        rows.push(vec!["P10".into(), "Mfr10".into(), "".into()]);
        let table = BomTable::new(vec!["Part".into(), "Supplier".into(), "Unit Price".into()], rows);

        let report = inspect(&table);
        assert_eq!(report.notes, vec!["Pricing Analysis: Mean 19.00, StdDev 27.00"]);
        assert_eq!(report.flag_for(9), Some("High Price Outlier ($100)"));
        assert_eq!(report.flag_for(10), Some("Missing Pricing"));
        assert_eq!(report.flagged_rows(), 2);
    }

    #[test]
    fn test_flags_are_joined() {
        let rows: Vec<Vec<String>> = (0..6)
            .map(|i| vec!["Acme".to_string(), if i == 0 { "".into() } else { "5".into() }])
            .collect();
        let report = inspect(&BomTable::new(vec!["Vendor".into(), "Cost".into()], rows));
        assert_eq!(report.flag_for(0), Some("Single Source Risk (Acme) | Missing Pricing"));
    }

    #[test]
    fn test_clean_table_reports_no_risks() {
        let report = inspect(&BomTable::default());
        // Missing columns are themselves notes
        assert_eq!(report.notes.len(), 2);

        let report = inspect(&table(&["Mfr", "Price"], &[&["A", "1"], &["B", "1"]]));
        assert_eq!(report.notes, vec!["Pricing Analysis: Mean 1.00, StdDev 0.00"]);

        let report = inspect(&table(&["Mfr", "Price"], &[]));
        assert_eq!(report.notes, vec![NO_RISKS_NOTE]);
    }
}
