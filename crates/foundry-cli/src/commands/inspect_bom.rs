use super::context::AppContext;
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use foundry_core::backend::BlobApi;
use foundry_core::bom::{self, BomReport, BomTable};
use std::io::Read;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectBomArgs {
    /// Local CSV file
    pub file: Option<PathBuf>,

    /// Inspect an uploaded artifact instead of a local file
    #[arg(long, conflicts_with = "file")]
    pub blob: Option<String>,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,
}

pub async fn inspect(ctx: Option<&AppContext>, args: InspectBomArgs) -> Result<()> {
    let bytes = match (&args.file, &args.blob, ctx) {
        (Some(path), _, _) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(blob_id), Some(ctx)) => ctx
            .backend
            .download_blob(blob_id)
            .await
            .with_context(|| format!("Failed to download artifact '{blob_id}'"))?,
        _ => bail!("pass a CSV file or --blob <id>"),
    };

    let table = load_table(bytes.as_slice(), args.delimiter)?;
    let report = bom::inspect(&table);
    print_report(&table, &report);
    Ok(())
}

/// Parses CSV into a table. Short rows are padded so cells stay aligned to
/// the headers.
pub fn load_table(reader: impl Read, delimiter: char) -> Result<BomTable> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse CSV row {}", idx + 2))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.len() < headers.len() {
            row.resize(headers.len(), String::new());
        }
        rows.push(row);
    }

    Ok(BomTable::new(headers, rows))
}

fn print_report(table: &BomTable, report: &BomReport) {
    println!(
        "{} rows, {} flagged",
        table.rows.len(),
        report.flagged_rows().to_string().bold()
    );
    for (row, flag) in &report.flags {
        let first_cell = table
            .rows
            .get(*row)
            .and_then(|cells| cells.first())
            .map(String::as_str)
            .unwrap_or("");
        println!("  row {:>4} {:<24} {}", row + 1, first_cell, flag.red());
    }
    for note in &report.notes {
        if note.starts_with("Warning") {
            println!("{}", note.yellow());
        } else {
            println!("{note}");
        }
    }
}
