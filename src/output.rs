use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::ValueEnum;
use tracing::info;

use crate::parser::extract::{Mode, Results, Row};

const DATETIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Bordered table on stdout
    Pretty,
    /// CSV file in the results directory
    File,
}

pub fn control_output(
    results: &Results,
    mode: Mode,
    format: Option<OutputFormat>,
    results_dir: &Path,
) -> Result<()> {
    match format {
        Some(OutputFormat::Pretty) => print!("{}", render_table(results)),
        Some(OutputFormat::File) => {
            let path = write_csv(results, mode, results_dir, Local::now())?;
            info!(path = %path.display(), "Results file saved");
        }
        None => print!("{}", render_plain(results)),
    }
    Ok(())
}

fn all_rows(results: &Results) -> impl Iterator<Item = &Row> {
    results.header.iter().chain(results.rows.iter())
}

/// One line per row, fields separated by a space.
pub fn render_plain(results: &Results) -> String {
    let mut out = String::new();
    for row in all_rows(results) {
        out.push_str(&row.join(" "));
        out.push('\n');
    }
    out
}

/// Left-aligned table; the header (if any) sits between its own borders.
pub fn render_table(results: &Results) -> String {
    let mut widths: Vec<usize> = Vec::new();
    for row in all_rows(results) {
        for (i, cell) in row.iter().enumerate() {
            let w = cell.chars().count();
            match widths.get_mut(i) {
                Some(max) => *max = (*max).max(w),
                None => widths.push(w),
            }
        }
    }

    let border = format!(
        "+{}+\n",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let line = |row: &Row| -> String {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| format!(" {:<w$} ", row.get(i).map_or("", String::as_str)))
            .collect();
        format!("|{}|\n", cells.join("|"))
    };

    let mut out = border.clone();
    if let Some(header) = &results.header {
        out.push_str(&line(header));
        out.push_str(&border);
    }
    for row in &results.rows {
        out.push_str(&line(row));
    }
    out.push_str(&border);
    out
}

/// Every field quoted, embedded quotes doubled, `\n` line endings.
pub fn render_csv(results: &Results) -> String {
    let mut out = String::new();
    for row in all_rows(results) {
        let fields: Vec<String> = row
            .iter()
            .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

pub fn write_csv(
    results: &Results,
    mode: Mode,
    results_dir: &Path,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create {}", results_dir.display()))?;
    let path = results_dir.join(format!("{}_{}.csv", mode.name(), now.format(DATETIME_FORMAT)));
    std::fs::write(&path, render_csv(results))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
