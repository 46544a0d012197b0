//! Presentation and export of the machine PATH listing.
//!
//! Handles console output and exporting to txt or csv.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use csv::Writer;

use crate::gateway::SystemGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Txt,
    Csv,
}

/// Whether a PATH entry points at something on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Present,
    Missing,
    /// Contains `%VAR%` references resolved only at logon.
    Unexpanded,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Present => write!(f, "present"),
            EntryStatus::Missing => write!(f, "missing"),
            EntryStatus::Unexpanded => write!(f, "unexpanded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub entry: String,
    pub status: EntryStatus,
}

pub fn inspect_entries(gateway: &dyn SystemGateway, entries: &[String]) -> Vec<PathEntry> {
    entries
        .iter()
        .map(|entry| {
            let status = if entry.contains('%') {
                EntryStatus::Unexpanded
            } else if gateway.path_exists(Path::new(entry)) {
                EntryStatus::Present
            } else {
                EntryStatus::Missing
            };
            PathEntry {
                entry: entry.clone(),
                status,
            }
        })
        .collect()
}

fn status_marker(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Present => "✓",
        EntryStatus::Unexpanded => "~",
        EntryStatus::Missing => "✗",
    }
}

/// Display the listing on the console.
pub fn display_entries(entries: &[PathEntry], verbose: bool) {
    println!("=== Machine PATH ===");
    println!("Total entries: {}\n", entries.len());

    if entries.is_empty() {
        println!("PATH is empty.");
        return;
    }

    let missing = entries
        .iter()
        .filter(|e| e.status == EntryStatus::Missing)
        .count();

    for (i, e) in entries.iter().enumerate() {
        if verbose {
            println!("> {i}: {} {} ({})", status_marker(e.status), e.entry, e.status);
        } else {
            println!("> {i}: {}", e.entry);
        }
    }

    if missing > 0 {
        let noun = if missing == 1 { "entry" } else { "entries" };
        println!("\n{missing} {noun} no longer on disk");
    }
}

/// Export the listing to `path` in the given format.
pub fn export(entries: &[PathEntry], path: &Path, format: ExportFormat) -> Result<()> {
    let file = File::create(path)?;
    match format {
        ExportFormat::Txt => write_txt(entries, file),
        ExportFormat::Csv => write_csv(entries, file),
    }
}

fn write_txt<W: Write>(entries: &[PathEntry], mut out: W) -> Result<()> {
    let mut output = String::new();
    output.push_str("=== Machine PATH ===\n");
    output.push_str(&format!("Total entries: {}\n\n", entries.len()));
    for (i, e) in entries.iter().enumerate() {
        output.push_str(&format!("{i}: {} ({})\n", e.entry, e.status));
    }

    out.write_all(output.as_bytes())?;
    Ok(())
}

fn write_csv<W: Write>(entries: &[PathEntry], out: W) -> Result<()> {
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(["Index", "Entry", "Status"])?;

    for (i, e) in entries.iter().enumerate() {
        wtr.write_record([i.to_string(), e.entry.clone(), e.status.to_string()])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    fn sample(gw: &MemoryGateway) -> Vec<PathEntry> {
        let entries = vec![
            "C:\\Windows".to_string(),
            "%SystemRoot%\\System32".to_string(),
            "C:\\Gone, Old".to_string(),
        ];
        inspect_entries(gw, &entries)
    }

    #[test]
    fn classifies_entries() {
        let gw = MemoryGateway::new().with_dir("C:\\Windows");
        let statuses: Vec<_> = sample(&gw).into_iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![EntryStatus::Present, EntryStatus::Unexpanded, EntryStatus::Missing]
        );
    }

    #[test]
    fn csv_export_quotes_fields_with_commas() {
        let gw = MemoryGateway::new().with_dir("C:\\Windows");
        let mut buf = Vec::new();
        write_csv(&sample(&gw), &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Index,Entry,Status");
        assert_eq!(lines[1], "0,C:\\Windows,present");
        assert_eq!(lines[3], "2,\"C:\\Gone, Old\",missing");
    }

    #[test]
    fn txt_export_lists_each_entry() {
        let gw = MemoryGateway::new();
        let mut buf = Vec::new();
        write_txt(&sample(&gw), &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("=== Machine PATH ===\nTotal entries: 3\n\n"));
        assert!(text.contains("1: %SystemRoot%\\System32 (unexpanded)\n"));
    }

    #[test]
    fn export_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("path.csv");
        let gw = MemoryGateway::new();

        export(&sample(&gw), &path, ExportFormat::Csv).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
    }
}
