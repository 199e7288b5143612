//! Delimited input files into raw rows

use std::fs::File;
use std::io::Read;
use std::path::Path;

use eyre::{Context, Result};
use tracing::{debug, warn};

use crate::domain::RawRow;

/// Rows read from one input file
#[derive(Debug, Clone, Default)]
pub struct ParsedInput {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Lines the CSV reader could not decode
    pub malformed: usize,
}

/// Read a CSV document. Row numbers are source line numbers, so the first
/// data row is row 2. Blank lines are skipped.
pub fn read_csv<R: Read>(reader: R, delimiter: u8) -> Result<ParsedInput> {
    debug!(delimiter = %(delimiter as char), "read_csv: called");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut input = ParsedInput {
        headers,
        ..Default::default()
    };

    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Skipping malformed line");
                input.malformed += 1;
                continue;
            }
        };
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);
        let columns = input.headers.iter().cloned().zip(record.iter().map(str::to_string));
        input.rows.push(RawRow::new(row, columns));
    }

    debug!(rows = input.rows.len(), malformed = input.malformed, "read_csv: complete");
    Ok(input)
}

/// Read a CSV or TSV file, picking the delimiter from the extension
pub fn read_file(path: &Path) -> Result<ParsedInput> {
    debug!(?path, "read_file: called");
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_csv(file, delimiter).with_context(|| format!("Failed to parse {}", path.display()))
}
