//! CSV exports of a run summary

use std::collections::BTreeSet;
use std::io::Write;

use eyre::{Context, Result};
use tracing::debug;

use crate::summary::{RowErrorKind, RunSummary};

/// Write skipped and failed rows as `row,key,status,reason`
pub fn write_error_report<W: Write>(summary: &RunSummary, out: W) -> Result<()> {
    debug!(errors = summary.errors.len(), "write_error_report: called");
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["row", "key", "status", "reason"])?;
    for error in &summary.errors {
        let status = match error.kind {
            RowErrorKind::Skipped => "skipped",
            RowErrorKind::Failed => "failed",
        };
        let key = error.key.as_ref().map(ToString::to_string).unwrap_or_default();
        writer
            .write_record([error.row.to_string(), key, status.to_string(), error.reason.clone()])
            .context("Failed to write error report row")?;
    }
    writer.flush().context("Failed to flush error report")?;
    Ok(())
}

/// Write values generated at create time (e.g. initial passwords), one
/// column per generated field
pub fn write_generated<W: Write>(summary: &RunSummary, out: W) -> Result<()> {
    debug!(records = summary.generated.len(), "write_generated: called");
    let fields: BTreeSet<&str> = summary
        .generated
        .iter()
        .flat_map(|g| g.values.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec!["row", "key"];
    header.extend(fields.iter().copied());
    writer.write_record(&header)?;

    for generated in &summary.generated {
        let mut record = vec![
            generated.row.to_string(),
            generated.key.as_ref().map(ToString::to_string).unwrap_or_default(),
        ];
        record.extend(fields.iter().map(|f| generated.values.get(*f).cloned().unwrap_or_default()));
        writer.write_record(&record).context("Failed to write generated values row")?;
    }
    writer.flush().context("Failed to flush generated values")?;
    Ok(())
}
