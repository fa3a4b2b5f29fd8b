use crate::scoring::{EvaluationSummary, RecordGrade};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{io::Write, path::Path};

/// One CSV row per record, scored or excluded.
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    id: &'a str,
    status: &'static str,
    true_positives: Option<usize>,
    false_negatives: Option<usize>,
    false_positives: Option<usize>,
    grade: Option<RecordGrade>,
    heart_rate_windows: Option<usize>,
    heart_rate_credit: Option<f64>,
    error_kind: Option<&'a str>,
    error_message: Option<&'a str>,
}

/// Write the per-record breakdown of `summary` as CSV.
pub fn write_report<W: Write>(summary: &EvaluationSummary, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for rec in &summary.records {
        out.serialize(ReportRow {
            id: &rec.id,
            status: "scored",
            true_positives: Some(rec.true_positives),
            false_negatives: Some(rec.false_negatives),
            false_positives: Some(rec.false_positives),
            grade: Some(rec.grade),
            heart_rate_windows: Some(rec.heart_rate_windows),
            heart_rate_credit: Some(rec.heart_rate_credit()),
            error_kind: None,
            error_message: None,
        })?;
    }
    for ex in &summary.excluded {
        out.serialize(ReportRow {
            id: &ex.id,
            status: "excluded",
            true_positives: None,
            false_negatives: None,
            false_positives: None,
            grade: None,
            heart_rate_windows: None,
            heart_rate_credit: None,
            error_kind: Some(&ex.kind),
            error_message: Some(&ex.message),
        })?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_report_file(summary: &EvaluationSummary, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_report(summary, file).with_context(|| format!("writing {}", path.display()))
}
