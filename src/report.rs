use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::ingest::IngestReport;

/// Run summary for export
#[derive(Debug, Serialize)]
struct RunSummary {
    processed: Vec<ProcessedEntry>,
    skipped: Vec<SkippedEntry>,
    failed: Vec<FailedEntry>,
}

#[derive(Debug, Serialize)]
struct ProcessedEntry {
    source: String,
    target: String,
    reencoded: bool,
}

#[derive(Debug, Serialize)]
struct SkippedEntry {
    source: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct FailedEntry {
    source: String,
    error: String,
}

/// Write a JSON summary of an ingest run to a file.
pub fn write_report(report: &IngestReport, output_path: &Path) -> Result<()> {
    let summary = RunSummary {
        processed: report
            .processed
            .iter()
            .map(|op| ProcessedEntry {
                source: op.source.display().to_string(),
                target: op.target.display().to_string(),
                reencoded: op.reencoded,
            })
            .collect(),
        skipped: report
            .skipped
            .iter()
            .map(|(path, reason)| SkippedEntry {
                source: path.display().to_string(),
                reason: reason.as_str().to_string(),
            })
            .collect(),
        failed: report
            .failed
            .iter()
            .map(|(path, error)| FailedEntry {
                source: path.display().to_string(),
                error: error.clone(),
            })
            .collect(),
    };

    let json = serde_json::to_string_pretty(&summary)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;

    Ok(())
}
