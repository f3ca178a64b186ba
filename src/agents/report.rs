//! Stale key report artifact
//!
//! UTF-8 CSV with the fixed header `user_name,age_of_key,created_date` and
//! one row per [`AgeFinding`], in audit order. The header is written even
//! when there are no findings.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use thiserror::Error;
use tracing::{debug, info};

use super::key_audit::AgeFinding;

/// Column names of the report, in order
pub const REPORT_HEADER: [&str; 3] = ["user_name", "age_of_key", "created_date"];

/// Default file name of the report artifact
pub const DEFAULT_REPORT_FILE_NAME: &str = "IAM_Users_Report.csv";

/// Errors that can occur while writing or reading the report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unexpected report header: {0}")]
    UnexpectedHeader(String),
}

/// Write `findings` to `path`, replacing any existing file
pub fn write_report(path: &Path, findings: &[AgeFinding]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(REPORT_HEADER)?;
    for finding in findings {
        writer.serialize(finding)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = findings.len(), "Report written");
    Ok(())
}

/// Read a report back, preserving row order
pub fn read_report(path: &Path) -> Result<Vec<AgeFinding>, ReportError> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let header = reader.headers()?.clone();
    if header.iter().ne(REPORT_HEADER.iter().copied()) {
        return Err(ReportError::UnexpectedHeader(
            header.iter().collect::<Vec<_>>().join(","),
        ));
    }

    let findings = reader
        .deserialize()
        .collect::<Result<Vec<AgeFinding>, _>>()?;

    debug!(path = %path.display(), rows = findings.len(), "Report read");
    Ok(findings)
}
