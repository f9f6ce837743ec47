//! Run artifacts: the Markdown report and the CSV of extracted records.
//!
//! Files land in one directory and share a stem derived from the subject and
//! the generation time:
//!
//! ```text
//! competitive_analysis_<slug>_<YYYYmmdd_HHMMSS>.md
//! competitive_analysis_<slug>_<YYYYmmdd_HHMMSS>.csv   (only with records)
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{info, instrument, warn};

use rivalscope_shared::{Record, Result, RivalscopeError};

const STEM_PREFIX: &str = "competitive_analysis";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Text written and printed when the pipeline produced no report.
pub const REPORT_PLACEHOLDER: &str = "The report could not be generated.";

/// What happened to each artifact. The CSV is `None` when there were no records.
#[derive(Debug)]
pub struct ExportOutcome {
    pub report: Result<PathBuf>,
    pub csv: Option<Result<PathBuf>>,
}

/// Lowercase, alphanumeric runs joined by `-`.
pub fn slugify(subject: &str) -> String {
    let slug = subject
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() { "subject".to_string() } else { slug }
}

/// Shared file stem for one run's artifacts.
pub fn artifact_stem(subject: &str, timestamp: NaiveDateTime) -> String {
    format!(
        "{STEM_PREFIX}_{}_{}",
        slugify(subject),
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Write both artifacts into `dir`, creating it if needed.
///
/// Only failing to create `dir` is an error here; per-file failures are
/// reported in the outcome so one does not prevent the other.
#[instrument(skip_all, fields(dir = %dir.display(), subject = %subject, records = records.len()))]
pub fn export_run(
    dir: &Path,
    subject: &str,
    timestamp: NaiveDateTime,
    report: &str,
    records: &[Record],
) -> Result<ExportOutcome> {
    std::fs::create_dir_all(dir).map_err(|e| RivalscopeError::io(dir, e))?;
    let stem = artifact_stem(subject, timestamp);

    let report_path = dir.join(format!("{stem}.md"));
    let report = write_report(&report_path, report)
        .map(|()| report_path)
        .inspect_err(|e| warn!(error = %e, "failed to save Markdown report"));

    let csv = if records.is_empty() {
        info!("no records, skipping CSV");
        None
    } else {
        let csv_path = dir.join(format!("{stem}.csv"));
        Some(
            write_records_csv(&csv_path, records)
                .map(|()| csv_path)
                .inspect_err(|e| warn!(error = %e, "failed to save CSV records")),
        )
    };

    Ok(ExportOutcome { report, csv })
}

/// Write the report verbatim.
pub fn write_report(path: &Path, report: &str) -> Result<()> {
    write_atomic(path, report.as_bytes())?;
    info!(path = %path.display(), "report saved");
    Ok(())
}

/// Write records as CSV with the first record's keys as header.
///
/// Missing keys become empty cells; keys absent from the header are dropped.
pub fn write_records_csv(path: &Path, records: &[Record]) -> Result<()> {
    let Some(first) = records.first() else {
        return Err(RivalscopeError::Export("no records to write".into()));
    };
    let header: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&header)
        .map_err(|e| RivalscopeError::Export(format!("CSV header: {e}")))?;

    for (i, record) in records.iter().enumerate() {
        let extra: Vec<&String> = record
            .keys()
            .filter(|k| !first.contains_key(k.as_str()))
            .collect();
        if !extra.is_empty() {
            warn!(row = i, ?extra, "record has keys outside the header, dropping them");
        }

        let row = header
            .iter()
            .map(|h| record.get(*h).map(String::as_str).unwrap_or_default());
        writer
            .write_record(row)
            .map_err(|e| RivalscopeError::Export(format!("CSV row {i}: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| RivalscopeError::Export(format!("CSV flush: {e}")))?;
    write_atomic(path, &bytes)?;

    info!(path = %path.display(), rows = records.len(), "records saved");
    Ok(())
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RivalscopeError::Export(format!("not a file path: {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, bytes).map_err(|e| RivalscopeError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        RivalscopeError::io(path, e)
    })?;
    Ok(())
}
