//! Report splitter: separates one generator response into the readable
//! report and the structured records embedded between sentinel markers.
//!
//! The generator is not trusted to follow formatting instructions, so
//! [`split_report`] never fails: any missing marker, malformed fence, or
//! unparsable payload degrades to an empty record list while the report
//! text is always returned.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use rivalscope_shared::Record;

/// Marker opening the structured-data block.
pub const OPEN_MARKER: &str = "<JSON_DATA>";

/// Marker closing the structured-data block.
pub const CLOSE_MARKER: &str = "</JSON_DATA>";

/// Characters of an unparsable payload echoed into the log.
const LOGGED_PAYLOAD_CHARS: usize = 500;

/// Code-fence delimiter conventionally wrapping machine-readable blocks.
const FENCE: &str = "```";

/// The two halves of a generator response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitReport {
    /// Human-readable text: everything outside the markers.
    pub report: String,
    /// Parsed records; empty in every degraded case.
    pub records: Vec<Record>,
}

/// Split `raw` into report text and records.
///
/// - Both markers present, open before close: report is the trimmed text
///   before the open marker concatenated with the trimmed text after the
///   close marker; the payload is what lies between.
/// - Otherwise: `raw` is returned unchanged as the report, with no records.
pub fn split_report(raw: &str) -> SplitReport {
    let Some((report, payload)) = locate_block(raw) else {
        debug!("no structured block markers found, keeping whole response as report");
        return SplitReport {
            report: raw.to_string(),
            records: Vec::new(),
        };
    };

    SplitReport {
        report,
        records: parse_records(strip_code_fence(payload)),
    }
}

/// Find the first open marker and the first close marker after it.
fn locate_block(raw: &str) -> Option<(String, &str)> {
    let open = raw.find(OPEN_MARKER)?;
    let payload_start = open + OPEN_MARKER.len();
    let payload_end = payload_start + raw[payload_start..].find(CLOSE_MARKER)?;
    let trailing_start = payload_end + CLOSE_MARKER.len();

    let report = format!(
        "{}{}",
        raw[..open].trim(),
        raw[trailing_start..].trim()
    );

    Some((report, &raw[payload_start..payload_end]))
}

/// Remove one layer of ```` ``` ```` fencing (with optional info string).
fn strip_code_fence(payload: &str) -> &str {
    let mut body = payload.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        body = match rest.find('\n') {
            // Drop the rest of the opening line (`json`, `JSON`, ...)
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix(FENCE) {
        body = rest;
    }

    body.trim()
}

/// Parse a JSON list of flat objects into records.
///
/// Non-string scalar values are kept in their JSON spelling; `null` becomes
/// an empty cell.
fn parse_records(payload: &str) -> Vec<Record> {
    if payload.is_empty() {
        info!("structured block is empty, no records extracted");
        return Vec::new();
    }

    match serde_json::from_str::<Vec<IndexMap<String, Value>>>(payload) {
        Ok(objects) => {
            let records: Vec<Record> = objects
                .into_iter()
                .map(|object| {
                    object
                        .into_iter()
                        .map(|(key, value)| (key, cell_text(value)))
                        .collect()
                })
                .collect();
            info!(records = records.len(), "structured records extracted");
            records
        }
        Err(e) => {
            let excerpt: String = payload.chars().take(LOGGED_PAYLOAD_CHARS).collect();
            warn!(
                error = %e,
                payload = %excerpt,
                "structured block is not a list of records, continuing without records"
            );
            Vec::new()
        }
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
