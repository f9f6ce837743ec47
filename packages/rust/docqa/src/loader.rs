//! Document loading: Markdown files as plain text, CSV files row by row.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use rivalscope_shared::{Result, RivalscopeError};

/// One loadable unit of text with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    /// File the text was read from.
    pub source: PathBuf,
    /// Zero-based data row, for documents that come from CSV rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

/// Load every file in `dir` (not recursing) whose extension is in `extensions`.
///
/// Extensions are compared case-insensitively. Unsupported extensions in the
/// list are skipped with a warning. The result is ordered by source path, then row.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_documents(dir: &Path, extensions: &[String]) -> Result<Vec<Document>> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let entries = std::fs::read_dir(dir).map_err(|e| RivalscopeError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RivalscopeError::io(dir, e))?.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if wanted.contains(&ext) {
            files.push((path, ext));
        }
    }
    files.sort();

    let mut docs = Vec::new();
    for (path, ext) in files {
        match ext.as_str() {
            "md" | "markdown" => docs.push(load_markdown(&path)?),
            "csv" => docs.extend(load_csv(&path)?),
            other => warn!(path = %path.display(), extension = other, "no loader for extension, skipping"),
        }
    }

    info!(documents = docs.len(), "documents loaded");
    Ok(docs)
}

fn load_markdown(path: &Path) -> Result<Document> {
    let raw = std::fs::read_to_string(path).map_err(|e| RivalscopeError::io(path, e))?;
    debug!(path = %path.display(), "loaded markdown");
    Ok(Document {
        text: strip_markdown(&raw),
        source: path.to_path_buf(),
        row: None,
    })
}

/// One document per data row, rendered as `header: value` lines.
fn load_csv(path: &Path) -> Result<Vec<Document>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| RivalscopeError::parse(format!("{}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| RivalscopeError::parse(format!("{}: {e}", path.display())))?
        .clone();

    let mut docs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| RivalscopeError::parse(format!("{} row {row}: {e}", path.display())))?;
        let text = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{}: {}", h.trim(), v.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        docs.push(Document {
            text,
            source: path.to_path_buf(),
            row: Some(row),
        });
    }

    debug!(path = %path.display(), rows = docs.len(), "loaded csv");
    Ok(docs)
}

/// Reduce Markdown to readable plain text.
pub fn strip_markdown(md: &str) -> String {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(```|~~~).*$").expect("valid regex"));
    static HTML_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>\n]+>").expect("valid regex"));
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+").expect("valid regex"));
    static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(\*\*|__)(.+?)(\*\*|__)|(\*|_)([^*_\s][^*_]*?)(\*|_)").expect("valid regex")
    });
    static INLINE_CODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid regex"));
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let text = FENCE_RE.replace_all(md, "");
    let text = HTML_RE.replace_all(&text, "");
    let text = IMAGE_RE.replace_all(&text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HEADING_RE.replace_all(&text, "");
    let text = EMPHASIS_RE.replace_all(&text, "$2$5");
    let text = INLINE_CODE_RE.replace_all(&text, "$1");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["md".into(), "csv".into()]
    }

    #[test]
    fn strip_markdown_keeps_readable_text() {
        let md = "# Acme Report\n\n## Services\n\n**Audit** and *tax* via [our site](https://acme.com).\n\
                  ![logo](logo.png)\n\n```json\n{\"a\": 1}\n```\n<br/>Use `acme-cli`.";
        assert_eq!(
            strip_markdown(md),
            "Acme Report\n\nServices\n\nAudit and tax via our site.\nlogo\n\n{\"a\": 1}\n\nUse acme-cli."
        );
    }

    #[test]
    fn strip_markdown_leaves_snake_case_alone() {
        assert_eq!(strip_markdown("see report_id field"), "see report_id field");
    }

    #[test]
    fn loads_markdown_and_csv_rows_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_report.md"), "# Globex\nBody").unwrap();
        std::fs::write(
            dir.path().join("a_data.csv"),
            "Category,Information\nIdentity,Slogan\nClients,\"Initech, Inc\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested.md")).unwrap();

        let docs = load_documents(dir.path(), &exts()).unwrap();
        assert_eq!(docs.len(), 3);

        assert_eq!(docs[0].source, dir.path().join("a_data.csv"));
        assert_eq!(docs[0].row, Some(0));
        assert_eq!(docs[0].text, "Category: Identity\nInformation: Slogan");
        assert_eq!(docs[1].row, Some(1));
        assert_eq!(docs[1].text, "Category: Clients\nInformation: Initech, Inc");

        assert_eq!(docs[2].source, dir.path().join("b_report.md"));
        assert_eq!(docs[2].row, None);
        assert_eq!(docs[2].text, "Globex\nBody");
    }

    #[test]
    fn does_not_recurse() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("deep.md"), "deep").unwrap();
        assert!(load_documents(dir.path(), &exts()).unwrap().is_empty());
    }

    #[test]
    fn extension_match_ignores_case_and_dot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("UPPER.MD"), "text").unwrap();
        let docs = load_documents(dir.path(), &[".md".to_string()]).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn missing_dir_is_io_error() {
        let err = load_documents(Path::new("/no/such/dir"), &exts()).unwrap_err();
        assert!(matches!(err, RivalscopeError::Io { .. }));
    }
}
