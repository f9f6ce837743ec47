//! Fixed-size overlapping text windows over loaded documents.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rivalscope_shared::{Result, RivalscopeError};

use crate::loader::Document;

/// A window of a document's text plus the document's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    /// Position of this chunk within its document.
    pub index: usize,
}

impl Chunk {
    /// File name of the source, for display.
    pub fn source_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Split every document into windows of at most `chunk_size` characters,
/// consecutive windows sharing up to `overlap` characters.
///
/// A window that would cut a word tries to end at the last whitespace in its
/// second half instead. Windows that are only whitespace are dropped.
pub fn chunk_documents(docs: &[Document], chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(RivalscopeError::validation("chunk size must be positive"));
    }
    if overlap >= chunk_size {
        return Err(RivalscopeError::validation(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
        )));
    }

    let mut chunks = Vec::new();
    for doc in docs {
        let windows = split_text(&doc.text, chunk_size, overlap);
        debug!(source = %doc.source.display(), row = ?doc.row, chunks = windows.len(), "chunked");
        chunks.extend(windows.into_iter().enumerate().map(|(index, text)| Chunk {
            text,
            source: doc.source.clone(),
            row: doc.row,
            index,
        }));
    }
    Ok(chunks)
}

fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut windows = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + size).min(len);
        if end < len {
            let half = start + size / 2;
            if let Some(ws) = (half..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws + 1;
            }
        }

        let window: String = chars[start..end].iter().collect();
        let window = window.trim();
        if !window.is_empty() {
            windows.push(window.to_string());
        }

        if end == len {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    windows
}
