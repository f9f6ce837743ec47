//! Core domain types shared by the pipeline, providers, and CLI.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WebFinding
// ---------------------------------------------------------------------------

/// One raw search hit returned by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFinding {
    /// Source page URL, as reported by the provider.
    pub url: String,
    /// Extracted page content or snippet.
    pub content: String,
}

impl WebFinding {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One extracted fact destined for tabular export.
///
/// Key order is the order the generator emitted, so the first record of a
/// sequence fixes the CSV column order.
pub type Record = IndexMap<String, String>;

// ---------------------------------------------------------------------------
// SearchDepth
// ---------------------------------------------------------------------------

/// How much effort the search provider should spend per query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    #[default]
    Advanced,
}

impl SearchDepth {
    /// Wire value understood by the search API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchDepth {
    type Err = crate::RivalscopeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            other => Err(crate::RivalscopeError::validation(format!(
                "unknown search depth '{other}': expected 'basic' or 'advanced'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn search_depth_parses_case_insensitively() {
        assert_eq!("Advanced".parse::<SearchDepth>().unwrap(), SearchDepth::Advanced);
        assert_eq!(" basic ".parse::<SearchDepth>().unwrap(), SearchDepth::Basic);
        assert!("deep".parse::<SearchDepth>().is_err());
    }

    #[test]
    fn search_depth_serializes_lowercase() {
        let json = serde_json::to_string(&SearchDepth::Advanced).unwrap();
        assert_eq!(json, r#""advanced""#);
    }

    #[test]
    fn record_preserves_key_order() {
        let json = r#"{"Category":"Identity","Information":"x","Source URL":"N/A"}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Category", "Information", "Source URL"]);
    }
}
