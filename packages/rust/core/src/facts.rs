//! Static structured-fact lookup used by the reconciled workflow.
//!
//! The table is a JSON object mapping entity names to flat objects of facts:
//!
//! ```json
//! { "Acme Corp": { "founded": "1999", "employees": "120" } }
//! ```
//!
//! Lookups are exact matches after trimming and lowercasing.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use rivalscope_shared::{Result, RivalscopeError};

/// Facts about one entity, in file order.
pub type FactSheet = IndexMap<String, Value>;

/// Case-insensitive table of fact sheets keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct FactTable {
    entries: HashMap<String, FactSheet>,
}

impl FactTable {
    /// Build a table from `(name, facts)` pairs. Later duplicates win.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, FactSheet)>,
        K: AsRef<str>,
    {
        let mut table = Self::default();
        for (name, sheet) in entries {
            table.insert(name.as_ref(), sheet);
        }
        table
    }

    /// Load a table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RivalscopeError::io(path, e))?;
        let raw: IndexMap<String, FactSheet> = serde_json::from_str(&content).map_err(|e| {
            RivalscopeError::config(format!(
                "facts file {} is not an object of objects: {e}",
                path.display()
            ))
        })?;

        let table = Self::from_entries(raw);
        info!(path = %path.display(), entities = table.len(), "fact table loaded");
        Ok(table)
    }

    fn insert(&mut self, name: &str, sheet: FactSheet) {
        let key = normalize_key(name);
        if self.entries.insert(key, sheet).is_some() {
            warn!(entity = name, "duplicate entity in fact table, keeping the later entry");
        }
    }

    /// Facts for `subject`, if the table knows it.
    pub fn lookup(&self, subject: &str) -> Option<&FactSheet> {
        let hit = self.entries.get(&normalize_key(subject));
        debug!(subject, found = hit.is_some(), "fact table lookup");
        hit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key form used for storage and lookup.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// The sheet recorded when the subject is missing from the table.
pub fn not_found_sheet(subject: &str) -> FactSheet {
    let mut sheet = FactSheet::new();
    sheet.insert(
        "error".to_string(),
        Value::String(format!("no structured facts found for '{subject}'")),
    );
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet(value: Value) -> FactSheet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn lookup_ignores_case_and_surrounding_space() {
        let table = FactTable::from_entries([("Acme Corp", sheet(json!({"founded": "1999"})))]);
        assert_eq!(
            table.lookup("  acme CORP ").unwrap()["founded"],
            json!("1999")
        );
        assert!(table.lookup("Acme").is_none());
    }

    #[test]
    fn later_duplicates_win() {
        let table = FactTable::from_entries([
            ("Acme", sheet(json!({"v": 1}))),
            ("ACME", sheet(json!({"v": 2}))),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("acme").unwrap()["v"], json!(2));
    }

    #[test]
    fn not_found_sheet_names_the_subject() {
        let sheet = not_found_sheet("Globex");
        assert_eq!(
            sheet["error"],
            json!("no structured facts found for 'Globex'")
        );
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn load_reads_json_file_preserving_fact_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        std::fs::write(
            &path,
            r#"{"Initech": {"zeta": "last?", "alpha": "no, first"}, "Globex": {}}"#,
        )
        .unwrap();

        let table = FactTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        let keys: Vec<&String> = table.lookup("initech").unwrap().keys().collect();
        assert_eq!(keys, ["zeta", "alpha"]);
        assert!(table.lookup("globex").unwrap().is_empty());
    }

    #[test]
    fn load_rejects_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        std::fs::write(&path, r#"["not", "an", "object"]"#).unwrap();
        let err = FactTable::load(&path).unwrap_err();
        assert!(matches!(err, RivalscopeError::Config { .. }));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = FactTable::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, RivalscopeError::Io { .. }));
    }
}
