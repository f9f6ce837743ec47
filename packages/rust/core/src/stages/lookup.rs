use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use rivalscope_shared::Result;

use crate::facts::{FactTable, not_found_sheet};
use crate::state::{ResearchState, StateField, StateUpdate};
use crate::workflow::{ProgressReporter, Stage};

/// Looks the subject up in the static fact table. Never fails.
pub struct LookupStage {
    facts: Arc<FactTable>,
}

impl LookupStage {
    pub fn new(facts: Arc<FactTable>) -> Self {
        Self { facts }
    }
}

#[async_trait]
impl Stage for LookupStage {
    fn name(&self) -> &'static str {
        "lookup"
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::Subject]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::StructuredFindings]
    }

    #[instrument(skip_all, fields(subject = %state.subject))]
    async fn run(
        &self,
        state: &ResearchState,
        progress: &dyn ProgressReporter,
    ) -> Result<StateUpdate> {
        let sheet = match self.facts.lookup(&state.subject) {
            Some(sheet) => {
                info!(facts = sheet.len(), "structured facts found");
                progress.detail(&format!("{} structured facts found", sheet.len()));
                sheet.clone()
            }
            None => {
                warn!("subject not in fact table");
                progress.detail("no structured facts for this subject");
                not_found_sheet(&state.subject)
            }
        };

        Ok(StateUpdate {
            structured_findings: Some(sheet),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::FactSheet;
    use crate::workflow::SilentProgress;
    use serde_json::json;

    fn table() -> Arc<FactTable> {
        let sheet: FactSheet =
            serde_json::from_value(json!({"founded": "1999", "offices": 4})).unwrap();
        Arc::new(FactTable::from_entries([("Acme Corp", sheet)]))
    }

    #[tokio::test]
    async fn known_subject_yields_its_sheet() {
        let update = LookupStage::new(table())
            .run(&ResearchState::new(" ACME corp"), &SilentProgress)
            .await
            .unwrap();
        let sheet = update.structured_findings.unwrap();
        assert_eq!(sheet["founded"], json!("1999"));
        assert_eq!(sheet["offices"], json!(4));
    }

    #[tokio::test]
    async fn unknown_subject_yields_error_marker() {
        let update = LookupStage::new(table())
            .run(&ResearchState::new("Acme"), &SilentProgress)
            .await
            .unwrap();
        let sheet = update.structured_findings.unwrap();
        assert_eq!(sheet.len(), 1);
        assert!(sheet.contains_key("error"));
    }
}
