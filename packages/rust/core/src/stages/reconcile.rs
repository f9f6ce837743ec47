use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use rivalscope_providers::TextGenerator;
use rivalscope_shared::{Result, RivalscopeError};

use crate::state::{ResearchState, StateField, StateUpdate};
use crate::workflow::{ProgressReporter, Stage};

use super::{StageSettings, format_findings};

/// Merges web findings and structured facts into one model-written summary.
///
/// Structured facts are told to take precedence on conflict. That rule lives
/// only in the prompt; nothing here checks the summary obeys it.
pub struct ReconcileStage {
    generator: Arc<dyn TextGenerator>,
    excerpt_chars: usize,
}

impl ReconcileStage {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: &StageSettings) -> Self {
        Self {
            generator,
            excerpt_chars: settings.content_excerpt_chars,
        }
    }

    fn prompt(&self, state: &ResearchState, facts_json: &str) -> String {
        format!(
            r#"You are reconciling research about "{subject}" from two kinds of sources.

Structured facts (authoritative):
---
{facts_json}
---

Web search findings:
---
{findings}
---

Write a consolidated factual summary of "{subject}" that combines both sources.
When the structured facts and the web findings disagree, trust the structured facts and mention the discrepancy.
Keep the source URLs next to the information taken from web findings.
If the structured facts contain only an "error" entry, rely on the web findings alone."#,
            subject = state.subject,
            findings = format_findings(state.web_findings(), self.excerpt_chars),
        )
    }
}

#[async_trait]
impl Stage for ReconcileStage {
    fn name(&self) -> &'static str {
        "reconciliation"
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::WebFindings, StateField::StructuredFindings]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::ValidatedSummary]
    }

    #[instrument(skip_all, fields(subject = %state.subject))]
    async fn run(
        &self,
        state: &ResearchState,
        _progress: &dyn ProgressReporter,
    ) -> Result<StateUpdate> {
        let facts_json = match &state.structured_findings {
            Some(sheet) => serde_json::to_string_pretty(sheet)
                .map_err(|e| RivalscopeError::parse(format!("cannot render facts: {e}")))?,
            None => "{}".to_string(),
        };

        let summary = self
            .generator
            .generate(&self.prompt(state, &facts_json))
            .await?;
        info!(chars = summary.len(), "validated summary ready");

        Ok(StateUpdate {
            validated_summary: Some(summary),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::not_found_sheet;
    use crate::stages::testing::ScriptedGenerator;
    use crate::workflow::SilentProgress;
    use rivalscope_shared::WebFinding;

    #[tokio::test]
    async fn prompt_carries_both_sources_and_precedence_rule() {
        let generator = Arc::new(ScriptedGenerator::new(["summary"]));
        let stage = ReconcileStage::new(generator.clone(), &StageSettings::default());

        let mut state = ResearchState::new("Globex");
        state.web_findings = Some(vec![WebFinding::new("g.com", "Globex has 50 staff")]);
        state.structured_findings = Some(not_found_sheet("Globex"));

        let update = stage.run(&state, &SilentProgress).await.unwrap();
        assert_eq!(update.validated_summary.as_deref(), Some("summary"));

        let prompt = generator.prompt(0);
        assert!(prompt.contains("Source URL: g.com\nContent: Globex has 50 staff..."));
        assert!(prompt.contains("no structured facts found for 'Globex'"));
        assert!(prompt.contains("trust the structured facts"));
    }
}
