use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use rivalscope_providers::TextGenerator;
use rivalscope_shared::Result;

use crate::splitter::{CLOSE_MARKER, OPEN_MARKER, split_report};
use crate::state::{ResearchState, StateField, StateUpdate};
use crate::workflow::{ProgressReporter, Stage};

use super::{StageSettings, format_findings};

/// Which state field feeds the report prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Raw web findings, excerpted.
    Direct,
    /// The reconciliation stage's summary.
    Reconciled,
}

/// Asks the generator for the long-form report plus an embedded record block,
/// then splits the response.
pub struct ReportStage {
    generator: Arc<dyn TextGenerator>,
    mode: ReportMode,
    excerpt_chars: usize,
    language: String,
}

impl ReportStage {
    pub fn new(generator: Arc<dyn TextGenerator>, mode: ReportMode, settings: &StageSettings) -> Self {
        Self {
            generator,
            mode,
            excerpt_chars: settings.content_excerpt_chars,
            language: settings.report_language.clone(),
        }
    }

    fn research_data(&self, state: &ResearchState) -> String {
        match self.mode {
            ReportMode::Direct => format_findings(state.web_findings(), self.excerpt_chars),
            ReportMode::Reconciled => state.validated_summary.clone().unwrap_or_default(),
        }
    }

    fn prompt(&self, state: &ResearchState) -> String {
        let subject = &state.subject;
        let data = self.research_data(state);
        let language = &self.language;

        format!(
            r#"As an expert market analyst, write a detailed competitive analysis report on "{subject}" based exclusively on the following research data.

Research data:
---
{data}
---

Markdown report instructions:
1. **Introduction:** briefly present the purpose of the report.
2. **Positioning and values:** identify the slogan, mission and values of the company.
3. **Areas of expertise:** list the main services and specialties.
4. **Global presence of {subject}:** summarize information about its presence (leadership, projects, contact).
5. **Publications and thought leadership:** mention the themes of published reports or studies.
6. **Key clients and projects:** identify notable clients or partnerships mentioned.
7. **Conclusion:** give a synthetic conclusion on the overall strategy of {subject} based on the information collected.

The report must be structured, professional, easy to read, written in {language} and formatted in Markdown.
For each section, include a "Sources:" sub-section at the end listing the relevant URLs used for that section. When a piece of information comes from a specific source, cite it directly.

---
In addition to the Markdown report, produce a JSON structure containing the key information extracted, with its category and main source URL.
The JSON must be a list of objects, each with the keys "Category", "Information" and "Source URL".
Categories must be: "Identity", "Services", "Local Presence", "Publications", "Clients".
If a piece of information has no direct or clear source, use "N/A" for "Source URL".

Example JSON format:
```json
[
    {{
        "Category": "Identity",
        "Information": "Slogan: Building a better working world",
        "Source URL": "https://www.example.com/en"
    }},
    {{
        "Category": "Services",
        "Information": "Audit, climate change and sustainability services",
        "Source URL": "https://www.example.com/en/assurance"
    }}
]
```
Place the JSON between the tags {OPEN_MARKER} and {CLOSE_MARKER}."#
        )
    }
}

#[async_trait]
impl Stage for ReportStage {
    fn name(&self) -> &'static str {
        "report"
    }

    fn reads(&self) -> &'static [StateField] {
        match self.mode {
            ReportMode::Direct => &[StateField::Subject, StateField::WebFindings],
            ReportMode::Reconciled => &[StateField::Subject, StateField::ValidatedSummary],
        }
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::FinalReport, StateField::ExtractedRecords]
    }

    #[instrument(skip_all, fields(subject = %state.subject, mode = ?self.mode))]
    async fn run(
        &self,
        state: &ResearchState,
        progress: &dyn ProgressReporter,
    ) -> Result<StateUpdate> {
        let raw = self.generator.generate(&self.prompt(state)).await?;
        let split = split_report(&raw);

        info!(
            report_chars = split.report.len(),
            records = split.records.len(),
            "report generated"
        );
        if split.records.is_empty() {
            progress.detail("no structured records extracted");
        }

        Ok(StateUpdate {
            final_report: Some(split.report),
            extracted_records: Some(split.records),
            ..Default::default()
        })
    }
}
