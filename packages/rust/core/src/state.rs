//! Shared pipeline state and the merge rules applied between stages.
//!
//! [`ResearchState`] is created fresh for each run and owned by the
//! workflow driver. Stages only ever see it by shared reference and hand back
//! a [`StateUpdate`]; the driver merges that update after checking the stage
//! touched nothing it did not declare.

use serde::Serialize;

use rivalscope_shared::{Record, Result, RivalscopeError, WebFinding};

use crate::facts::FactSheet;

// ---------------------------------------------------------------------------
// StateField
// ---------------------------------------------------------------------------

/// Names of the state fields, used to declare stage inputs and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    Subject,
    Plan,
    WebFindings,
    StructuredFindings,
    ValidatedSummary,
    FinalReport,
    ExtractedRecords,
}

impl StateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Plan => "plan",
            Self::WebFindings => "web_findings",
            Self::StructuredFindings => "structured_findings",
            Self::ValidatedSummary => "validated_summary",
            Self::FinalReport => "final_report",
            Self::ExtractedRecords => "extracted_records",
        }
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResearchState
// ---------------------------------------------------------------------------

/// The record threaded through every stage of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResearchState {
    /// Entity under analysis. Set at construction, never changed.
    pub subject: String,
    /// Search queries produced by planning.
    pub plan: Option<Vec<String>>,
    /// Raw search hits, in query order then provider order.
    pub web_findings: Option<Vec<WebFinding>>,
    /// Facts from the static lookup table (or a single `error` entry).
    pub structured_findings: Option<FactSheet>,
    /// Model-written reconciliation of web and structured findings.
    pub validated_summary: Option<String>,
    /// Human-readable report.
    pub final_report: Option<String>,
    /// Records extracted for tabular export.
    pub extracted_records: Option<Vec<Record>>,
}

impl ResearchState {
    /// Start a new run for `subject`.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn plan(&self) -> &[String] {
        self.plan.as_deref().unwrap_or_default()
    }

    pub fn web_findings(&self) -> &[WebFinding] {
        self.web_findings.as_deref().unwrap_or_default()
    }

    pub fn extracted_records(&self) -> &[Record] {
        self.extracted_records.as_deref().unwrap_or_default()
    }

    /// Merge a stage's update into the state.
    ///
    /// Every field present in `update` must appear in `declared`; otherwise
    /// nothing is merged and a pipeline error names the offending field.
    /// `web_findings` is appended to, every other field is overwritten.
    pub fn merge(
        &mut self,
        update: StateUpdate,
        stage: &str,
        declared: &[StateField],
    ) -> Result<()> {
        if let Some(field) = update.fields().into_iter().find(|f| !declared.contains(f)) {
            return Err(RivalscopeError::pipeline(format!(
                "stage '{stage}' returned undeclared field '{field}'"
            )));
        }

        let StateUpdate {
            plan,
            web_findings,
            structured_findings,
            validated_summary,
            final_report,
            extracted_records,
        } = update;

        if let Some(plan) = plan {
            self.plan = Some(plan);
        }
        if let Some(findings) = web_findings {
            self.web_findings
                .get_or_insert_with(Vec::new)
                .extend(findings);
        }
        if let Some(facts) = structured_findings {
            self.structured_findings = Some(facts);
        }
        if let Some(summary) = validated_summary {
            self.validated_summary = Some(summary);
        }
        if let Some(report) = final_report {
            self.final_report = Some(report);
        }
        if let Some(records) = extracted_records {
            self.extracted_records = Some(records);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StateUpdate
// ---------------------------------------------------------------------------

/// The partial state a stage returns. `None` means "not touched".
///
/// There is deliberately no `subject` field: it cannot be rewritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub plan: Option<Vec<String>>,
    pub web_findings: Option<Vec<WebFinding>>,
    pub structured_findings: Option<FactSheet>,
    pub validated_summary: Option<String>,
    pub final_report: Option<String>,
    pub extracted_records: Option<Vec<Record>>,
}

impl StateUpdate {
    /// Fields this update sets.
    pub fn fields(&self) -> Vec<StateField> {
        let mut fields = Vec::new();
        if self.plan.is_some() {
            fields.push(StateField::Plan);
        }
        if self.web_findings.is_some() {
            fields.push(StateField::WebFindings);
        }
        if self.structured_findings.is_some() {
            fields.push(StateField::StructuredFindings);
        }
        if self.validated_summary.is_some() {
            fields.push(StateField::ValidatedSummary);
        }
        if self.final_report.is_some() {
            fields.push(StateField::FinalReport);
        }
        if self.extracted_records.is_some() {
            fields.push(StateField::ExtractedRecords);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}
