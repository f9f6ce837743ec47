//! The concrete pipeline stages and the two standard stage chains.
//!
//! | Stage | Reads | Writes |
//! |---|---|---|
//! | [`PlanningStage`] | subject | plan |
//! | [`ResearchStage`] | plan | web_findings |
//! | [`LookupStage`] | subject | structured_findings |
//! | [`ReconcileStage`] | web_findings, structured_findings | validated_summary |
//! | [`ReportStage`] | web_findings *or* validated_summary | final_report, extracted_records |

mod lookup;
mod planning;
mod reconcile;
mod report;
mod research;

use std::sync::Arc;

pub use lookup::LookupStage;
pub use planning::{PlanningStage, parse_plan};
pub use reconcile::ReconcileStage;
pub use report::{ReportMode, ReportStage};
pub use research::ResearchStage;

use rivalscope_providers::{SearchProvider, TextGenerator};
use rivalscope_shared::{AppConfig, Result, SearchDepth, WebFinding};

use crate::facts::FactTable;
use crate::workflow::{Workflow, WorkflowBuilder};

/// Tunables shared by the stages, resolved from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    pub min_queries: u32,
    pub max_queries: u32,
    pub search_depth: SearchDepth,
    pub max_results: u32,
    /// Characters of each finding's content passed to the generator.
    pub content_excerpt_chars: usize,
    pub report_language: String,
}

impl From<&AppConfig> for StageSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_queries: config.research.min_queries,
            max_queries: config.research.max_queries,
            search_depth: config.tavily.search_depth,
            max_results: config.tavily.max_results,
            content_excerpt_chars: config.research.content_excerpt_chars,
            report_language: config.research.report_language.clone(),
        }
    }
}

impl Default for StageSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Planning, Research, then Report fed directly with the web findings.
pub fn standard_workflow(
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchProvider>,
    settings: &StageSettings,
) -> Result<Workflow> {
    WorkflowBuilder::entry(PlanningStage::new(generator.clone(), settings))
        .then(ResearchStage::new(search, settings))
        .then(ReportStage::new(generator, ReportMode::Direct, settings))
        .build()
}

/// Planning, Research, Lookup, Reconciliation, then Report fed with the
/// reconciled summary.
pub fn reconciled_workflow(
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchProvider>,
    facts: Arc<FactTable>,
    settings: &StageSettings,
) -> Result<Workflow> {
    WorkflowBuilder::entry(PlanningStage::new(generator.clone(), settings))
        .then(ResearchStage::new(search, settings))
        .then(LookupStage::new(facts))
        .then(ReconcileStage::new(generator.clone(), settings))
        .then(ReportStage::new(generator, ReportMode::Reconciled, settings))
        .build()
}

/// Render findings as `Source URL` / `Content` blocks separated by blank lines.
pub fn format_findings(findings: &[WebFinding], excerpt_chars: usize) -> String {
    findings
        .iter()
        .map(|f| {
            format!(
                "Source URL: {}\nContent: {}...",
                f.url,
                excerpt(&f.content, excerpt_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The first `max_chars` characters of `text`, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process provider doubles shared by the stage tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use rivalscope_providers::{SearchProvider, TextGenerator};
    use rivalscope_shared::{Result, RivalscopeError, SearchDepth, WebFinding};

    /// Returns scripted responses in order and records every prompt.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        responses: Mutex<Vec<String>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
            let mut responses: Vec<String> = responses.into_iter().map(Into::into).collect();
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompt(&self, i: usize) -> String {
            self.prompts.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| RivalscopeError::provider("scripted", "no response left"))
        }
    }

    /// Per-query canned hits; queries without an entry fail.
    #[derive(Default)]
    pub struct CannedSearch {
        hits: HashMap<String, Vec<WebFinding>>,
        pub calls: Mutex<Vec<(String, SearchDepth, u32)>>,
    }

    impl CannedSearch {
        pub fn with(mut self, query: &str, hits: Vec<WebFinding>) -> Self {
            self.hits.insert(query.to_string(), hits);
            self
        }
    }

    #[async_trait]
    impl SearchProvider for CannedSearch {
        async fn search(
            &self,
            query: &str,
            depth: SearchDepth,
            max_results: u32,
        ) -> Result<Vec<WebFinding>> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), depth, max_results));
            self.hits
                .get(query)
                .cloned()
                .ok_or_else(|| RivalscopeError::provider("canned", format!("no hits for {query}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{CannedSearch, ScriptedGenerator};
    use super::*;
    use crate::facts::FactSheet;
    use crate::workflow::SilentProgress;
    use serde_json::json;

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt("", 3), "");
    }

    #[test]
    fn findings_render_as_source_blocks() {
        let findings = vec![
            WebFinding::new("https://a.com", "abcdef"),
            WebFinding::new("https://b.com", "xyz"),
        ];
        assert_eq!(
            format_findings(&findings, 3),
            "Source URL: https://a.com\nContent: abc...\n\nSource URL: https://b.com\nContent: xyz..."
        );
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.research.report_language = "French".into();
        config.tavily.max_results = 5;
        let settings = StageSettings::from(&config);
        assert_eq!(settings.report_language, "French");
        assert_eq!(settings.max_results, 5);
        assert_eq!(settings.search_depth, SearchDepth::Advanced);
    }

    #[tokio::test]
    async fn acme_scenario_end_to_end() {
        let generator = Arc::new(ScriptedGenerator::new([
            "acme website\nacme clients",
            "## Report\nHello\n<JSON_DATA>[{\"Catégorie\":\"Identité\",\"Information\":\"x\"}]</JSON_DATA>",
        ]));
        let search = Arc::new(
            CannedSearch::default().with("acme website", vec![WebFinding::new("a.com", "x")]),
        );

        let workflow =
            standard_workflow(generator.clone(), search, &StageSettings::default()).unwrap();
        assert_eq!(workflow.stage_names(), ["planning", "research", "report"]);

        let state = workflow.run("Acme", &SilentProgress).await.unwrap();
        assert_eq!(state.web_findings(), [WebFinding::new("a.com", "x")]);
        assert_eq!(state.final_report.as_deref(), Some("## Report\nHello"));

        let records = state.extracted_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["Catégorie"], "Identité");
        assert_eq!(records[0]["Information"], "x");
    }

    #[tokio::test]
    async fn report_without_markers_keeps_full_text() {
        let raw = "# Acme\nNo data block here.";
        let generator = Arc::new(ScriptedGenerator::new(["q1", raw]));
        let search = Arc::new(CannedSearch::default().with("q1", vec![]));

        let workflow =
            standard_workflow(generator, search, &StageSettings::default()).unwrap();
        let state = workflow.run("Acme", &SilentProgress).await.unwrap();
        assert_eq!(state.final_report.as_deref(), Some(raw));
        assert!(state.extracted_records().is_empty());
    }

    #[tokio::test]
    async fn reconciled_chain_feeds_summary_into_report() {
        let generator = Arc::new(ScriptedGenerator::new([
            "acme website",
            "Acme was founded in 1999.",
            "# Report",
        ]));
        let search = Arc::new(
            CannedSearch::default()
                .with("acme website", vec![WebFinding::new("a.com", "founded 2001")]),
        );
        let sheet: FactSheet = serde_json::from_value(json!({"founded": "1999"})).unwrap();
        let facts = Arc::new(FactTable::from_entries([("Acme", sheet)]));

        let workflow = reconciled_workflow(
            generator.clone(),
            search,
            facts,
            &StageSettings::default(),
        )
        .unwrap();
        assert_eq!(
            workflow.stage_names(),
            ["planning", "research", "lookup", "reconciliation", "report"]
        );

        let state = workflow.run("acme", &SilentProgress).await.unwrap();
        assert_eq!(
            state.validated_summary.as_deref(),
            Some("Acme was founded in 1999.")
        );
        assert_eq!(state.final_report.as_deref(), Some("# Report"));

        let reconcile_prompt = generator.prompt(1);
        assert!(reconcile_prompt.contains("founded 2001"));
        assert!(reconcile_prompt.contains("\"founded\": \"1999\""));
        let report_prompt = generator.prompt(2);
        assert!(report_prompt.contains("Acme was founded in 1999."));
        assert!(!report_prompt.contains("Source URL: a.com"));
    }
}
