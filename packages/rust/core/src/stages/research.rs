use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use rivalscope_providers::SearchProvider;
use rivalscope_shared::{Result, SearchDepth};

use crate::state::{ResearchState, StateField, StateUpdate};
use crate::workflow::{ProgressReporter, Stage};

use super::StageSettings;

/// Runs every planned query through the search provider, one at a time.
///
/// A failing query is logged and skipped; the findings of the others are kept.
pub struct ResearchStage {
    search: Arc<dyn SearchProvider>,
    depth: SearchDepth,
    max_results: u32,
}

impl ResearchStage {
    pub fn new(search: Arc<dyn SearchProvider>, settings: &StageSettings) -> Self {
        Self {
            search,
            depth: settings.search_depth,
            max_results: settings.max_results,
        }
    }
}

#[async_trait]
impl Stage for ResearchStage {
    fn name(&self) -> &'static str {
        "research"
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::Plan]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::WebFindings]
    }

    #[instrument(skip_all, fields(queries = state.plan().len(), depth = %self.depth))]
    async fn run(
        &self,
        state: &ResearchState,
        progress: &dyn ProgressReporter,
    ) -> Result<StateUpdate> {
        let plan = state.plan();
        let mut findings = Vec::new();
        let mut failed = 0usize;

        for (i, query) in plan.iter().enumerate() {
            progress.detail(&format!("Searching [{}/{}] {query}", i + 1, plan.len()));
            match self.search.search(query, self.depth, self.max_results).await {
                Ok(hits) => findings.extend(hits),
                Err(e) => {
                    failed += 1;
                    warn!(query = %query, error = %e, "search failed, skipping query");
                }
            }
        }

        info!(findings = findings.len(), failed, "research complete");

        Ok(StateUpdate {
            web_findings: Some(findings),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::CannedSearch;
    use crate::workflow::SilentProgress;
    use rivalscope_shared::WebFinding;

    fn state_with_plan(queries: &[&str]) -> ResearchState {
        let mut state = ResearchState::new("Acme");
        state.plan = Some(queries.iter().map(|q| q.to_string()).collect());
        state
    }

    #[tokio::test]
    async fn failed_query_is_skipped_and_order_kept() {
        let search = Arc::new(
            CannedSearch::default()
                .with("q1", vec![WebFinding::new("a.com", "1"), WebFinding::new("b.com", "2")])
                .with("q3", vec![WebFinding::new("c.com", "3")]),
        );
        let stage = ResearchStage::new(search.clone(), &StageSettings::default());

        let update = stage
            .run(&state_with_plan(&["q1", "q2", "q3"]), &SilentProgress)
            .await
            .unwrap();

        let urls: Vec<String> = update
            .web_findings
            .unwrap()
            .into_iter()
            .map(|f| f.url)
            .collect();
        assert_eq!(urls, ["a.com", "b.com", "c.com"]);
        assert_eq!(search.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn all_queries_failing_yields_empty_findings() {
        let stage = ResearchStage::new(Arc::new(CannedSearch::default()), &StageSettings::default());
        let update = stage
            .run(&state_with_plan(&["q1", "q2"]), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(update.web_findings, Some(Vec::new()));
    }

    #[tokio::test]
    async fn passes_depth_and_result_bound() {
        let search = Arc::new(CannedSearch::default().with("q", vec![]));
        let settings = StageSettings {
            search_depth: SearchDepth::Basic,
            max_results: 7,
            ..StageSettings::default()
        };
        let stage = ResearchStage::new(search.clone(), &settings);
        stage
            .run(&state_with_plan(&["q"]), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(
            *search.calls.lock().unwrap(),
            [("q".to_string(), SearchDepth::Basic, 7)]
        );
    }
}
