use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use rivalscope_providers::TextGenerator;
use rivalscope_shared::Result;

use crate::state::{ResearchState, StateField, StateUpdate};
use crate::workflow::{ProgressReporter, Stage};

use super::StageSettings;

/// Asks the generator for line-delimited search queries about the subject.
pub struct PlanningStage {
    generator: Arc<dyn TextGenerator>,
    min_queries: u32,
    max_queries: u32,
}

impl PlanningStage {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: &StageSettings) -> Self {
        Self {
            generator,
            min_queries: settings.min_queries,
            max_queries: settings.max_queries,
        }
    }

    fn prompt(&self, subject: &str) -> String {
        format!(
            r#"As a strategy analyst, build a research plan for a complete competitive analysis of "{subject}".
Produce between {min} and {max} precise web search queries.
The queries must cover the following aspects:
1. Identity and positioning: official website, slogan, social media pages.
2. Services and offers: main services, areas of expertise.
3. Local presence: contact details, local leadership, specific mandates.
4. Publications and reports: case studies, white papers on key topics.
5. Clients and projects: announcements of new clients, contracts or partnerships.

Reply only with the list of queries, one per line."#,
            min = self.min_queries,
            max = self.max_queries,
        )
    }
}

#[async_trait]
impl Stage for PlanningStage {
    fn name(&self) -> &'static str {
        "planning"
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::Subject]
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::Plan]
    }

    #[instrument(skip_all, fields(subject = %state.subject))]
    async fn run(
        &self,
        state: &ResearchState,
        progress: &dyn ProgressReporter,
    ) -> Result<StateUpdate> {
        let response = self.generator.generate(&self.prompt(&state.subject)).await?;
        let plan = parse_plan(&response);

        info!(queries = plan.len(), "research plan ready");
        for query in &plan {
            progress.detail(&format!("- {query}"));
        }

        Ok(StateUpdate {
            plan: Some(plan),
            ..Default::default()
        })
    }
}

/// One query per non-blank line, trimmed. No other validation.
pub fn parse_plan(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
