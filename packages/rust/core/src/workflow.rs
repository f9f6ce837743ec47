//! Workflow driver: a statically declared, strictly sequential chain of
//! stages threading one [`ResearchState`] from entry to terminal stage.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info, instrument};

use rivalscope_shared::{Result, RivalscopeError, RunId};

use crate::state::{ResearchState, StateField, StateUpdate};

// ---------------------------------------------------------------------------
// Stage contract
// ---------------------------------------------------------------------------

/// One step of the pipeline.
///
/// A stage sees the state read-only and returns only the fields it produces.
/// `reads` and `writes` are checked when the workflow is built and again when
/// each update is merged.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields this stage consumes.
    fn reads(&self) -> &'static [StateField];

    /// Fields this stage may set.
    fn writes(&self) -> &'static [StateField];

    async fn run(
        &self,
        state: &ResearchState,
        progress: &dyn ProgressReporter,
    ) -> Result<StateUpdate>;
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Callback trait for operator-facing narration.
///
/// The CLI implements this with a spinner; tests use [`SilentProgress`].
pub trait ProgressReporter: Send + Sync {
    /// Called before stage `index` (1-based) of `total` runs.
    fn stage_started(&self, name: &str, index: usize, total: usize);
    /// Free-form detail from inside a stage.
    fn detail(&self, message: &str);
    /// Called after a stage's update has been merged.
    fn stage_finished(&self, name: &str);
    /// Called once when the terminal stage completes.
    fn done(&self, state: &ResearchState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _name: &str, _index: usize, _total: usize) {}
    fn detail(&self, _message: &str) {}
    fn stage_finished(&self, _name: &str) {}
    fn done(&self, _state: &ResearchState) {}
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Declares the straight-line chain: one entry stage, then successors.
pub struct WorkflowBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl WorkflowBuilder {
    /// Start a chain at `stage`.
    pub fn entry(stage: impl Stage + 'static) -> Self {
        Self {
            stages: vec![Box::new(stage)],
        }
    }

    /// Append `stage` after the current last stage.
    pub fn then(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Validate the chain and freeze it.
    ///
    /// Rejects duplicate stage names, writes to `subject`, and any read of a
    /// field that no earlier stage writes.
    pub fn build(self) -> Result<Workflow> {
        if self.stages.is_empty() {
            return Err(RivalscopeError::pipeline("workflow has no stages"));
        }

        let mut names = HashSet::new();
        let mut available: HashSet<StateField> = HashSet::from([StateField::Subject]);

        for stage in &self.stages {
            let name = stage.name();
            if !names.insert(name) {
                return Err(RivalscopeError::pipeline(format!(
                    "stage name '{name}' appears more than once"
                )));
            }
            if let Some(field) = stage.reads().iter().find(|f| !available.contains(*f)) {
                return Err(RivalscopeError::pipeline(format!(
                    "stage '{name}' reads '{field}' but no earlier stage writes it"
                )));
            }
            if stage.writes().contains(&StateField::Subject) {
                return Err(RivalscopeError::pipeline(format!(
                    "stage '{name}' declares a write to 'subject', which is fixed at start"
                )));
            }
            available.extend(stage.writes().iter().copied());
        }

        Ok(Workflow {
            stages: self.stages,
        })
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A validated stage chain, reusable across runs.
pub struct Workflow {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Workflow {
    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order against a fresh state for `subject`.
    ///
    /// A stage error stops the run and is returned as-is; nothing is
    /// checkpointed.
    #[instrument(skip_all, fields(subject = %subject, run_id = tracing::field::Empty))]
    pub async fn run(
        &self,
        subject: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<ResearchState> {
        if subject.trim().is_empty() {
            return Err(RivalscopeError::validation("subject must not be empty"));
        }

        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));
        let start = Instant::now();
        info!(stages = self.stages.len(), "starting workflow");

        let mut state = ResearchState::new(subject);
        let total = self.stages.len();

        for (i, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            progress.stage_started(name, i + 1, total);
            let stage_start = Instant::now();

            let update: StateUpdate = stage
                .run(&state, progress)
                .await
                .inspect_err(|e| error!(stage = name, error = %e, "stage failed"))?;
            state.merge(update, name, stage.writes())?;

            info!(
                stage = name,
                elapsed_ms = stage_start.elapsed().as_millis() as u64,
                "stage complete"
            );
            progress.stage_finished(name);
        }

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            findings = state.web_findings().len(),
            records = state.extracted_records().len(),
            "workflow complete"
        );
        progress.done(&state);
        Ok(state)
    }
}
