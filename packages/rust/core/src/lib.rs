//! Core pipeline for rivalscope.
//!
//! This crate holds the typed research state, the workflow driver that
//! threads it through a fixed chain of stages, the stages themselves, the
//! report splitter, the static fact table, and artifact export.

pub mod export;
pub mod facts;
pub mod splitter;
pub mod stages;
pub mod state;
pub mod workflow;

pub use export::{ExportOutcome, REPORT_PLACEHOLDER, export_run};
pub use facts::{FactSheet, FactTable};
pub use splitter::{SplitReport, split_report};
pub use stages::{StageSettings, reconciled_workflow, standard_workflow};
pub use state::{ResearchState, StateField, StateUpdate};
pub use workflow::{ProgressReporter, SilentProgress, Stage, Workflow, WorkflowBuilder};
