//! Core pipeline orchestration for GraphOps.
//!
//! Ties ingestion, workspace inspection, and external-tool invocations
//! into the end-to-end `run` workflow.

pub mod pipeline;

pub use pipeline::{
    PhaseOutcome, PipelineConfig, PipelineResult, ProgressReporter, SilentProgress, run_pipeline,
};
