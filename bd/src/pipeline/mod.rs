//! Pipeline executor
//!
//! Runs one end-to-end job: discover candidate videos, filter by topic,
//! fetch and analyze transcripts, dispatch briefs. Tolerates per-item
//! failure; only a whole-stage discovery failure aborts a run.

mod analysis;
mod runner;

pub use analysis::{RetryPolicy, analyze_with_fallback};
pub use runner::{PipelineRunner, RunSummary};
