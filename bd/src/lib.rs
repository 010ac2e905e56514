//! Briefdaemon - Scheduled Earnings Brief Pipeline
//!
//! Briefdaemon watches a channel's uploads on a recurring schedule, filters
//! for earnings-related videos, analyzes their transcripts with an AI
//! provider, and emails the resulting briefs. The schedule and activity log
//! persist across restarts in a document store.
//!
//! # Core Concepts
//!
//! - **Durable Schedule**: The recurring job definition lives in a store
//!   document; restarts resume from the persisted `next_run`
//! - **Single Loop, Single Run**: One polling task awaits each pipeline run
//!   to completion, so overlapping runs cannot happen
//! - **Fault-Tolerant Pipeline**: Per-item failures skip and log; only a
//!   discovery failure aborts a run
//! - **Retry Then Fallback**: Rate-limited analysis retries with linear
//!   backoff before switching provider exactly once
//!
//! # Modules
//!
//! - [`store`] - Persisted schedule and bounded activity log
//! - [`providers`] - Video listing, transcripts, AI analysis, email dispatch
//! - [`pipeline`] - The five-stage run executor and retry policy
//! - [`scheduler`] - The polling loop that triggers due runs
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod daemon;
pub mod pipeline;
pub mod providers;
pub mod scheduler;
pub mod store;

// Re-export commonly used types
pub use config::{Config, LlmConfig, PipelineConfig, SchedulerConfig};
pub use pipeline::{PipelineRunner, RetryPolicy, RunSummary, analyze_with_fallback};
pub use providers::{
    Analyzer, AnthropicAnalyzer, Dispatcher, EmailDispatcher, OpenAiAnalyzer, ProviderError, TranscriptClient,
    TranscriptSource, VideoCandidate, VideoListing, YoutubeListing,
};
pub use scheduler::SchedulerLoop;
pub use store::{
    ActivityLog, IntervalUnit, LogEntry, LogLevel, ScheduleConfig, ScheduleMode, ScheduleRequest, ScheduleStore,
    compute_next_run,
};
