//! One end-to-end pipeline run

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::providers::{
    AnalysisResult, Analyzer, Dispatcher, ProviderError, TranscriptSource, VideoListing,
    brief_subject, render_brief,
};
use crate::store::{ActivityLog, LogLevel, ScheduleConfig};

use super::analysis::{RetryPolicy, analyze_with_fallback};

/// Aggregate counts for one completed run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    /// Candidates returned by the listing stage
    pub discovered: usize,
    /// Candidates passing the topic filter
    pub matched: usize,
    /// Items with a non-empty transcript
    pub transcribed: usize,
    /// Items with a non-empty analysis
    pub analyzed: usize,
    /// Briefs accepted by the dispatcher
    pub sent: usize,
}

/// Executes one full run against the injected collaborators
pub struct PipelineRunner {
    listing: Arc<dyn VideoListing>,
    transcripts: Arc<dyn TranscriptSource>,
    primary: Arc<dyn Analyzer>,
    fallback: Option<Arc<dyn Analyzer>>,
    dispatcher: Arc<dyn Dispatcher>,
    log: ActivityLog,
    keywords: Vec<String>,
    strict_phrase: Option<String>,
    max_transcript_chars: usize,
    analysis_gap: Duration,
    dispatch_gap: Duration,
    retry: RetryPolicy,
}

impl PipelineRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &PipelineConfig,
        listing: Arc<dyn VideoListing>,
        transcripts: Arc<dyn TranscriptSource>,
        primary: Arc<dyn Analyzer>,
        fallback: Option<Arc<dyn Analyzer>>,
        dispatcher: Arc<dyn Dispatcher>,
        log: ActivityLog,
    ) -> Self {
        Self {
            listing,
            transcripts,
            primary,
            fallback,
            dispatcher,
            log,
            keywords: config.keywords.iter().map(|k| k.to_lowercase()).collect(),
            strict_phrase: config.strict_phrase.as_ref().map(|p| p.to_lowercase()),
            max_transcript_chars: config.max_transcript_chars,
            analysis_gap: Duration::from_secs(config.analysis_gap_secs),
            dispatch_gap: Duration::from_secs(config.dispatch_gap_secs),
            retry: RetryPolicy {
                max_attempts: config.max_analysis_attempts,
                backoff_step: Duration::from_secs(config.backoff_step_secs),
            },
        }
    }

    /// Topic-relevance predicate over a candidate title
    ///
    /// A configured strict phrase wins over the keyword set.
    fn is_relevant(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        match &self.strict_phrase {
            Some(phrase) => title.contains(phrase.as_str()),
            None => self.keywords.iter().any(|k| title.contains(k.as_str())),
        }
    }

    /// Execute one full run for the given schedule
    ///
    /// Per-item failures are logged and skipped. The only error returned is
    /// a whole-stage discovery failure; everything past discovery always
    /// reaches the summary.
    pub async fn run(&self, schedule: &ScheduleConfig) -> Result<RunSummary, ProviderError> {
        let run_id = Uuid::now_v7();
        let started = Utc::now();
        let window_start = started - chrono::Duration::days(1);
        let mut summary = RunSummary::default();

        info!(%run_id, recipient = %schedule.recipient, "pipeline run starting");
        self.log.append(LogLevel::Info, format!("Run {run_id}: discovering videos from the last 24h"));

        // Stage 1: discover
        let candidates = match self.listing.list_videos(window_start, started).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.log.append(LogLevel::Err, format!("Run {run_id}: discovery failed: {e}"));
                return Err(e);
            }
        };
        summary.discovered = candidates.len();

        // Stage 2: filter; non-matches are counted, not logged per item
        let matched: Vec<_> = candidates.into_iter().filter(|c| self.is_relevant(&c.title)).collect();
        summary.matched = matched.len();
        self.log.append(
            LogLevel::Info,
            format!(
                "Run {run_id}: {} of {} candidates matched the topic filter",
                summary.matched, summary.discovered
            ),
        );

        // Stage 3: sequential fetch + analyze, paced for the provider ceiling
        let mut results: Vec<AnalysisResult> = Vec::with_capacity(matched.len());
        for (index, candidate) in matched.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.analysis_gap).await;
            }

            let transcript = match self.transcripts.fetch_transcript(&candidate.id).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(video = %candidate.id, error = %e, "transcript fetch failed, skipping item");
                    self.log.append(
                        LogLevel::Err,
                        format!("Transcript fetch failed for '{}': {e}", candidate.title),
                    );
                    results.push(AnalysisResult {
                        candidate,
                        transcript_present: false,
                        analysis_text: None,
                    });
                    continue;
                }
            };

            if transcript.is_empty() {
                self.log.append(
                    LogLevel::Err,
                    format!("No transcript available for '{}'", candidate.title),
                );
                results.push(AnalysisResult {
                    candidate,
                    transcript_present: false,
                    analysis_text: None,
                });
                continue;
            }
            summary.transcribed += 1;

            let truncated = truncate_chars(&transcript, self.max_transcript_chars);
            let analysis =
                match analyze_with_fallback(&self.primary, self.fallback.as_ref(), &truncated, &self.retry).await {
                    Ok(text) => {
                        summary.analyzed += 1;
                        self.log.append(LogLevel::Ai, format!("Analyzed '{}'", candidate.title));
                        Some(text)
                    }
                    Err(e) => {
                        self.log.append(
                            LogLevel::Err,
                            format!("Analysis failed for '{}': {e}", candidate.title),
                        );
                        None
                    }
                };

            results.push(AnalysisResult {
                candidate,
                transcript_present: true,
                analysis_text: analysis,
            });
        }

        // Stage 4: dispatch in analysis order, paced for the relay ceiling
        let mut first_dispatch = true;
        for result in results.iter().filter(|r| r.analysis_text.is_some()) {
            if !first_dispatch {
                tokio::time::sleep(self.dispatch_gap).await;
            }
            first_dispatch = false;

            let subject = brief_subject(result);
            let body = render_brief(result);
            match self.dispatcher.send(&schedule.recipient, &subject, &body).await {
                Ok(()) => {
                    summary.sent += 1;
                    self.log.append(
                        LogLevel::Ok,
                        format!("Sent brief for '{}' to {}", result.candidate.title, schedule.recipient),
                    );
                }
                Err(e) => {
                    warn!(video = %result.candidate.id, error = %e, "dispatch failed, continuing");
                    self.log.append(
                        LogLevel::Err,
                        format!("Dispatch failed for '{}': {e}", result.candidate.title),
                    );
                }
            }
        }

        // Stage 5: summarize; the run always ends in a logged terminal state
        self.log.append(
            LogLevel::Ok,
            format!(
                "Run {run_id} complete: discovered={} matched={} transcribed={} analyzed={} sent={}",
                summary.discovered, summary.matched, summary.transcribed, summary.analyzed, summary.sent
            ),
        );
        debug!(%run_id, ?summary, "pipeline run finished");
        Ok(summary)
    }
}

/// Truncate on a character boundary
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
