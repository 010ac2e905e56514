//! Integration tests for Briefdaemon
//!
//! These tests verify end-to-end behavior of the scheduler, pipeline, and
//! stores against a real document store in a temp directory, with the
//! network-facing providers mocked out.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use tempfile::TempDir;

use briefdaemon::config::PipelineConfig;
use briefdaemon::pipeline::PipelineRunner;
use briefdaemon::providers::{
    Analyzer, Dispatcher, ProviderError, TranscriptSource, VideoCandidate, VideoListing,
};
use briefdaemon::scheduler::SchedulerLoop;
use briefdaemon::store::{
    ActivityLog, IntervalUnit, LogLevel, ScheduleMode, ScheduleRequest, ScheduleStore,
};
use docstore::DocStore;

// =============================================================================
// Mock providers
// =============================================================================

struct FixedListing {
    videos: Vec<VideoCandidate>,
    calls: AtomicUsize,
}

impl FixedListing {
    fn new(videos: Vec<VideoCandidate>) -> Arc<Self> {
        Arc::new(Self {
            videos,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VideoListing for FixedListing {
    async fn list_videos(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<VideoCandidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.videos.clone())
    }
}

struct FixedTranscripts;

#[async_trait]
impl TranscriptSource for FixedTranscripts {
    async fn fetch_transcript(&self, video_id: &str) -> Result<String, ProviderError> {
        Ok(format!("transcript for {}", video_id))
    }
}

/// Analyzer that rate-limits a configurable number of leading calls
struct FlakyAnalyzer {
    name: &'static str,
    rate_limited_calls: usize,
    calls: AtomicUsize,
}

impl FlakyAnalyzer {
    fn new(name: &'static str, rate_limited_calls: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            rate_limited_calls,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Analyzer for FlakyAnalyzer {
    async fn analyze(&self, _text: &str) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.rate_limited_calls {
            return Err(ProviderError::RateLimited {
                retry_after: Duration::from_secs(1),
            });
        }
        Ok(format!("{} brief", self.name))
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[derive(Clone)]
struct SentMail {
    recipient: String,
    subject: String,
    body: String,
}

struct RecordingDispatcher {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingDispatcher {
    fn new() -> Arc<Self> {
        Arc::new(Self { sent: Mutex::new(Vec::new()) })
    }

    fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), ProviderError> {
        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

fn earnings_video(id: &str, title: &str) -> VideoCandidate {
    VideoCandidate {
        id: id.to_string(),
        title: title.to_string(),
        published_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
        url: format!("https://www.youtube.com/watch?v={}", id),
        duration_secs: Some(3900),
    }
}

fn fast_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        analysis_gap_secs: 0,
        dispatch_gap_secs: 0,
        backoff_step_secs: 0,
        ..Default::default()
    }
}

// =============================================================================
// Schedule persistence
// =============================================================================

#[test]
fn test_schedule_survives_store_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    {
        let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
        let schedule = ScheduleStore::open(store, "schedule").unwrap();
        schedule
            .replace(ScheduleRequest {
                mode: ScheduleMode::Daily,
                interval_value: 1,
                interval_unit: IntervalUnit::Hour,
                daily_time: "06:30".to_string(),
                recipient: "desk@example.com".to_string(),
            })
            .unwrap();
    }

    // A fresh process resolves the same document
    let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
    let schedule = ScheduleStore::open(store, "schedule").unwrap();
    let cfg = schedule.load();

    assert!(cfg.active);
    assert_eq!(cfg.mode, ScheduleMode::Daily);
    assert_eq!(cfg.daily_time, "06:30");
    assert_eq!(cfg.recipient, "desk@example.com");
    assert!(cfg.next_run.is_some());
}

#[test]
fn test_activity_log_survives_store_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    {
        let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
        let log = ActivityLog::open(store, "activity").unwrap();
        log.append(LogLevel::Info, "first");
        log.append(LogLevel::Ok, "second");
    }

    let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
    let log = ActivityLog::open(store, "activity").unwrap();
    let entries = log.read(10);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "first");
    assert_eq!(entries[1].message, "second");
}

// =============================================================================
// End-to-end scheduled run
// =============================================================================

#[tokio::test]
async fn test_due_schedule_runs_pipeline_and_delivers_briefs() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
    let schedule = ScheduleStore::open(store.clone(), "schedule").unwrap();
    let log = ActivityLog::open(store, "activity").unwrap();

    let listing = FixedListing::new(vec![
        earnings_video("v1", "Acme Q4 Earnings Call"),
        earnings_video("v2", "Cooking pasta at home"),
        earnings_video("v3", "Quarterly results discussion"),
    ]);
    let dispatcher = RecordingDispatcher::new();

    let runner = Arc::new(PipelineRunner::new(
        &fast_pipeline_config(),
        listing.clone(),
        Arc::new(FixedTranscripts),
        FlakyAnalyzer::new("primary", 0),
        None,
        dispatcher.clone(),
        log.clone(),
    ));
    let scheduler = SchedulerLoop::new(schedule.clone(), log.clone(), runner, Duration::from_secs(30));

    schedule
        .replace(ScheduleRequest {
            mode: ScheduleMode::Interval,
            interval_value: 1,
            interval_unit: IntervalUnit::Hour,
            daily_time: "08:00".to_string(),
            recipient: "desk@example.com".to_string(),
        })
        .unwrap();

    // Pull the wake time into the past so the next poll triggers
    let mut cfg = schedule.load();
    cfg.next_run = Some(Utc::now() - ChronoDuration::seconds(1));
    schedule.save(&cfg);

    scheduler.poll_once().await;

    // The two earnings-related titles were delivered, the other skipped
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.recipient == "desk@example.com"));
    assert!(sent[0].subject.contains("Acme Q4 Earnings Call"));
    assert!(sent[0].body.contains("primary brief"));
    assert!(sent[1].subject.contains("Quarterly results discussion"));

    // Schedule advanced and recorded the run
    let cfg = schedule.load();
    assert_eq!(cfg.run_count, 1);
    assert!(cfg.last_run.is_some());
    assert!(cfg.next_run.unwrap() > Utc::now());

    // The run left a visible trail in the activity log
    let entries = log.read(50);
    assert!(entries.iter().any(|e| e.level == LogLevel::Ok));
    assert!(entries.iter().any(|e| e.message.contains("Next run scheduled")));
}

#[tokio::test]
async fn test_restart_resumes_persisted_next_run() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    // First process: activate a schedule whose wake time is already due
    {
        let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
        let schedule = ScheduleStore::open(store, "schedule").unwrap();
        schedule
            .replace(ScheduleRequest {
                mode: ScheduleMode::Interval,
                interval_value: 1,
                interval_unit: IntervalUnit::Minute,
                daily_time: "08:00".to_string(),
                recipient: "desk@example.com".to_string(),
            })
            .unwrap();
        let mut cfg = schedule.load();
        cfg.next_run = Some(Utc::now() - ChronoDuration::minutes(5));
        schedule.save(&cfg);
    }

    // Second process: a freshly built scheduler catches up on the first poll
    let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
    let schedule = ScheduleStore::open(store.clone(), "schedule").unwrap();
    let log = ActivityLog::open(store, "activity").unwrap();

    let listing = FixedListing::new(vec![earnings_video("v1", "Q1 earnings")]);
    let dispatcher = RecordingDispatcher::new();
    let runner = Arc::new(PipelineRunner::new(
        &fast_pipeline_config(),
        listing.clone(),
        Arc::new(FixedTranscripts),
        FlakyAnalyzer::new("primary", 0),
        None,
        dispatcher.clone(),
        log.clone(),
    ));
    let scheduler = SchedulerLoop::new(schedule.clone(), log, runner, Duration::from_secs(30));

    scheduler.poll_once().await;

    assert_eq!(listing.calls.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.sent().len(), 1);
    assert_eq!(schedule.load().run_count, 1);
}

// =============================================================================
// Retry and fallback through the full pipeline
// =============================================================================

#[tokio::test]
async fn test_exhausted_primary_hands_off_to_fallback_provider() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
    let log = ActivityLog::open(store, "activity").unwrap();

    // Primary rate-limits every call; fallback succeeds
    let primary = FlakyAnalyzer::new("primary", usize::MAX);
    let fallback = FlakyAnalyzer::new("fallback", 0);
    let dispatcher = RecordingDispatcher::new();

    let runner = PipelineRunner::new(
        &fast_pipeline_config(),
        FixedListing::new(vec![earnings_video("v1", "Acme earnings call")]),
        Arc::new(FixedTranscripts),
        primary.clone(),
        Some(fallback.clone() as Arc<dyn Analyzer>),
        dispatcher.clone(),
        log,
    );

    let schedule = briefdaemon::store::ScheduleConfig {
        recipient: "desk@example.com".to_string(),
        ..Default::default()
    };
    let summary = runner.run(&schedule).await.unwrap();

    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    assert!(dispatcher.sent()[0].body.contains("fallback brief"));
}

#[tokio::test]
async fn test_rate_limit_recovery_stays_on_primary() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
    let log = ActivityLog::open(store, "activity").unwrap();

    // First two calls rate-limit, third succeeds
    let primary = FlakyAnalyzer::new("primary", 2);
    let fallback = FlakyAnalyzer::new("fallback", 0);
    let dispatcher = RecordingDispatcher::new();

    let runner = PipelineRunner::new(
        &fast_pipeline_config(),
        FixedListing::new(vec![earnings_video("v1", "Acme earnings call")]),
        Arc::new(FixedTranscripts),
        primary.clone(),
        Some(fallback.clone() as Arc<dyn Analyzer>),
        dispatcher.clone(),
        log,
    );

    let schedule = briefdaemon::store::ScheduleConfig {
        recipient: "desk@example.com".to_string(),
        ..Default::default()
    };
    let summary = runner.run(&schedule).await.unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    assert!(dispatcher.sent()[0].body.contains("primary brief"));
}
