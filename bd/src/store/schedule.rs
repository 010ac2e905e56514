//! Persisted recurring-schedule definition and next-run computation
//!
//! The schedule lives in a single document in the store. Reads absorb store
//! failures (the scheduler loop must keep ticking when the store is briefly
//! down), and writes are best-effort: a failed save means the next tick
//! retries with stale state.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docstore::DocStore;

/// How the next run is derived from the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    Interval,
    Daily,
}

/// Unit for interval-mode schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minute,
    Hour,
}

/// The recurring-job definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Whether the loop should trigger runs
    pub active: bool,

    /// Scheduling mode
    pub mode: ScheduleMode,

    /// Interval length, meaningful only when `mode = interval`
    pub interval_value: u32,

    /// Interval unit, meaningful only when `mode = interval`
    pub interval_unit: IntervalUnit,

    /// Wall-clock HH:MM in UTC, meaningful only when `mode = daily`
    pub daily_time: String,

    /// Destination for dispatched briefs
    pub recipient: String,

    /// Completed runs since creation
    pub run_count: u64,

    pub created_at: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,

    /// Authoritative wake time while active
    pub next_run: Option<DateTime<Utc>>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            active: false,
            mode: ScheduleMode::Interval,
            interval_value: 1,
            interval_unit: IntervalUnit::Hour,
            daily_time: "08:00".to_string(),
            recipient: String::new(),
            run_count: 0,
            created_at: None,
            last_run: None,
            next_run: None,
        }
    }
}

/// Incoming schedule replacement, as accepted at the boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub mode: ScheduleMode,
    #[serde(default = "default_interval_value")]
    pub interval_value: u32,
    #[serde(default = "default_interval_unit")]
    pub interval_unit: IntervalUnit,
    #[serde(default = "default_daily_time")]
    pub daily_time: String,
    pub recipient: String,
}

fn default_interval_value() -> u32 {
    1
}

fn default_interval_unit() -> IntervalUnit {
    IntervalUnit::Hour
}

fn default_daily_time() -> String {
    "08:00".to_string()
}

/// Compute the next wake time for a schedule
///
/// Interval mode adds the configured span to `now`. Daily mode picks today's
/// `daily_time` (UTC) when it is still strictly in the future, otherwise the
/// same time tomorrow. Returns `None` when the schedule cannot produce a next
/// run (unparsable daily time), which callers must treat as "do not
/// reschedule".
pub fn compute_next_run(cfg: &ScheduleConfig, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match cfg.mode {
        ScheduleMode::Interval => {
            let span = match cfg.interval_unit {
                IntervalUnit::Minute => Duration::minutes(cfg.interval_value as i64),
                IntervalUnit::Hour => Duration::hours(cfg.interval_value as i64),
            };
            Some(now + span)
        }
        ScheduleMode::Daily => {
            let time = match NaiveTime::parse_from_str(&cfg.daily_time, "%H:%M") {
                Ok(t) => t,
                Err(e) => {
                    warn!(daily_time = %cfg.daily_time, error = %e, "Unparsable daily time, not rescheduling");
                    return None;
                }
            };
            let today = now.date_naive().and_time(time).and_utc();
            if today > now {
                Some(today)
            } else {
                Some(today + Duration::days(1))
            }
        }
    }
}

/// Handle to the persisted schedule document
#[derive(Clone)]
pub struct ScheduleStore {
    store: Arc<DocStore>,
    doc_id: String,
}

impl ScheduleStore {
    /// Resolve the schedule document, lazily creating the inactive default
    /// when absent
    pub fn open(store: Arc<DocStore>, doc_name: &str) -> Result<Self> {
        let initial = serde_json::to_value(ScheduleConfig::default())?;
        let doc_id = store.create(doc_name, &initial)?;
        debug!(%doc_id, "Schedule store resolved");
        Ok(Self { store, doc_id })
    }

    /// Load the persisted schedule
    ///
    /// Store failures are absorbed: an unreachable or malformed document
    /// yields the inactive default so the caller keeps running.
    pub fn load(&self) -> ScheduleConfig {
        let doc = match self.store.get(&self.doc_id) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(doc_id = %self.doc_id, error = %e, "Failed to load schedule, using inactive default");
                return ScheduleConfig::default();
            }
        };
        match serde_json::from_value(doc) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(doc_id = %self.doc_id, error = %e, "Malformed schedule document, using inactive default");
                ScheduleConfig::default()
            }
        }
    }

    /// Best-effort overwrite of the schedule document
    pub fn save(&self, cfg: &ScheduleConfig) {
        let doc = match serde_json::to_value(cfg) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Failed to serialize schedule, skipping save");
                return;
            }
        };
        if let Err(e) = self.store.put(&self.doc_id, &doc) {
            warn!(doc_id = %self.doc_id, error = %e, "Failed to save schedule, will retry with stale state");
        }
    }

    /// Replace the schedule wholesale (boundary surface)
    ///
    /// Validates the request, stamps `created_at`, and computes the initial
    /// `next_run`. The replacement is active immediately.
    pub fn replace(&self, request: ScheduleRequest) -> Result<ScheduleConfig> {
        if request.recipient.trim().is_empty() {
            return Err(eyre::eyre!("recipient is required"));
        }
        if request.mode == ScheduleMode::Interval && request.interval_value < 1 {
            return Err(eyre::eyre!("interval-value must be at least 1"));
        }
        if request.mode == ScheduleMode::Daily
            && NaiveTime::parse_from_str(&request.daily_time, "%H:%M").is_err()
        {
            return Err(eyre::eyre!("daily-time must be HH:MM (UTC)"));
        }

        let now = Utc::now();
        let mut cfg = ScheduleConfig {
            active: true,
            mode: request.mode,
            interval_value: request.interval_value,
            interval_unit: request.interval_unit,
            daily_time: request.daily_time,
            recipient: request.recipient.trim().to_string(),
            run_count: 0,
            created_at: Some(now),
            last_run: None,
            next_run: None,
        };
        cfg.next_run = compute_next_run(&cfg, now);
        if cfg.next_run.is_none() {
            return Err(eyre::eyre!("schedule produces no next run"));
        }

        self.save(&cfg);
        debug!(?cfg.next_run, "Schedule replaced");
        Ok(cfg)
    }

    /// Deactivate the schedule, leaving the other fields for inspection
    pub fn cancel(&self) -> ScheduleConfig {
        let mut cfg = self.load();
        cfg.active = false;
        self.save(&cfg);
        debug!("Schedule cancelled");
        cfg
    }
}
