//! Scheduler loop implementation
//!
//! A single long-lived polling task over the persisted schedule. Each tick
//! loads the schedule, checks due-ness, and when due runs the pipeline to
//! completion before recomputing and persisting the next wake time. At most
//! one run is ever in flight by construction: the loop awaits the run
//! before it can tick again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::pipeline::PipelineRunner;
use crate::store::{ActivityLog, LogLevel, ScheduleStore, compute_next_run};

/// The scheduler loop
pub struct SchedulerLoop {
    schedule: ScheduleStore,
    log: ActivityLog,
    runner: Arc<PipelineRunner>,
    tick: Duration,
}

impl SchedulerLoop {
    pub fn new(schedule: ScheduleStore, log: ActivityLog, runner: Arc<PipelineRunner>, tick: Duration) -> Self {
        Self {
            schedule,
            log,
            runner,
            tick,
        }
    }

    /// Run until a shutdown signal arrives
    ///
    /// Started once during process initialization and never restarted. An
    /// in-progress pipeline run always completes before the next tick or
    /// the shutdown check.
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(tick = ?self.tick, "scheduler loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("scheduler loop stopping");
                    break;
                }
                _ = tokio::time::sleep(self.tick) => {
                    self.poll_once().await;
                }
            }
        }
    }

    /// One poll tick: check due-ness and run the pipeline when due
    ///
    /// Nothing here propagates an error; a failed run or a failed save
    /// degrades to "try again next tick".
    pub async fn poll_once(&self) {
        let cfg = self.schedule.load();
        if !cfg.active {
            debug!("poll_once: schedule inactive, idling");
            return;
        }
        let Some(next_run) = cfg.next_run else {
            debug!("poll_once: active schedule has no next run, idling");
            return;
        };

        let run_started = Utc::now();
        if run_started < next_run {
            debug!(%next_run, "poll_once: not due yet");
            return;
        }

        info!(%next_run, "schedule due, starting pipeline run");
        let outcome = self.runner.run(&cfg).await;
        match &outcome {
            Ok(summary) => info!(?summary, "pipeline run completed"),
            Err(e) => warn!(error = %e, "pipeline run aborted at stage level"),
        }

        // Recompute regardless of outcome so the schedule self-heals
        // instead of stalling on a bad run.
        let Some(next) = compute_next_run(&cfg, run_started) else {
            warn!("schedule produced no next run, deactivating");
            let mut latest = self.schedule.load();
            latest.active = false;
            latest.next_run = None;
            self.schedule.save(&latest);
            return;
        };

        // Reload before saving: a deactivation that landed while the run
        // was in flight must not be resurrected by this update.
        let mut latest = self.schedule.load();
        if outcome.is_ok() {
            latest.run_count += 1;
        }
        latest.last_run = Some(run_started);
        latest.next_run = Some(next);
        self.schedule.save(&latest);

        self.log.append(
            LogLevel::Info,
            format!("Next run scheduled for {}", next.format("%Y-%m-%d %H:%M:%S UTC")),
        );
    }
}
