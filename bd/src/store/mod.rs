//! Persistent state on top of the document store
//!
//! Two independent documents, each with a single logical writer in this
//! process: the recurring-schedule definition and the bounded activity log.

mod activity;
mod schedule;

pub use activity::{ActivityLog, LogEntry, LogLevel, MAX_LOG_ENTRIES};
pub use schedule::{
    IntervalUnit, ScheduleConfig, ScheduleMode, ScheduleRequest, ScheduleStore, compute_next_run,
};
