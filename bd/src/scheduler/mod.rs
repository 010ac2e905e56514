//! Scheduler loop

mod core;

pub use core::SchedulerLoop;
