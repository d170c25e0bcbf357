//! Recurring task runner.
//!
//! Tasks implement [`Task`] and are bound to a cron expression with
//! [`Scheduler::register`]. Every entry fires on its own timer; an entry never
//! overlaps itself, distinct entries run concurrently.

pub mod error;
pub mod schedule;
pub mod scheduler;
pub mod task;

pub use schedule::{normalize_cron, parse_duration, Schedule};
pub use error::SchedulerError;
pub use scheduler::{relative_time, EntryInfo, Scheduler, SchedulerState};
pub use task::{Task, TaskReport, TaskState};
