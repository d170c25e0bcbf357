use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid schedule '{spec}': {reason}")]
    InvalidSchedule { spec: String, reason: String },

    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("scheduler is already running")]
    AlreadyStarted,

    #[error("stop cancelled while jobs were still running")]
    Cancelled,
}
