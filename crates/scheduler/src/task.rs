use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A unit of recurring work.
///
/// `run` receives a token that is cancelled when the host shuts down.
/// Implementations should return promptly once it fires and report the run
/// as cancelled rather than failed.
#[async_trait]
pub trait Task: Send + Sync {
    /// Name used in logs and for lookups; unique per scheduler.
    fn name(&self) -> &str;

    async fn run(&self, cancel: CancellationToken) -> TaskReport;
}

/// Outcome of a single run, used for the finish log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskReport {
    /// Objects created or updated by the run.
    pub affected: usize,
    pub cancelled: bool,
}

impl TaskReport {
    pub fn completed(affected: usize) -> Self {
        Self {
            affected,
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            affected: 0,
            cancelled: true,
        }
    }
}

/// Per-entry run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
}
