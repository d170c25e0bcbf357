//! Timer-driven runner for registered [`Task`]s.
//!
//! Each entry gets its own loop: compute the next fire time, sleep until then,
//! run the task to completion, repeat. Stopping the scheduler ends the loops at
//! their next sleep; a loop that is inside a run finishes the run first.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SchedulerError;
use crate::schedule::Schedule;
use crate::task::{Task, TaskReport, TaskState};

/// How long `stop` waits silently before announcing it is still waiting.
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Process-level scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Started,
    Stopping,
}

/// Snapshot of a registered entry.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub spec: String,
    pub state: TaskState,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}

// ── Entries ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct EntryStatus {
    state: TaskState,
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
}

struct Entry {
    name: String,
    spec: String,
    schedule: Schedule,
    task: Arc<dyn Task>,
    status: Mutex<EntryStatus>,
}

impl Entry {
    fn status(&self) -> MutexGuard<'_, EntryStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn info(&self) -> EntryInfo {
        let status = self.status();
        EntryInfo {
            name: self.name.clone(),
            spec: self.spec.clone(),
            state: status.state,
            next_run: status.next_run,
            last_run: status.last_run,
        }
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

/// Cron scheduler for [`Task`]s.
///
/// Every run receives a child of the `run_token` given at construction;
/// cancelling that token asks in-flight runs to wind down.
pub struct Scheduler {
    entries: Vec<Arc<Entry>>,
    state: SchedulerState,
    run_token: CancellationToken,
    stop_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(run_token: CancellationToken) -> Self {
        Self {
            entries: Vec::new(),
            state: SchedulerState::Stopped,
            run_token,
            stop_token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Bind `task` to `spec`. A malformed spec is rejected and the task is
    /// never scheduled.
    pub fn register(&mut self, spec: &str, task: Arc<dyn Task>) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Stopped {
            return Err(SchedulerError::AlreadyStarted);
        }
        let name = task.name().to_string();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(SchedulerError::DuplicateTask(name));
        }

        let schedule = Schedule::parse(spec)?;
        let next_run = schedule.next_after(Utc::now());

        self.entries.push(Arc::new(Entry {
            name: name.clone(),
            spec: spec.trim().to_string(),
            schedule,
            task,
            status: Mutex::new(EntryStatus {
                state: TaskState::Idle,
                next_run,
                last_run: None,
            }),
        }));
        info!(task = %name, schedule = %spec.trim(), "Registered {name}");
        Ok(())
    }

    /// Spawn one timer loop per entry. Must be called inside a Tokio runtime.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Stopped {
            return Err(SchedulerError::AlreadyStarted);
        }
        info!(entries = self.entries.len(), "Starting Scheduler...");

        self.stop_token = CancellationToken::new();
        for entry in &self.entries {
            let entry = entry.clone();
            let stop = self.stop_token.clone();
            let run_token = self.run_token.clone();
            self.handles
                .push(tokio::spawn(run_entry(entry, stop, run_token)));
        }
        self.state = SchedulerState::Started;
        Ok(())
    }

    /// Stop firing and wait for in-flight runs.
    ///
    /// After a short grace period a notice is logged and the wait continues
    /// until every run has finished. Only `cancel` cuts the wait short.
    pub async fn stop(&mut self, cancel: &CancellationToken) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Started {
            return Ok(());
        }
        self.state = SchedulerState::Stopping;
        self.stop_token.cancel();

        let all = futures::future::join_all(std::mem::take(&mut self.handles));
        tokio::pin!(all);

        let first = tokio::select! {
            done = tokio::time::timeout(STOP_GRACE, &mut all) => done.ok(),
            _ = cancel.cancelled() => None,
        };
        let results = match first {
            Some(results) => results,
            None if cancel.is_cancelled() => return self.abandon(),
            None => {
                info!(running = self.running().len(), "Waiting for running jobs to finish...");
                tokio::select! {
                    results = &mut all => results,
                    _ = cancel.cancelled() => return self.abandon(),
                }
            }
        };

        for result in results {
            if let Err(e) = result {
                warn!(error = %e, "scheduler loop ended abnormally");
            }
        }
        self.state = SchedulerState::Stopped;
        info!("Scheduler stopped");
        Ok(())
    }

    fn abandon(&mut self) -> Result<(), SchedulerError> {
        warn!(running = ?self.running(), "stop cancelled, leaving running jobs behind");
        self.state = SchedulerState::Stopped;
        Err(SchedulerError::Cancelled)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Next fire time of the named entry.
    pub fn next_run(&self, name: &str) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.status().next_run)
    }

    pub fn entries(&self) -> Vec<EntryInfo> {
        self.entries.iter().map(|e| e.info()).collect()
    }

    /// Names of entries currently inside a run.
    pub fn running(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.status().state == TaskState::Running)
            .map(|e| e.name.clone())
            .collect()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_token.cancel();
    }
}

// ── Entry loop ───────────────────────────────────────────────────────

async fn run_entry(entry: Arc<Entry>, stop: CancellationToken, run_token: CancellationToken) {
    loop {
        let now = Utc::now();
        let Some(next) = entry.schedule.next_after(now) else {
            info!(task = %entry.name, "No further runs scheduled for {}", entry.name);
            entry.status().next_run = None;
            return;
        };
        entry.status().next_run = Some(next);
        info!(
            task = %entry.name,
            next_run = %next.to_rfc3339(),
            "Next {} run at {} ({})",
            entry.name,
            next.format("%Y-%m-%d %H:%M:%S UTC"),
            relative_time(next, now)
        );

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        fire(&entry, run_token.child_token()).await;
    }
}

async fn fire(entry: &Entry, token: CancellationToken) {
    {
        let mut status = entry.status();
        status.state = TaskState::Running;
        status.last_run = Some(Utc::now());
    }
    info!(task = %entry.name, "Running {}...", entry.name);
    let started = Instant::now();

    let task = entry.task.clone();
    let outcome = tokio::spawn(async move { task.run(token).await }).await;
    let took_ms = started.elapsed().as_millis();

    entry.status().state = TaskState::Idle;
    match outcome {
        Ok(TaskReport {
            cancelled: true, ..
        }) => {
            info!(task = %entry.name, took_ms, "{} cancelled. (took ≈ {took_ms}ms)", entry.name);
        }
        Ok(report) => {
            info!(
                task = %entry.name,
                affected = report.affected,
                took_ms,
                "Finished {}. (took ≈ {took_ms}ms)",
                entry.name
            );
        }
        Err(e) => {
            warn!(task = %entry.name, error = %e, "{} panicked", entry.name);
        }
    }
}

/// Render `at` relative to `now`, e.g. "in 4 minutes".
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (at - now).num_seconds();
    if secs <= 0 {
        return "now".to_string();
    }
    let (amount, unit) = match secs {
        s if s < 60 => (s, "second"),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s => (s / 86_400, "day"),
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("in {amount} {unit}{plural}")
}

#[cfg(test)]
mod tests;
