use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::*;

/// Counts runs; each run holds for `hold` unless cancelled.
struct Counting {
    name: String,
    hold: Duration,
    ignore_cancel: bool,
    started: AtomicUsize,
    finished: AtomicUsize,
    cancelled: AtomicUsize,
}

impl Counting {
    fn new(name: &str, hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            hold,
            ignore_cancel: false,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        })
    }

    fn stubborn(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            hold: Duration::from_secs(3_600),
            ignore_cancel: true,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        })
    }

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for Counting {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, cancel: CancellationToken) -> TaskReport {
        self.started.fetch_add(1, Ordering::SeqCst);
        if self.ignore_cancel {
            std::future::pending::<()>().await;
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return TaskReport::cancelled();
            }
            _ = tokio::time::sleep(self.hold) => {}
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        TaskReport::completed(1)
    }
}

async fn wait_for_start(task: &Counting) {
    while task.started() == 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[test]
fn invalid_spec_is_rejected_and_never_scheduled() {
    let mut scheduler = Scheduler::new(CancellationToken::new());
    let task = Counting::new("broken", Duration::ZERO);

    let err = scheduler.register("not-a-cron", task).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
    assert!(scheduler.entries().is_empty());
    assert!(scheduler.next_run("broken").is_none());
}

#[test]
fn every_minute_reports_next_run_within_a_minute() {
    let mut scheduler = Scheduler::new(CancellationToken::new());
    let before = Utc::now();
    scheduler
        .register("* * * * *", Counting::new("minutely", Duration::ZERO))
        .unwrap();

    let next = scheduler.next_run("minutely").expect("next run should be known");
    assert!(next > before);
    assert!(next <= Utc::now() + chrono::Duration::seconds(60));

    let entries = scheduler.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].spec, "* * * * *");
    assert_eq!(entries[0].state, TaskState::Idle);
    assert!(entries[0].last_run.is_none());
}

#[test]
fn duplicate_names_are_rejected() {
    let mut scheduler = Scheduler::new(CancellationToken::new());
    scheduler
        .register("@hourly", Counting::new("same", Duration::ZERO))
        .unwrap();
    let err = scheduler
        .register("@daily", Counting::new("same", Duration::ZERO))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateTask(name) if name == "same"));
}

#[tokio::test(start_paused = true)]
async fn register_after_start_is_rejected() {
    let mut scheduler = Scheduler::new(CancellationToken::new());
    scheduler.start().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Started);
    assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyStarted)));

    let err = scheduler
        .register("@hourly", Counting::new("late", Duration::ZERO))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::AlreadyStarted));

    scheduler.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn entries_fire_repeatedly() {
    let task = Counting::new("ticker", Duration::ZERO);
    let mut scheduler = Scheduler::new(CancellationToken::new());
    scheduler.register("@every 1s", task.clone()).unwrap();
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    scheduler.stop(&CancellationToken::new()).await.unwrap();

    assert!(task.started() >= 3, "ran {} times", task.started());
    assert_eq!(task.finished.load(Ordering::SeqCst), task.started());
}

#[tokio::test(start_paused = true)]
async fn distinct_entries_run_concurrently() {
    let slow = Counting::new("slow", Duration::from_secs(30));
    let fast = Counting::new("fast", Duration::ZERO);
    let mut scheduler = Scheduler::new(CancellationToken::new());
    scheduler.register("@every 1s", slow.clone()).unwrap();
    scheduler.register("@every 1s", fast.clone()).unwrap();
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(slow.started(), 1, "an entry never overlaps itself");
    assert!(fast.started() >= 3);
    assert_eq!(scheduler.running(), vec!["slow".to_string()]);

    scheduler.stop(&CancellationToken::new()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_running_jobs() {
    let task = Counting::new("long", Duration::from_secs(2));
    let mut scheduler = Scheduler::new(CancellationToken::new());
    scheduler.register("@every 1s", task.clone()).unwrap();
    scheduler.start().unwrap();

    wait_for_start(&task).await;
    scheduler.stop(&CancellationToken::new()).await.unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(task.finished.load(Ordering::SeqCst), task.started());
    assert_eq!(task.cancelled.load(Ordering::SeqCst), 0);
    assert!(scheduler.running().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_returns_early_when_caller_cancels() {
    let task = Counting::stubborn("stuck");
    let mut scheduler = Scheduler::new(CancellationToken::new());
    scheduler.register("@every 1s", task.clone()).unwrap();
    scheduler.start().unwrap();
    wait_for_start(&task).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let err = scheduler.stop(&cancel).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Cancelled));
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn run_token_reaches_running_tasks() {
    let root = CancellationToken::new();
    let task = Counting::new("cancellable", Duration::from_secs(3_600));
    let mut scheduler = Scheduler::new(root.clone());
    scheduler.register("@every 1s", task.clone()).unwrap();
    scheduler.start().unwrap();
    wait_for_start(&task).await;

    root.cancel();
    scheduler.stop(&CancellationToken::new()).await.unwrap();

    assert_eq!(task.cancelled.load(Ordering::SeqCst), 1);
    assert_eq!(task.finished.load(Ordering::SeqCst), 0);
}

#[test]
fn relative_time_formatting() {
    let now = Utc::now();
    let at = |secs| now + chrono::Duration::seconds(secs);
    assert_eq!(relative_time(at(-5), now), "now");
    assert_eq!(relative_time(at(1), now), "in 1 second");
    assert_eq!(relative_time(at(45), now), "in 45 seconds");
    assert_eq!(relative_time(at(300), now), "in 5 minutes");
    assert_eq!(relative_time(at(3_600), now), "in 1 hour");
    assert_eq!(relative_time(at(3 * 86_400), now), "in 3 days");
}
