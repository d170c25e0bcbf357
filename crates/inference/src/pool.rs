use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Run one future per item with at most `concurrency` in flight, then wait for
/// all of them.
///
/// Submission blocks while every slot is busy. Once `cancel` fires no new item
/// is started and in-flight futures are dropped; only the outputs of futures
/// that completed are returned.
pub(crate) async fn run_bounded<I, F, T>(
    items: I,
    concurrency: usize,
    cancel: &CancellationToken,
    mut make: impl FnMut(I::Item) -> F,
) -> Vec<T>
where
    I: IntoIterator,
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut branches = JoinSet::new();

    for item in items {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let branch = make(item);
        let cancel = cancel.clone();
        branches.spawn(async move {
            let _permit = permit;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                out = branch => Some(out),
            }
        });
    }

    let mut outputs = Vec::new();
    while let Some(joined) = branches.join_next().await {
        match joined {
            Ok(Some(out)) => outputs.push(out),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "worker branch panicked"),
        }
    }
    outputs
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let outputs = run_bounded(0..20, 3, &cancel, |i| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                i
            }
        })
        .await;

        assert_eq!(outputs.len(), 20);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_new_work() {
        let started = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outputs = run_bounded(0..100, 2, &cancel, |_| {
            let started = started.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        })
        .await;

        assert!(outputs.is_empty());
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }
}
