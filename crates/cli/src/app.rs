//! Wires config, the Kibana client and the maintenance tasks together.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use autopattern_core::{Catalog, Config};
use autopattern_inference::{AutoIndexPattern, RefreshIndexPattern};
use autopattern_kibana::KibanaClient;
use autopattern_scheduler::{relative_time, Scheduler, Task};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A task together with the schedule it runs on.
pub struct Job {
    pub spec: String,
    pub task: Arc<dyn Task>,
}

/// Every task enabled in `config`, bound to `catalog`.
pub fn build_jobs(config: &Config, catalog: Arc<dyn Catalog>) -> anyhow::Result<Vec<Job>> {
    let mut jobs = Vec::new();

    let auto = &config.auto_index_pattern;
    if auto.enabled {
        let task = AutoIndexPattern::from_config(auto, catalog.clone())
            .context("invalid auto_index_pattern.general_patterns")?;
        jobs.push(Job {
            spec: auto.schedule.clone(),
            task: Arc::new(task),
        });
    }

    let refresh = &config.refresh_index_pattern;
    if refresh.enabled {
        jobs.push(Job {
            spec: refresh.schedule.clone(),
            task: Arc::new(RefreshIndexPattern::from_config(refresh, catalog)),
        });
    }

    Ok(jobs)
}

/// Register every job on a fresh scheduler whose runs derive from `root`.
pub fn build_scheduler(jobs: Vec<Job>, root: &CancellationToken) -> anyhow::Result<Scheduler> {
    let mut scheduler = Scheduler::new(root.clone());
    for job in jobs {
        let name = job.task.name().to_string();
        scheduler
            .register(&job.spec, job.task)
            .with_context(|| format!("cannot schedule {name}"))?;
    }
    Ok(scheduler)
}

// ── Subcommands ──────────────────────────────────────────────────────

/// Run the scheduler until a shutdown signal arrives.
pub async fn run(config: Config, shutdown_timeout: Duration) -> anyhow::Result<()> {
    let root = CancellationToken::new();
    spawn_signal_listener(root.clone());

    let client = connect(&config, &root).await?;
    let jobs = build_jobs(&config, client)?;
    if jobs.is_empty() {
        warn!("No tasks enabled, nothing to do.");
        return Ok(());
    }

    let mut scheduler = build_scheduler(jobs, &root)?;
    scheduler.start()?;

    root.cancelled().await;
    info!("Shutting down...");

    let deadline = CancellationToken::new();
    let timer = deadline.clone();
    tokio::spawn(async move {
        tokio::time::sleep(shutdown_timeout).await;
        timer.cancel();
    });

    match scheduler.stop(&deadline).await {
        Ok(()) => info!("Goodbye!"),
        Err(e) => warn!(
            error = %e,
            timeout_secs = shutdown_timeout.as_secs(),
            "gave up waiting for running tasks"
        ),
    }
    Ok(())
}

/// Run every enabled task one time, in order.
pub async fn once(config: Config) -> anyhow::Result<()> {
    let root = CancellationToken::new();
    spawn_signal_listener(root.clone());

    let client = connect(&config, &root).await?;
    for job in build_jobs(&config, client)? {
        if root.is_cancelled() {
            break;
        }
        let name = job.task.name().to_string();
        info!("Running {name}...");
        let started = std::time::Instant::now();
        let report = job.task.run(root.child_token()).await;
        if report.cancelled {
            warn!("{name} was cancelled.");
        } else {
            info!(
                affected = report.affected,
                "Finished {name}. (took ≈ {}ms)",
                started.elapsed().as_millis()
            );
        }
    }
    Ok(())
}

/// Validate `config` offline and print when each enabled task would run next.
pub fn check(config: &Config) -> anyhow::Result<()> {
    let client: Arc<dyn Catalog> =
        Arc::new(KibanaClient::new(&config.kibana).context("invalid kibana settings")?);
    let jobs = build_jobs(config, client)?;
    if jobs.is_empty() {
        println!("No tasks enabled.");
        return Ok(());
    }

    let scheduler = build_scheduler(jobs, &CancellationToken::new())?;
    let now = Utc::now();
    for entry in scheduler.entries() {
        match entry.next_run {
            Some(at) => println!(
                "{:<32} {:<16} next run {} ({})",
                entry.name,
                entry.spec,
                at.format("%Y-%m-%d %H:%M:%S UTC"),
                relative_time(at, now)
            ),
            None => println!("{:<32} {:<16} never runs", entry.name, entry.spec),
        }
    }
    Ok(())
}

// ── Setup ────────────────────────────────────────────────────────────

/// Build the client, wait until Kibana answers, and report its version.
async fn connect(config: &Config, cancel: &CancellationToken) -> anyhow::Result<Arc<KibanaClient>> {
    let client = KibanaClient::new(&config.kibana).context("invalid kibana settings")?;
    info!(url = %client.base_url(), "Connecting to Kibana...");

    client
        .validate(
            config.kibana.connect_retries,
            Duration::from_secs(config.kibana.connect_retry_wait_secs),
            cancel,
        )
        .await
        .with_context(|| format!("cannot reach Kibana at {}", client.base_url()))?;

    match client.version().await {
        Ok(version) if version.is_supported() => info!(%version, "Connected to Kibana"),
        Ok(version) => warn!(
            %version,
            "Kibana {version} is older than 7.0, some API calls may fail"
        ),
        Err(e) => warn!(error = %e, "could not detect the Kibana version"),
    }

    if cancel.is_cancelled() {
        bail!("interrupted during startup");
    }
    Ok(Arc::new(client))
}

fn spawn_signal_listener(root: CancellationToken) {
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!(error = %e, "failed to listen for shutdown signals"),
        }
        root.cancel();
    });
}

/// Resolve on SIGINT, SIGTERM or SIGQUIT (Ctrl+C elsewhere).
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        _ = sigquit.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
