///! Nightly batch scheduler
///!
///! Runs a batch over all configured accounts once a day at the configured
///! local time. The scheduler is constructed and shut down by the process
///! owner; nothing here is global.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::batch::{BatchRunner, BatchSummary};
use crate::config::{AccountConfig, SchedulerConfig};

const RETRY_PLANNING_AFTER: Duration = Duration::from_secs(3600);
/// How long a cancelled batch gets to close its browsers and sessions
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub struct NightlyScheduler {
    config: SchedulerConfig,
    accounts: Arc<Vec<AccountConfig>>,
    runner: Arc<BatchRunner>,
    cancel: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl NightlyScheduler {
    pub fn new(config: SchedulerConfig, accounts: Vec<AccountConfig>, runner: Arc<BatchRunner>) -> Self {
        Self {
            config,
            accounts: Arc::new(accounts),
            runner,
            cancel: CancellationToken::new(),
            task_handles: Vec::new(),
        }
    }

    /// Spawn the nightly loop, plus an immediate run when configured
    pub async fn start(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            "Starting nightly scheduler ({:02}:{:02} local, {} accounts, run on start: {})",
            self.config.hour,
            self.config.minute,
            self.accounts.len(),
            self.config.run_on_start
        );

        if self.accounts.is_empty() {
            tracing::warn!("No accounts configured, nightly runs will do nothing");
        }

        let runner = self.runner.clone();
        let accounts = self.accounts.clone();
        let cancel = self.cancel.clone();
        let (hour, minute) = (self.config.hour, self.config.minute);
        let run_on_start = self.config.run_on_start;

        let handle = tokio::spawn(async move {
            if run_on_start {
                tracing::info!("Performing initial batch run...");
                Self::run_batch(&runner, &accounts, &cancel).await;
            }
            Self::nightly_loop(runner, accounts, cancel, hour, minute).await;
        });
        self.task_handles.push(handle);

        Ok(())
    }

    async fn nightly_loop(
        runner: Arc<BatchRunner>,
        accounts: Arc<Vec<AccountConfig>>,
        cancel: CancellationToken,
        hour: u32,
        minute: u32,
    ) {
        while !cancel.is_cancelled() {
            let now = Local::now();
            let Some(next_run) = Self::calculate_next_run_time(&now, hour, minute) else {
                tracing::error!("Could not plan next run for {:02}:{:02}", hour, minute);
                tokio::time::sleep(RETRY_PLANNING_AFTER).await;
                continue;
            };
            let sleep_duration = (next_run - now)
                .to_std()
                .unwrap_or(Duration::from_secs(60));

            tracing::info!(
                "Next batch run at: {} (in {:.1} hours)",
                next_run.format("%Y-%m-%d %H:%M:%S"),
                sleep_duration.as_secs_f64() / 3600.0
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {}
                _ = cancel.cancelled() => break,
            }

            Self::run_batch(&runner, &accounts, &cancel).await;
        }
        tracing::debug!("Nightly loop stopped");
    }

    async fn run_batch(runner: &BatchRunner, accounts: &[AccountConfig], cancel: &CancellationToken) -> BatchSummary {
        let summary = runner.run_all(accounts, cancel).await;
        for result in summary.results.iter().filter(|r| !r.success) {
            tracing::warn!(
                "[{}] failed: {}",
                result.label,
                result.reason.as_deref().unwrap_or("unknown reason")
            );
        }
        summary
    }

    /// Next occurrence of `hour:minute` strictly after `now`, skipping days on
    /// which that local time does not exist
    fn calculate_next_run_time<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let mut date = now.date_naive();
        for _ in 0..3 {
            let candidate = date.and_hms_opt(hour, minute, 0)?;
            if let Some(at) = tz.from_local_datetime(&candidate).earliest() {
                if at > *now {
                    return Some(at);
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    /// Run a batch right away, outside the nightly schedule
    pub async fn trigger_now(&self) -> BatchSummary {
        tracing::info!("Batch run triggered manually");
        Self::run_batch(&self.runner, &self.accounts, &self.cancel).await
    }

    /// Cancel running batches and wait for them to wind down.
    ///
    /// A batch stops after its current match, then records its sessions.
    /// Only a batch that outlasts the grace period is aborted.
    pub async fn shutdown(self) {
        self.shutdown_within(SHUTDOWN_GRACE).await;
    }

    async fn shutdown_within(self, grace: Duration) {
        tracing::info!("Shutting down nightly scheduler...");
        self.cancel.cancel();

        for handle in self.task_handles {
            let abort = handle.abort_handle();
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Scheduler task failed: {}", e),
                Err(_) => {
                    tracing::warn!("Scheduler task still running after {}s, aborting", grace.as_secs());
                    abort.abort();
                }
            }
        }

        tracing::info!("Nightly scheduler stopped");
    }
}
