///! Batch runs over configured accounts
///!
///! Each account gets its own output session and its own browser process on a
///! blocking thread. The gate decides how many of those run at once.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use spesen_common::{Credentials, ScrapeProgress};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::gate::ScrapeGate;
use super::session_store::{MetadataUpdate, OutputSession, SessionStatus, SessionStore, MATCHES_FILE};
use crate::config::{AccountConfig, ScraperConfig};
use crate::error::{ErrorKind, ScrapeError};
use crate::portal::{run_scrape, ProgressFn, ScrapeReport};

const MAX_ATTEMPTS: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// One blocking scrape for one set of credentials
pub trait ScrapeJob: Send + Sync {
    fn run(
        &self,
        credentials: &Credentials,
        progress: &mut ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<ScrapeReport, ScrapeError>;
}

/// Scrape with a fresh Chrome process per run
pub struct ChromeScrapeJob {
    config: Arc<ScraperConfig>,
}

impl ChromeScrapeJob {
    pub fn new(config: Arc<ScraperConfig>) -> Self {
        Self { config }
    }
}

impl ScrapeJob for ChromeScrapeJob {
    fn run(
        &self,
        credentials: &Credentials,
        progress: &mut ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<ScrapeReport, ScrapeError> {
        run_scrape(&self.config, credentials, Some(progress), cancel)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountRunResult {
    pub label: String,
    pub success: bool,
    pub matches_total: usize,
    pub matches_extracted: usize,
    pub session_id: Option<String>,
    pub reason: Option<String>,
}

impl AccountRunResult {
    fn failed(label: &str, session_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            success: false,
            matches_total: 0,
            matches_extracted: 0,
            session_id,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub results: Vec<AccountRunResult>,
    pub successful: usize,
    pub failed: usize,
}

pub struct BatchRunner {
    gate: ScrapeGate,
    store: Arc<SessionStore>,
    job: Arc<dyn ScrapeJob>,
    retry_delay: Duration,
}

impl BatchRunner {
    pub fn new(gate: ScrapeGate, store: Arc<SessionStore>, job: Arc<dyn ScrapeJob>) -> Self {
        Self {
            gate,
            store,
            job,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn gate(&self) -> &ScrapeGate {
        &self.gate
    }

    /// Scrape one account into a new output session
    pub async fn run_account(&self, account: &AccountConfig, cancel: &CancellationToken) -> AccountRunResult {
        let label = account.label.as_str();
        let session = match self.store.create_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("[{}] Could not create output session: {:#}", label, e);
                return AccountRunResult::failed(label, None, e.to_string());
            }
        };

        let mut attempt = 1;
        let outcome = loop {
            let outcome = self.scrape_blocking(label, account.credentials(), &session, cancel).await;
            let retry = matches!(&outcome, Err(e) if e.kind().is_retryable())
                && attempt < MAX_ATTEMPTS
                && !cancel.is_cancelled();
            if !retry {
                break outcome;
            }
            if let Err(e) = &outcome {
                tracing::warn!(
                    "[{}] Scrape failed (attempt {}/{}): {}. Retrying in {}s...",
                    label,
                    attempt,
                    MAX_ATTEMPTS,
                    e,
                    self.retry_delay.as_secs()
                );
            }
            attempt += 1;
            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {}
                _ = cancel.cancelled() => break Err(ScrapeError::Cancelled),
            }
        };

        self.finish(label, session, outcome).await
    }

    /// Run the job on a blocking thread and mirror its progress into the
    /// session metadata while it runs.
    ///
    /// The gate permit lives inside the blocking job, so the slot stays taken
    /// until the browser is gone even if this future is dropped.
    async fn scrape_blocking(
        &self,
        label: &str,
        credentials: Credentials,
        session: &OutputSession,
        cancel: &CancellationToken,
    ) -> Result<ScrapeReport, ScrapeError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ScrapeError::Session(format!("scrape gate closed: {}", e)))?;
        self.update(session, MetadataUpdate::status(SessionStatus::Scraping)).await;
        tracing::info!("[{}] Scrape started in {}", label, session.id);

        let (tx, mut rx) = mpsc::unbounded_channel::<ScrapeProgress>();
        let job = self.job.clone();
        let cancel = cancel.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut progress = |p: &ScrapeProgress| {
                let _ = tx.send(p.clone());
            };
            job.run(&credentials, &mut progress, &cancel)
        });

        // Ends when the job drops its sender
        while let Some(progress) = rx.recv().await {
            self.update(session, MetadataUpdate::progress(progress)).await;
        }

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(ScrapeError::Session(format!("scrape job aborted: {}", e))),
        }
    }

    async fn finish(
        &self,
        label: &str,
        session: OutputSession,
        outcome: Result<ScrapeReport, ScrapeError>,
    ) -> AccountRunResult {
        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("[{}] Scrape failed: {}", label, e);
                let reason = match e.kind() {
                    ErrorKind::InvalidCredentials => format!("Ungültige Zugangsdaten: {}", e),
                    _ => e.to_string(),
                };
                self.update(
                    &session,
                    MetadataUpdate {
                        status: Some(SessionStatus::Error),
                        summary: Some(reason.clone()),
                        ..Default::default()
                    },
                )
                .await;
                return AccountRunResult::failed(label, Some(session.id), reason);
            }
        };

        let mut files = Vec::new();
        match self.store.write_matches(&session, &report.records).await {
            Ok(_) => files.push(MATCHES_FILE.to_string()),
            Err(e) => tracing::error!("[{}] Could not save matches: {:#}", label, e),
        }

        let reason = if report.cancelled {
            Some("scrape cancelled".to_string())
        } else if report.is_failure() {
            Some("Keine Spiele extrahiert".to_string())
        } else if files.is_empty() {
            Some("match data could not be saved".to_string())
        } else {
            None
        };
        let success = reason.is_none();

        self.update(
            &session,
            MetadataUpdate {
                status: Some(if success { SessionStatus::Completed } else { SessionStatus::Error }),
                files: Some(files),
                summary: Some(report.summary()),
                ..Default::default()
            },
        )
        .await;

        tracing::info!("[{}] {} ({})", label, report.summary(), session.id);
        AccountRunResult {
            label: label.to_string(),
            success,
            matches_total: report.total,
            matches_extracted: report.extracted(),
            session_id: Some(session.id),
            reason,
        }
    }

    async fn update(&self, session: &OutputSession, update: MetadataUpdate) {
        if let Err(e) = self.store.update_metadata(session, update).await {
            tracing::warn!("Could not update metadata of {}: {:#}", session.id, e);
        }
    }

    /// Scrape all accounts, at most `gate.limit()` at a time
    pub async fn run_all(&self, accounts: &[AccountConfig], cancel: &CancellationToken) -> BatchSummary {
        tracing::info!(
            "Batch run for {} accounts (max {} concurrent)",
            accounts.len(),
            self.gate.limit()
        );

        let results = join_all(accounts.iter().map(|account| self.run_account(account, cancel))).await;
        let successful = results.iter().filter(|r| r.success).count();
        let summary = BatchSummary {
            failed: results.len() - successful,
            successful,
            results,
        };

        tracing::info!(
            "Batch finished: {} successful, {} failed",
            summary.successful,
            summary.failed
        );
        summary
    }
}
