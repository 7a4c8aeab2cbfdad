use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use spesen_common::match_utils::parse_anpfiff;
use spesen_common::{Credentials, ScrapeProgress};
use tokio_util::sync::CancellationToken;

use spesen_scraper::config::ScraperConfig;
use spesen_scraper::logging;
use spesen_scraper::module::{
    BatchRunner, ChromeScrapeJob, MetadataUpdate, NightlyScheduler, ScrapeGate, SessionStatus, SessionStore,
};
use spesen_scraper::portal::{run_scrape, ScrapeReport};

const USERNAME_ENV: &str = "DFB_USERNAME";
const PASSWORD_ENV: &str = "DFB_PASSWORD";

#[derive(Parser)]
#[command(name = "spesen-scraper")]
#[command(about = "Collects referee assignments for expense claims", long_about = None)]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        default_value = "config.toml",
        global = true,
        help = "Path to the configuration file"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one account once and save its matches
    Once {
        #[arg(long, help = "Account label from the configuration; defaults to DFB_USERNAME/DFB_PASSWORD")]
        account: Option<String>,

        #[arg(short = 'o', long = "output", help = "Write the JSON array here instead of a new session")]
        output: Option<PathBuf>,
    },
    /// Run the nightly scheduler until Ctrl-C
    Daemon,
    /// Scrape all configured accounts right now
    Batch,
}

fn load_config(path: &Path) -> Result<(ScraperConfig, bool)> {
    if path.exists() {
        Ok((ScraperConfig::from_file(path)?, true))
    } else {
        Ok((ScraperConfig::default(), false))
    }
}

fn env_credentials() -> Result<Credentials> {
    let username = std::env::var(USERNAME_ENV).with_context(|| format!("{} is not set", USERNAME_ENV))?;
    let password = std::env::var(PASSWORD_ENV).with_context(|| format!("{} is not set", PASSWORD_ENV))?;
    Ok(Credentials::new(username, password))
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping after the current match...");
            token.cancel();
        }
    });
}

fn print_report(report: &ScrapeReport) {
    for record in &report.records {
        let info = &record.spiel_info;
        let (date, time) = parse_anpfiff(info.anpfiff.as_deref().unwrap_or_default());
        println!(
            "{} {}  {} - {}",
            date,
            time,
            info.heim_team.as_deref().unwrap_or("?"),
            info.gast_team.as_deref().unwrap_or("?")
        );
    }
    println!("{}", report.summary());
}

async fn run_once(config: Arc<ScraperConfig>, account: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let credentials = match &account {
        Some(label) => config
            .account(label)
            .with_context(|| format!("Unknown account: {}", label))?
            .credentials(),
        None => env_credentials()?,
    };

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let scrape_config = config.clone();
    let report = tokio::task::spawn_blocking(move || {
        let mut progress = |p: &ScrapeProgress| {
            tracing::info!("Progress {}/{}: {}", p.current, p.total, p.step);
        };
        run_scrape(&scrape_config, &credentials, Some(&mut progress), &cancel)
    })
    .await
    .context("Scrape task panicked")??;

    let records = &report.records;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, serde_json::to_string_pretty(records)?)
                .await
                .with_context(|| format!("Failed to write {:?}", path))?;
            tracing::info!("Saved {} matches to {:?}", records.len(), path);
        }
        None => {
            let store = SessionStore::new(&config.output.dir).await?;
            let session = store.create_session().await?;
            store.write_matches(&session, records).await?;
            let status = if report.is_failure() {
                SessionStatus::Error
            } else {
                SessionStatus::Completed
            };
            store
                .update_metadata(
                    &session,
                    MetadataUpdate {
                        status: Some(status),
                        files: Some(vec![spesen_scraper::module::session_store::MATCHES_FILE.to_string()]),
                        summary: Some(report.summary()),
                        ..Default::default()
                    },
                )
                .await?;
            tracing::info!("Saved {} matches in session {}", records.len(), session.id);
        }
    }

    print_report(&report);
    if report.is_failure() {
        bail!("Keine Spiele extrahiert ({} gefunden)", report.total);
    }
    Ok(())
}

async fn batch_runner(config: &Arc<ScraperConfig>) -> Result<Arc<BatchRunner>> {
    let store = Arc::new(SessionStore::new(&config.output.dir).await?);
    let gate = ScrapeGate::new(config.scheduler.max_concurrent);
    let job = Arc::new(ChromeScrapeJob::new(config.clone()));
    Ok(Arc::new(BatchRunner::new(gate, store, job)))
}

async fn run_batch(config: Arc<ScraperConfig>) -> Result<()> {
    if config.accounts.is_empty() {
        bail!("No accounts configured");
    }

    let runner = batch_runner(&config).await?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let summary = runner.run_all(&config.accounts, &cancel).await;
    for result in &summary.results {
        println!(
            "{}: {} ({}/{}){}",
            result.label,
            if result.success { "ok" } else { "fehlgeschlagen" },
            result.matches_extracted,
            result.matches_total,
            result.reason.as_deref().map(|r| format!(" - {}", r)).unwrap_or_default()
        );
    }

    if summary.failed > 0 {
        bail!("{} of {} accounts failed", summary.failed, summary.results.len());
    }
    Ok(())
}

async fn run_daemon(config: Arc<ScraperConfig>) -> Result<()> {
    if !config.scheduler.enabled {
        tracing::warn!("scheduler.enabled is false, starting anyway because daemon mode was requested");
    }

    let runner = batch_runner(&config).await?;
    let mut scheduler = NightlyScheduler::new(config.scheduler.clone(), config.accounts.clone(), runner);
    scheduler.start().await?;
    tracing::info!("Scheduler running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    scheduler.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, from_file) = load_config(&cli.config)?;
    let config = Arc::new(config);

    let _logging_guard = logging::init_logging(
        &config.log_dir,
        "spesen-scraper",
        &config.log_level,
        config.log_retention_days,
    )?;

    tracing::info!("Spesen scraper starting...");
    if from_file {
        tracing::info!("Configuration loaded from {:?}", cli.config);
    } else {
        tracing::warn!("{:?} not found, using default configuration", cli.config);
    }

    match cli.command {
        Commands::Once { account, output } => run_once(config, account, output).await,
        Commands::Daemon => run_daemon(config).await,
        Commands::Batch => run_batch(config).await,
    }
}
