use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use anyhow::Context;
use tokio::task;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

const KNOWN_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Keeps the non-blocking file writer alive; hold it until the process exits
#[allow(dead_code)]
pub struct LoggerGuard(WorkerGuard);

/// Normalise a configured level name, falling back to `info`
pub fn effective_level(level: &str) -> &'static str {
    let lower = level.trim().to_ascii_lowercase();
    KNOWN_LEVELS
        .iter()
        .copied()
        .find(|known| *known == lower)
        .unwrap_or("info")
}

pub fn init_logging(
    log_dir: impl AsRef<Path>,
    prefix: &str,
    level: &str,
    retention_days: u64,
) -> anyhow::Result<LoggerGuard> {
    let log_dir = log_dir.as_ref().to_path_buf();
    let effective = effective_level(level);

    let builder = EnvFilter::builder()
        .with_default_directive(effective.parse().context("Invalid log directive")?);

    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    let console_filter = builder.clone().parse_lossy(&rust_log);
    let file_filter = builder.parse_lossy(&rust_log);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(&log_dir)
        .with_context(|| format!("Failed to create log appender in {:?}", log_dir))?;
    let (non_blocking, guard) = NonBlocking::new(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(file_filter);
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    if effective != level.trim().to_ascii_lowercase() {
        tracing::warn!("Invalid log level '{}', defaulting to 'info'", level);
    }

    let max_age = Duration::from_secs(60 * 60 * 24 * retention_days.max(1));
    start_log_cleanup_task(log_dir, prefix.to_string(), max_age);

    Ok(LoggerGuard(guard))
}

fn start_log_cleanup_task(log_dir: PathBuf, prefix: String, max_age: Duration) {
    task::spawn(async move {
        loop {
            match cleanup_old_logs(&log_dir, &prefix, max_age) {
                Ok(0) => {}
                Ok(n) => tracing::info!("Deleted {} old log files", n),
                Err(e) => tracing::warn!("Failed to delete old log file: {}", e),
            }
            tokio::time::sleep(CLEANUP_INTERVAL).await;
        }
    });
}

fn cleanup_old_logs(log_dir: &Path, prefix: &str, max_age: Duration) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();

        if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            if file_name.starts_with(prefix) && file_name.ends_with(".log") {
                let metadata = fs::metadata(&path)?;
                if let Ok(modified) = metadata.modified() {
                    if now.duration_since(modified).unwrap_or_default() >= max_age {
                        fs::remove_file(&path)?;
                        tracing::debug!("Old log file deleted: {}", file_name);
                        deleted += 1;
                    }
                }
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_level() {
        assert_eq!(effective_level("debug"), "debug");
        assert_eq!(effective_level(" WARN "), "warn");
        assert_eq!(effective_level("verbose"), "info");
    }

    #[test]
    fn test_cleanup_only_touches_prefixed_logs() {
        let dir = std::env::temp_dir().join(format!("spesen-logs-{}", uuid::Uuid::now_v7()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("spesen-scraper.2025-01-01.log"), "old").unwrap();
        fs::write(dir.join("other.2025-01-01.log"), "keep").unwrap();

        // Zero max age: every matching file counts as expired
        let deleted = cleanup_old_logs(&dir, "spesen-scraper", Duration::ZERO).unwrap();
        assert_eq!(deleted, 1);
        assert!(!dir.join("spesen-scraper.2025-01-01.log").exists());
        assert!(dir.join("other.2025-01-01.log").exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
