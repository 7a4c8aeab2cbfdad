use std::time::Duration;

/// Failure classes the orchestrator and batch runner decide on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Element not visible or not found in time, or a driver hiccup
    TransientUi,
    InvalidCredentials,
    Navigation,
    Extraction,
    SessionLifecycle,
    Cancelled,
    Storage,
}

impl ErrorKind {
    /// Fatal errors unwind the whole scrape pass
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::TransientUi | ErrorKind::Extraction)
    }

    /// Whether an automatic retry of the whole run makes sense
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransientUi | ErrorKind::Navigation | ErrorKind::SessionLifecycle
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("{what} not visible within {} ms", .timeout.as_millis())]
    Timeout { what: String, timeout: Duration },

    #[error("no strategy matched for {what} (tried: {})", .tried.join(", "))]
    NoStrategyMatched { what: String, tried: Vec<String> },

    #[error("browser driver error: {0}")]
    Driver(String),

    #[error("Login fehlgeschlagen: {message}")]
    InvalidCredentials { message: String },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("match {index}: {message}")]
    Extraction { index: usize, message: String },

    #[error("browser session error: {0}")]
    Session(String),

    #[error("scrape cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::Timeout { .. }
            | ScrapeError::NoStrategyMatched { .. }
            | ScrapeError::Driver(_) => ErrorKind::TransientUi,
            ScrapeError::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            ScrapeError::Navigation(_) => ErrorKind::Navigation,
            ScrapeError::Extraction { .. } => ErrorKind::Extraction,
            ScrapeError::Session(_) => ErrorKind::SessionLifecycle,
            ScrapeError::Cancelled => ErrorKind::Cancelled,
            ScrapeError::Io(_) | ScrapeError::Json(_) => ErrorKind::Storage,
        }
    }

    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        ScrapeError::Timeout {
            what: what.into(),
            timeout,
        }
    }

    pub fn driver(err: impl std::fmt::Display) -> Self {
        ScrapeError::Driver(err.to_string())
    }

    /// Re-tag a lower-level failure as a navigation failure, keeping its text
    pub fn into_navigation(self, step: &str) -> Self {
        match self {
            ScrapeError::Navigation(_) | ScrapeError::Cancelled => self,
            other => ScrapeError::Navigation(format!("{}: {}", step, other)),
        }
    }

    pub fn into_extraction(self, index: usize) -> Self {
        match self {
            ScrapeError::Extraction { .. } | ScrapeError::Cancelled => self,
            other => ScrapeError::Extraction {
                index,
                message: other.to_string(),
            },
        }
    }
}
