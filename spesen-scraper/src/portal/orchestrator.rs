///! Scrape pass over the whole match list
///!
///! Login and navigation failures abort the pass. Anything that goes wrong
///! with a single match is logged against its index and the pass moves on.

use std::path::{Path, PathBuf};

use serde::Serialize;
use spesen_common::{Credentials, MatchRecord, ScrapeProgress};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::auth::AuthFlow;
use super::extract::FieldReader;
use super::match_list::MatchList;
use super::modal::{ModalController, ModalKind, ModalTimeouts};
use super::navigation::NavigationFlow;
use crate::browser::{ChromeSession, PageDriver};
use crate::config::{PortalConfig, PortalTimeouts, ScraperConfig};
use crate::error::{ErrorKind, ScrapeError};

/// Progress sink, called with (current, total, step)
pub type ProgressFn<'a> = dyn FnMut(&ScrapeProgress) + Send + 'a;

/// Source of match records for one scrape pass
pub trait MatchSource {
    fn count_matches(&mut self) -> Result<usize, ScrapeError>;

    fn extract(&mut self, index: usize) -> Result<MatchRecord, ScrapeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchFailure {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeReport {
    pub records: Vec<MatchRecord>,
    /// Number of list entries at the start of the pass
    pub total: usize,
    pub failures: Vec<MatchFailure>,
    pub cancelled: bool,
}

impl ScrapeReport {
    pub fn extracted(&self) -> usize {
        self.records.len()
    }

    /// A non-empty list of which nothing could be extracted
    pub fn is_failure(&self) -> bool {
        self.total > 0 && self.records.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("{} von {} Spielen erfolgreich extrahiert", self.extracted(), self.total)
    }
}

/// Matches read from the portal's assignment list through its three dialogs
pub struct PortalMatches<'a, D: PageDriver + ?Sized> {
    page: &'a mut D,
    timeouts: &'a PortalTimeouts,
    list: MatchList,
    modal: ModalController,
}

impl<'a, D: PageDriver + ?Sized> PortalMatches<'a, D> {
    pub fn new(page: &'a mut D, portal: &'a PortalConfig) -> Self {
        let timeouts = &portal.timeouts;
        Self {
            page,
            timeouts,
            list: MatchList::new(PortalTimeouts::ms(timeouts.match_list)),
            modal: ModalController::new(ModalTimeouts::from(timeouts)),
        }
    }

    fn extract_record(&mut self, index: usize) -> Result<MatchRecord, ScrapeError> {
        self.list.container(&*self.page, index)?;
        let timeouts = self.timeouts;

        let spiel_info = self
            .modal
            .run(self.page, ModalKind::GameDetails, index, |page, root| {
                FieldReader::new(page, root, timeouts).spiel_info()
            })?
            .or_default();

        let schiedsrichter = self
            .modal
            .run(self.page, ModalKind::Referees, index, |page, root| {
                FieldReader::new(page, root, timeouts).referees()
            })?
            .or_default();

        let spielstaette = self
            .modal
            .run(self.page, ModalKind::Venue, index, |page, root| {
                FieldReader::new(page, root, timeouts).venue()
            })?
            .or_default();

        let record = MatchRecord {
            spiel_info,
            schiedsrichter,
            spielstaette,
        };
        if record.is_empty() {
            return Err(ScrapeError::Extraction {
                index,
                message: "Keine Daten aus den Spieldialogen gelesen".to_string(),
            });
        }
        Ok(record)
    }
}

impl<D: PageDriver + ?Sized> MatchSource for PortalMatches<'_, D> {
    fn count_matches(&mut self) -> Result<usize, ScrapeError> {
        self.list.count_matches(&*self.page)
    }

    fn extract(&mut self, index: usize) -> Result<MatchRecord, ScrapeError> {
        self.extract_record(index).map_err(|e| e.into_extraction(index))
    }
}

/// Extract every match of `source`.
///
/// Progress is reported once per match, skipped or not, and once with
/// (0, 0) for an empty list. Cancellation is honoured between matches.
pub fn scrape_all<S: MatchSource + ?Sized>(
    source: &mut S,
    mut progress: Option<&mut ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<ScrapeReport, ScrapeError> {
    let total = source.count_matches()?;
    let mut report = ScrapeReport {
        total,
        ..Default::default()
    };
    let mut emit = |p: ScrapeProgress| {
        if let Some(callback) = progress.as_deref_mut() {
            callback(&p);
        }
    };

    if total == 0 {
        info!("No matches to extract");
        emit(ScrapeProgress::new(0, 0, "Keine Spiele gefunden"));
        return Ok(report);
    }

    for index in 0..total {
        if cancel.is_cancelled() {
            warn!("Scrape cancelled before match {}/{}", index + 1, total);
            report.cancelled = true;
            break;
        }

        info!("Processing match {}/{}", index + 1, total);
        match source.extract(index) {
            Ok(record) => {
                info!("Match {}/{} extracted", index + 1, total);
                report.records.push(record);
            }
            Err(e) if e.kind() == ErrorKind::Cancelled => {
                warn!("Scrape cancelled during match {}/{}", index + 1, total);
                report.cancelled = true;
                break;
            }
            Err(e) if e.kind().is_fatal() => {
                error!("Aborting scrape at match {}: {}", index + 1, e);
                return Err(e);
            }
            Err(e) => {
                error!("Skipping match {}: {}", index + 1, e);
                report.failures.push(MatchFailure {
                    index,
                    message: e.to_string(),
                });
            }
        }

        emit(ScrapeProgress::new(
            index + 1,
            total,
            format!("Spiel {} von {} verarbeitet", index + 1, total),
        ));
    }

    info!("{}", report.summary());
    Ok(report)
}

/// Login, navigation and extraction on an already running page
pub fn scrape_portal<D: PageDriver + ?Sized>(
    page: &mut D,
    portal: &PortalConfig,
    credentials: &Credentials,
    progress: Option<&mut ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<ScrapeReport, ScrapeError> {
    AuthFlow::new(page, portal).login(credentials)?;
    if cancel.is_cancelled() {
        return Err(ScrapeError::Cancelled);
    }

    NavigationFlow::new(page, portal).navigate_to_assignments()?;
    if cancel.is_cancelled() {
        return Err(ScrapeError::Cancelled);
    }

    let mut matches = PortalMatches::new(page, portal);
    scrape_all(&mut matches, progress, cancel)
}

/// The complete pipeline with its own Chrome process. Blocking; run it on a
/// blocking thread from async code.
pub fn run_scrape(
    config: &ScraperConfig,
    credentials: &Credentials,
    progress: Option<&mut ProgressFn<'_>>,
    cancel: &CancellationToken,
) -> Result<ScrapeReport, ScrapeError> {
    let mut session = ChromeSession::start(&config.browser)?;

    let result = scrape_portal(&mut session, &config.portal, credentials, progress, cancel);
    if let Err(e) = &result {
        error!("Scrape failed: {}", e);
        if config.output.screenshot_on_failure && e.kind() != ErrorKind::Cancelled {
            save_failure_screenshot(&session, &config.output.dir);
        }
    }

    session.stop();
    result
}

/// Best effort; a failing screenshot is only logged
pub fn save_failure_screenshot<D: PageDriver + ?Sized>(page: &D, dir: &Path) -> Option<PathBuf> {
    let path = dir.join(format!("error_{}.png", chrono::Local::now().format("%Y%m%d_%H%M%S")));
    let written = page.screenshot().and_then(|png| {
        std::fs::create_dir_all(dir)?;
        std::fs::write(&path, png)?;
        Ok(())
    });

    match written {
        Ok(()) => {
            info!("Screenshot saved: {:?}", path);
            Some(path)
        }
        Err(e) => {
            warn!("Could not save screenshot: {}", e);
            None
        }
    }
}
