///! Modal dialog lifecycle
///!
///! The portal shows match details in three non-stacking dialogs. Each one
///! goes Closed → Opening → Ready → Extracting → Closing → Closed, and the
///! next dialog may only open once the previous one is Closed again.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::selectors;
use crate::browser::wait::{visible_within, wait_hidden, wait_visible};
use crate::browser::{PageDriver, Target};
use crate::config::PortalTimeouts;
use crate::error::ScrapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    /// "Mehr Info": kickoff, teams and league data
    GameDetails,
    /// Referee team with contact data
    Referees,
    /// Venue name, address and pitch type
    Venue,
}

impl ModalKind {
    pub fn trigger(&self, index: usize) -> Target {
        match self {
            ModalKind::GameDetails => selectors::game_details_trigger(index),
            ModalKind::Referees => selectors::referees_trigger(index),
            ModalKind::Venue => selectors::venue_trigger(index),
        }
    }

    /// Element whose appearance means the dialog content has rendered
    pub fn ready_marker(&self, root: &Target) -> Target {
        match self {
            ModalKind::GameDetails => selectors::kickoff(root),
            ModalKind::Referees => selectors::referee_items(root),
            ModalKind::Venue => selectors::venue_geotag(root),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModalKind::GameDetails => "Mehr Info",
            ModalKind::Referees => "Schiedsrichter",
            ModalKind::Venue => "Spielstätte",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    Opening,
    Ready,
    Extracting,
    Closing,
}

/// How a dialog was dismissed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMethod {
    Button,
    Escape,
}

/// Result of one open-extract-close cycle
#[derive(Debug, Clone, PartialEq)]
pub enum ModalOutcome<T> {
    Extracted(T),
    /// The dialog could not be opened; the reason is kept for the log
    Unavailable(String),
}

impl<T: Default> ModalOutcome<T> {
    pub fn or_default(self) -> T {
        match self {
            ModalOutcome::Extracted(value) => value,
            ModalOutcome::Unavailable(_) => T::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModalTimeouts {
    pub open: Duration,
    pub content: Duration,
    pub close: Duration,
}

impl From<&PortalTimeouts> for ModalTimeouts {
    fn from(t: &PortalTimeouts) -> Self {
        Self {
            open: PortalTimeouts::ms(t.modal_open),
            content: PortalTimeouts::ms(t.modal_content),
            close: PortalTimeouts::ms(t.modal_close),
        }
    }
}

pub struct ModalController {
    state: ModalState,
    timeouts: ModalTimeouts,
}

impl ModalController {
    pub fn new(timeouts: ModalTimeouts) -> Self {
        Self {
            state: ModalState::Closed,
            timeouts,
        }
    }

    pub fn state(&self) -> ModalState {
        self.state
    }

    /// Click the trigger of `kind` for match `index` and wait for the dialog.
    ///
    /// Returns the root every query inside the dialog has to be built on.
    pub fn open<D: PageDriver + ?Sized>(
        &mut self,
        page: &mut D,
        kind: ModalKind,
        index: usize,
    ) -> Result<Target, ScrapeError> {
        if self.state != ModalState::Closed {
            self.recover(page);
        }

        info!("Opening {} modal for match {}...", kind.label(), index + 1);
        let trigger = kind.trigger(index);
        if !page.is_visible(&trigger)? {
            return Err(ScrapeError::driver(format!("{} trigger not visible", kind.label())));
        }

        self.state = ModalState::Opening;
        let root = selectors::modal_root();
        let opened = page
            .click(&trigger)
            .and_then(|_| wait_visible(&*page, &root, self.timeouts.open));
        if let Err(e) = opened {
            // The click may have half-opened something; get back to Closed
            if let Err(close_err) = self.close(page) {
                debug!("Cleanup after failed open did not close: {}", close_err);
            }
            return Err(e);
        }

        let marker = kind.ready_marker(&root);
        if !visible_within(&*page, &marker, self.timeouts.content) {
            warn!("{} modal content did not render, fields will be missing", kind.label());
        }

        self.state = ModalState::Ready;
        debug!("{} modal ready", kind.label());
        Ok(root)
    }

    pub fn begin_extract(&mut self) -> Result<(), ScrapeError> {
        match self.state {
            ModalState::Ready => {
                self.state = ModalState::Extracting;
                Ok(())
            }
            other => Err(ScrapeError::driver(format!("no dialog ready for extraction ({:?})", other))),
        }
    }

    /// Dismiss the dialog, falling back to Escape when the close button does
    /// not make it go away. Errors only if the dialog is still visible after
    /// both attempts.
    pub fn close<D: PageDriver + ?Sized>(&mut self, page: &mut D) -> Result<CloseMethod, ScrapeError> {
        self.state = ModalState::Closing;
        let root = selectors::modal_root();

        match page.click(&selectors::modal_close_button(&root)) {
            Ok(()) => {
                if wait_hidden(&*page, &root, self.timeouts.close).is_ok() {
                    self.state = ModalState::Closed;
                    return Ok(CloseMethod::Button);
                }
                debug!("Dialog still visible after close button");
            }
            Err(e) => debug!("Close button failed: {}", e),
        }

        warn!("Closing dialog with Escape");
        page.press_key("Escape")?;
        wait_hidden(&*page, &root, self.timeouts.close)?;
        self.state = ModalState::Closed;
        Ok(CloseMethod::Escape)
    }

    /// Get back to Closed after an earlier dialog was left open. The state is
    /// reset even if the dialog refuses to go away, so one stuck dialog never
    /// blocks the following matches.
    pub fn recover<D: PageDriver + ?Sized>(&mut self, page: &mut D) {
        warn!("Previous dialog left {:?}, closing it first", self.state);
        if let Err(e) = self.close(page) {
            warn!("Previous dialog is still open: {}", e);
        }
        self.state = ModalState::Closed;
    }

    /// One full open-extract-close cycle.
    ///
    /// A dialog that cannot be opened degrades to `Unavailable`. A dialog
    /// that cannot be closed fails its match; the next `open` recovers
    /// before clicking anything.
    pub fn run<D, T, F>(
        &mut self,
        page: &mut D,
        kind: ModalKind,
        index: usize,
        extract: F,
    ) -> Result<ModalOutcome<T>, ScrapeError>
    where
        D: PageDriver + ?Sized,
        F: FnOnce(&D, &Target) -> T,
    {
        let root = match self.open(page, kind, index) {
            Ok(root) => root,
            Err(e) => {
                if self.state != ModalState::Closed {
                    return Err(e);
                }
                warn!("{} modal for match {} unavailable: {}", kind.label(), index + 1, e);
                return Ok(ModalOutcome::Unavailable(e.to_string()));
            }
        };

        self.begin_extract()?;
        let value = extract(&*page, &root);
        self.close(page)?;
        Ok(ModalOutcome::Extracted(value))
    }
}
