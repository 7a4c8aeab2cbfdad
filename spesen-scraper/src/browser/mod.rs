///! Browser session layer
///!
///! `PageDriver` is the small set of page primitives the portal flows are
///! written against. `ChromeSession` drives a real Chrome through
///! `headless_chrome`; tests use the scripted `fake::FakePage`.

mod chrome;
mod locator;
pub mod wait;

#[cfg(test)]
pub(crate) mod fake;

pub use chrome::ChromeSession;
pub use locator::{Locator, Pick, Target, xpath_has_text};

use std::time::{Duration, Instant};

use crate::error::ScrapeError;

/// Operations against the one active page of a browser session.
///
/// Calls are strictly sequential; a page is never driven from two flows at
/// once.
pub trait PageDriver {
    /// Navigate and wait until the DOM is ready (not network idle)
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    fn current_url(&self) -> String;

    fn title(&self) -> Result<String, ScrapeError>;

    /// Number of candidates for `target`, ignoring its pick
    fn count(&self, target: &Target) -> Result<usize, ScrapeError>;

    /// Instant visibility check, no waiting
    fn is_visible(&self, target: &Target) -> Result<bool, ScrapeError>;

    /// Trimmed rendered text of the picked element
    fn inner_text(&self, target: &Target) -> Result<String, ScrapeError>;

    /// Trimmed rendered text of every candidate, in document order
    fn all_texts(&self, target: &Target) -> Result<Vec<String>, ScrapeError>;

    fn click(&mut self, target: &Target) -> Result<(), ScrapeError>;

    /// Replace the value of an input field
    fn fill(&mut self, target: &Target, value: &str) -> Result<(), ScrapeError>;

    fn press_key(&mut self, key: &str) -> Result<(), ScrapeError>;

    /// Click `target` and switch the active page to the tab the click opens.
    ///
    /// The set of known tabs is captured before the click, so a tab that opens
    /// quickly is never missed.
    fn click_and_adopt_new_tab(&mut self, target: &Target, timeout: Duration)
        -> Result<(), ScrapeError>;

    /// PNG of the current viewport
    fn screenshot(&self) -> Result<Vec<u8>, ScrapeError>;

    fn pause(&self, duration: Duration);

    /// Clock the waits measure their deadlines against
    fn now(&self) -> Instant {
        Instant::now()
    }
}
