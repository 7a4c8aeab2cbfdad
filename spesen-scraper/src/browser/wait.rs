///! Bounded waits
///!
///! Every wait measures a deadline on `PageDriver::now`, so the time spent
///! evaluating the condition counts against the budget. A wait overruns its
///! timeout by at most one evaluation of the condition.

use std::time::Duration;

use super::{PageDriver, Target};
use crate::error::ScrapeError;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `condition` until it holds or `timeout` is used up
pub fn wait_until<D, F>(page: &D, timeout: Duration, what: &str, mut condition: F) -> Result<(), ScrapeError>
where
    D: PageDriver + ?Sized,
    F: FnMut(&D) -> Result<bool, ScrapeError>,
{
    let deadline = page.now() + timeout;
    let mut last_error = None;
    loop {
        match condition(page) {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => last_error = Some(e),
        }
        let now = page.now();
        if now >= deadline {
            break;
        }
        page.pause(POLL_INTERVAL.min(deadline - now));
    }

    if let Some(e) = last_error {
        tracing::debug!("Last error while waiting for {}: {}", what, e);
    }
    Err(ScrapeError::timeout(what, timeout))
}

pub fn wait_visible<D: PageDriver + ?Sized>(page: &D, target: &Target, timeout: Duration) -> Result<(), ScrapeError> {
    wait_until(page, timeout, &target.to_string(), |p| p.is_visible(target))
}

pub fn wait_hidden<D: PageDriver + ?Sized>(page: &D, target: &Target, timeout: Duration) -> Result<(), ScrapeError> {
    wait_until(page, timeout, &format!("{} to disappear", target), |p| {
        p.is_visible(target).map(|visible| !visible)
    })
}

/// Like `wait_visible`, but absence is an answer rather than an error
pub fn visible_within<D: PageDriver + ?Sized>(page: &D, target: &Target, timeout: Duration) -> bool {
    wait_visible(page, target, timeout).is_ok()
}

/// Text of `target` if it becomes visible in time and is not blank
pub fn text_within<D: PageDriver + ?Sized>(page: &D, target: &Target, timeout: Duration) -> Option<String> {
    if !visible_within(page, target, timeout) {
        return None;
    }
    match page.inner_text(target) {
        Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Could not read text of {}: {}", target, e);
            None
        }
    }
}
