use std::time::Duration;

use tracing::{info, warn};

use super::selectors;
use crate::browser::wait::visible_within;
use crate::browser::{PageDriver, Target};
use crate::error::ScrapeError;

/// Index access to the rendered match list.
///
/// Nothing is cached: the portal re-renders list items whenever a modal
/// opens or closes, so every call asks the page again.
pub struct MatchList {
    wait_for_items: Duration,
}

impl MatchList {
    pub fn new(wait_for_items: Duration) -> Self {
        Self { wait_for_items }
    }

    /// Wait for the first item to render, then count. An empty list after the
    /// wait is a valid answer, not an error.
    pub fn count_matches<D: PageDriver + ?Sized>(&self, page: &D) -> Result<usize, ScrapeError> {
        info!("Looking for matches...");
        let first = selectors::match_items().first();
        if !visible_within(page, &first, self.wait_for_items) {
            warn!(
                "No match entries within {} ms, treating the list as empty",
                self.wait_for_items.as_millis()
            );
            return Ok(0);
        }

        let count = page.count(&selectors::match_items())?;
        info!("Found {} matches", count);
        Ok(count)
    }

    pub fn containers<D: PageDriver + ?Sized>(&self, page: &D) -> Result<Vec<Target>, ScrapeError> {
        let count = page.count(&selectors::match_items())?;
        Ok((0..count).map(selectors::match_item).collect())
    }

    /// Locator for the item at `index`, checked against the current DOM
    pub fn container<D: PageDriver + ?Sized>(&self, page: &D, index: usize) -> Result<Target, ScrapeError> {
        let count = page.count(&selectors::match_items())?;
        if index >= count {
            return Err(ScrapeError::Extraction {
                index,
                message: format!("Spiel {} nicht gefunden ({} Einträge in der Liste)", index + 1, count),
            });
        }
        Ok(selectors::match_item(index))
    }
}
