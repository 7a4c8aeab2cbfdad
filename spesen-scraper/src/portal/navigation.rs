use tracing::{debug, info};

use super::selectors;
use crate::browser::wait::{visible_within, wait_visible};
use crate::browser::PageDriver;
use crate::config::{PortalConfig, PortalTimeouts};
use crate::error::ScrapeError;

pub struct NavigationFlow<'a, D: PageDriver + ?Sized> {
    page: &'a mut D,
    timeouts: &'a PortalTimeouts,
}

impl<'a, D: PageDriver + ?Sized> NavigationFlow<'a, D> {
    pub fn new(page: &'a mut D, portal: &'a PortalConfig) -> Self {
        Self {
            page,
            timeouts: &portal.timeouts,
        }
    }

    /// Open the hamburger menu when the layout collapsed it.
    ///
    /// Returns whether the toggle was clicked; a hidden toggle is not an error.
    pub fn open_menu_if_collapsed(&mut self) -> Result<bool, ScrapeError> {
        let toggle = selectors::menu_toggle();
        if !visible_within(&*self.page, &toggle, PortalTimeouts::ms(self.timeouts.menu_toggle)) {
            debug!("Menu toggle not visible, menu is already expanded");
            return Ok(false);
        }

        info!("Opening collapsed menu...");
        self.page
            .click(&toggle)
            .map_err(|e| e.into_navigation("open menu"))?;
        self.page.pause(PortalTimeouts::ms(self.timeouts.menu_settle));
        Ok(true)
    }

    /// Menu → "Schiriansetzung" → "Eigene Daten". The last entry opens in a
    /// new tab, which becomes the active page.
    pub fn navigate_to_assignments(&mut self) -> Result<(), ScrapeError> {
        self.open_menu_if_collapsed()?;

        info!("Navigating to Schiriansetzung...");
        let menu = selectors::assignments_menu();
        let menu_timeout = PortalTimeouts::ms(self.timeouts.menu_item);
        wait_visible(&*self.page, &menu, menu_timeout)
            .and_then(|_| self.page.click(&menu))
            .map_err(|e| e.into_navigation("open Schiriansetzung"))?;
        self.page.pause(PortalTimeouts::ms(self.timeouts.menu_settle));

        let entry = selectors::own_data_entry();
        wait_visible(&*self.page, &entry, menu_timeout)
            .map_err(|e| e.into_navigation("find Eigene Daten"))?;

        info!("Opening Eigene Daten, waiting for the new tab...");
        self.page
            .click_and_adopt_new_tab(&entry, PortalTimeouts::ms(self.timeouts.new_tab))
            .map_err(|e| e.into_navigation("switch to assignments tab"))?;

        info!("Assignments tab active: {}", self.page.current_url());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{Effect, FakePage};
    use crate::error::ErrorKind;

    const ASSIGNMENTS_URL: &str = "https://www.dfbnet.org/spielplus/sria/matches";

    fn menu_page() -> FakePage {
        let mut page = FakePage::new("https://www.dfbnet.org/spielplus/start");
        let menu = selectors::assignments_menu();
        let entry = selectors::own_data_entry();
        page.show(&menu, "Schiriansetzung");
        page.on_click(&menu, Effect::Show(entry.clone(), "Eigene Daten".to_string()));
        page
    }

    #[test]
    fn test_hidden_menu_toggle_is_success() {
        let mut page = FakePage::new("https://www.dfbnet.org");
        let portal = PortalConfig::default();
        assert!(!NavigationFlow::new(&mut page, &portal).open_menu_if_collapsed().unwrap());
        assert!(page.clicks.is_empty());
    }

    #[test]
    fn test_navigate_adopts_new_tab() {
        let mut page = menu_page();
        page.on_click(
            &selectors::own_data_entry(),
            Effect::OpenTab(ASSIGNMENTS_URL.to_string()),
        );
        let portal = PortalConfig::default();

        NavigationFlow::new(&mut page, &portal).navigate_to_assignments().unwrap();
        assert_eq!(page.tabs_opened, 1);
        assert_eq!(page.current_url(), ASSIGNMENTS_URL);
    }

    #[test]
    fn test_collapsed_menu_is_opened_first() {
        let mut page = menu_page();
        let toggle = selectors::menu_toggle();
        page.show(&toggle, "");
        page.on_click(
            &selectors::own_data_entry(),
            Effect::OpenTab(ASSIGNMENTS_URL.to_string()),
        );
        let portal = PortalConfig::default();

        NavigationFlow::new(&mut page, &portal).navigate_to_assignments().unwrap();
        assert_eq!(page.clicks[0], toggle);
        assert_eq!(page.clicks[1], selectors::assignments_menu());
    }

    #[test]
    fn test_missing_new_tab_is_navigation_error() {
        let mut page = menu_page();
        let portal = PortalConfig::default();

        let err = NavigationFlow::new(&mut page, &portal)
            .navigate_to_assignments()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Navigation);
        assert!(err.kind().is_fatal());
        assert!(err.to_string().contains("new tab"));
    }

    #[test]
    fn test_missing_menu_is_navigation_error() {
        let mut page = FakePage::new("https://www.dfbnet.org/spielplus/start");
        let portal = PortalConfig::default();
        let err = NavigationFlow::new(&mut page, &portal)
            .navigate_to_assignments()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Navigation);
    }
}
