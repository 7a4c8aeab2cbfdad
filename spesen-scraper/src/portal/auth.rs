///! Login flow
///!
///! There is no API response to inspect after submitting the form, so the
///! outcome is classified by eliminating negative signals in a fixed order:
///! left the auth host, visible error message, password field still shown.

use spesen_common::Credentials;
use tracing::{debug, error, info, warn};

use super::selectors;
use crate::browser::wait::{text_within, visible_within, wait_visible};
use crate::browser::PageDriver;
use crate::config::{PortalConfig, PortalTimeouts};
use crate::error::ScrapeError;

const GENERIC_LOGIN_FAILURE: &str = "Login-Formular noch sichtbar - bitte Zugangsdaten prüfen";

/// What happened to the cookie banner; none of these is an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentOutcome {
    Accepted,
    NotShown,
    ClickFailed(String),
}

/// How a submitted login was judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginSignal {
    /// Redirected away from the auth host
    LeftAuthHost,
    /// None of the failure signals fired
    NoNegativeSignal,
}

pub struct AuthFlow<'a, D: PageDriver + ?Sized> {
    page: &'a mut D,
    portal: &'a PortalConfig,
}

impl<'a, D: PageDriver + ?Sized> AuthFlow<'a, D> {
    pub fn new(page: &'a mut D, portal: &'a PortalConfig) -> Self {
        Self { page, portal }
    }

    fn timeouts(&self) -> &PortalTimeouts {
        &self.portal.timeouts
    }

    /// Open the portal start page and return its title
    pub fn open_entry_point(&mut self) -> Result<String, ScrapeError> {
        info!("Opening {}...", self.portal.base_url);
        let timeout = PortalTimeouts::ms(self.timeouts().page_load);
        self.page.goto(&self.portal.base_url, timeout)?;

        let title = self.page.title().unwrap_or_default();
        info!("Page loaded: {}", title);
        Ok(title)
    }

    /// Click "accept all" on the cookie banner if it shows up
    pub fn accept_consent_banner(&mut self) -> ConsentOutcome {
        let button = selectors::consent_accept();
        let timeout = PortalTimeouts::ms(self.timeouts().consent);

        if !visible_within(&*self.page, &button, timeout) {
            info!("No cookie banner within {} ms, continuing", timeout.as_millis());
            return ConsentOutcome::NotShown;
        }

        info!("Cookie banner found, accepting...");
        if let Err(e) = self.page.click(&button) {
            warn!("Could not click cookie banner: {}, continuing", e);
            return ConsentOutcome::ClickFailed(e.to_string());
        }

        self.page.pause(PortalTimeouts::ms(self.timeouts().consent_settle));
        info!("Cookies accepted");
        ConsentOutcome::Accepted
    }

    /// Click the first login entry strategy that becomes visible.
    ///
    /// Returns the name of the strategy that matched.
    pub fn click_login_entry(&mut self) -> Result<&'static str, ScrapeError> {
        let per_attempt = PortalTimeouts::ms(self.timeouts().login_strategy);
        let mut tried = Vec::new();

        for (name, target) in selectors::login_entry_strategies() {
            debug!("Trying login strategy '{}': {}", name, target);
            tried.push(name.to_string());

            if !visible_within(&*self.page, &target, per_attempt) {
                continue;
            }
            match self.page.click(&target) {
                Ok(()) => {
                    info!("Login button found via '{}' strategy", name);
                    self.page.pause(PortalTimeouts::ms(self.timeouts().login_settle));
                    return Ok(name);
                }
                Err(e) => debug!("Login strategy '{}' matched but click failed: {}", name, e),
            }
        }

        error!("Login button not found with any strategy");
        Err(ScrapeError::NoStrategyMatched {
            what: "login button".to_string(),
            tried,
        })
    }

    /// Fill and submit the credential form, then classify the result
    pub fn submit_credentials(&mut self, credentials: &Credentials) -> Result<LoginSignal, ScrapeError> {
        if !credentials.is_complete() {
            return Err(ScrapeError::InvalidCredentials {
                message: "Benutzername und Passwort müssen angegeben werden".to_string(),
            });
        }

        info!("Filling login form...");
        let username = selectors::username_input();
        wait_visible(&*self.page, &username, PortalTimeouts::ms(self.timeouts().login_form))?;

        self.page.fill(&username, &credentials.username)?;
        debug!("Username entered");
        self.page.fill(&selectors::password_input(), &credentials.password)?;
        debug!("Password entered");

        self.page.click(&selectors::login_submit())?;
        info!("Login submitted, waiting for the portal...");
        self.page.pause(PortalTimeouts::ms(self.timeouts().login_result_settle));

        self.classify_login_result()
    }

    /// Order matters: a slow redirect must not be mistaken for a failure
    fn classify_login_result(&self) -> Result<LoginSignal, ScrapeError> {
        let url = self.page.current_url();
        info!("URL after login: {}", url);

        if !url.contains(&self.portal.auth_host) {
            info!("Login successful, redirected away from {}", self.portal.auth_host);
            return Ok(LoginSignal::LeftAuthHost);
        }

        let error_probe = PortalTimeouts::ms(self.timeouts().error_probe);
        if let Some(message) = text_within(&*self.page, &selectors::login_error(), error_probe) {
            error!("Login error from portal: {}", message);
            return Err(ScrapeError::InvalidCredentials { message });
        }

        let password_probe = PortalTimeouts::ms(self.timeouts().password_probe);
        if visible_within(&*self.page, &selectors::visible_password_field(), password_probe) {
            error!("Login failed, login form still visible");
            return Err(ScrapeError::InvalidCredentials {
                message: GENERIC_LOGIN_FAILURE.to_string(),
            });
        }

        warn!("Still on {} but no failure signal, assuming login succeeded", self.portal.auth_host);
        Ok(LoginSignal::NoNegativeSignal)
    }

    /// The complete login sequence. The banner tends to render twice, so it
    /// is handled again after the first click.
    pub fn login(&mut self, credentials: &Credentials) -> Result<LoginSignal, ScrapeError> {
        self.open_entry_point()?;
        self.accept_consent_banner();
        self.click_login_entry()?;
        self.accept_consent_banner();

        let form_timeout = PortalTimeouts::ms(self.timeouts().login_form);
        if !visible_within(&*self.page, &selectors::username_input(), form_timeout) {
            info!("Login form not shown yet, clicking login entry again...");
            self.click_login_entry()?;
        }

        self.submit_credentials(credentials)
    }
}
