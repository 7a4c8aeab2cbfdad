///! Chrome-backed page driver
///!
///! One `ChromeSession` owns exactly one Chrome process. Targets are
///! resolved in the page by a small injected script; clicks go through
///! `headless_chrome`'s native mouse events on the resolved element so the
///! portal sees a real user gesture (needed for the new-tab handoff).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info, warn};

use super::wait::{self, POLL_INTERVAL};
use super::{PageDriver, Target};
use crate::config::BrowserConfig;
use crate::error::ScrapeError;

const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(20);
const MARK_ATTRIBUTE: &str = "data-spesen-mark";

/// Resolves a serialized `Target` relative to the document and performs one
/// action on it. Always returns a JSON string.
const RESOLVER_JS: &str = r#"
(function (spec, action, arg) {
  function ownText(el) {
    var s = '';
    for (var i = 0; i < el.childNodes.length; i++) {
      if (el.childNodes[i].nodeType === 3) { s += el.childNodes[i].textContent; }
    }
    return s.replace(/\s+/g, ' ').trim();
  }
  function candidates(t) {
    var root = document;
    if (t.parent) {
      root = resolve(t.parent);
      if (!root) { return []; }
    }
    var found = [];
    var loc = t.locator;
    if (loc.kind === 'css') {
      found = Array.prototype.slice.call(root.querySelectorAll(loc.value));
    } else if (loc.kind === 'xpath') {
      var snap = document.evaluate(loc.value, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
      for (var i = 0; i < snap.snapshotLength; i++) {
        var n = snap.snapshotItem(i);
        if (n && n.nodeType === 1) { found.push(n); }
      }
    } else if (loc.kind === 'own_text') {
      var re = new RegExp(loc.value);
      var scope = root === document ? document.body : root;
      var all = scope ? scope.querySelectorAll('*') : [];
      for (var j = 0; j < all.length; j++) {
        var own = ownText(all[j]);
        if (own && re.test(own)) { found.push(all[j]); }
      }
    }
    if (t.has_text) {
      var hre = new RegExp(t.has_text);
      found = found.filter(function (el) { return hre.test(el.textContent || ''); });
    }
    return found;
  }
  function pick(t, list) {
    if (!list.length) { return null; }
    if (t.pick.kind === 'first') { return list[0]; }
    if (t.pick.kind === 'last') { return list[list.length - 1]; }
    return list[t.pick.value] || null;
  }
  function resolve(t) { return pick(t, candidates(t)); }
  function visible(el) {
    if (!el) { return false; }
    var style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') { return false; }
    var rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  }
  function text(el) { return (el.innerText || el.textContent || '').trim(); }
  var el;
  switch (action) {
    case 'count': return JSON.stringify(candidates(spec).length);
    case 'visible': return JSON.stringify(visible(resolve(spec)));
    case 'text':
      el = resolve(spec);
      return JSON.stringify(el ? text(el) : null);
    case 'texts': return JSON.stringify(candidates(spec).map(text));
    case 'mark':
      el = resolve(spec);
      if (!el) { return JSON.stringify(false); }
      el.setAttribute('data-spesen-mark', arg);
      return JSON.stringify(true);
    case 'clear':
      el = resolve(spec);
      if (!el) { return JSON.stringify(false); }
      el.value = '';
      el.dispatchEvent(new Event('input', { bubbles: true }));
      return JSON.stringify(true);
    case 'ready': return JSON.stringify(document.readyState !== 'loading');
  }
  return JSON.stringify(null);
})
"#;

pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    mark_seq: u64,
}

impl ChromeSession {
    /// Launch Chrome and open the working tab
    pub fn start(config: &BrowserConfig) -> Result<Self, ScrapeError> {
        info!(
            "Starting browser (headless={}, {}x{})",
            config.headless, config.window_width, config.window_height
        );

        let launch_options = LaunchOptions {
            headless: config.headless,
            sandbox: config.sandbox,
            window_size: Some((config.window_width, config.window_height)),
            path: config.chrome_path.clone(),
            idle_browser_timeout: Duration::from_secs(config.idle_timeout_secs),
            ..Default::default()
        };

        let browser = Browser::new(launch_options)
            .map_err(|e| ScrapeError::Session(format!("Failed to launch browser: {}", e)))?;

        // A failure here drops `browser`, which kills the process again
        let tab = browser
            .new_tab()
            .map_err(|e| ScrapeError::Session(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(DEFAULT_ACTION_TIMEOUT);

        info!("Browser started");

        Ok(Self {
            browser: Some(browser),
            tab,
            mark_seq: 0,
        })
    }

    /// Close all tabs and terminate the browser process
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(browser) = self.browser.take() else {
            return;
        };
        info!("Closing browser...");

        match browser.get_tabs().lock() {
            Ok(tabs) => {
                for tab in tabs.iter() {
                    if let Err(e) = tab.close(false) {
                        debug!("Failed to close tab: {}", e);
                    }
                }
            }
            Err(e) => warn!("Tab list unavailable during shutdown: {}", e),
        }

        drop(browser);
        info!("Browser closed");
    }

    fn run(&self, target: Option<&Target>, action: &str, arg: &str) -> Result<serde_json::Value, ScrapeError> {
        let spec = target.map(Target::to_json).unwrap_or_else(|| "null".to_string());
        let script = format!(
            "{}({}, {}, {})",
            RESOLVER_JS,
            spec,
            serde_json::to_string(action)?,
            serde_json::to_string(arg)?
        );

        let result = self.tab.evaluate(&script, false).map_err(ScrapeError::driver)?;
        let raw = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScrapeError::driver(format!("resolver returned nothing for '{}'", action)))?;

        Ok(serde_json::from_str(raw)?)
    }

    /// Tag the picked element so the native element API can address it
    fn mark(&mut self, target: &Target) -> Result<String, ScrapeError> {
        self.mark_seq += 1;
        let mark = self.mark_seq.to_string();
        match self.run(Some(target), "mark", &mark)? {
            serde_json::Value::Bool(true) => Ok(format!("[{}=\"{}\"]", MARK_ATTRIBUTE, mark)),
            _ => Err(ScrapeError::driver(format!("no element for {}", target))),
        }
    }

    fn tab_ids(&self) -> Result<HashSet<String>, ScrapeError> {
        let browser = self.browser()?;
        let tabs = browser.get_tabs().lock().map_err(ScrapeError::driver)?;
        Ok(tabs.iter().map(|t| t.get_target_id().to_string()).collect())
    }

    fn new_tab_since(&self, known: &HashSet<String>) -> Result<Option<Arc<Tab>>, ScrapeError> {
        let browser = self.browser()?;
        let tabs = browser.get_tabs().lock().map_err(ScrapeError::driver)?;
        Ok(tabs
            .iter()
            .find(|t| !known.contains(t.get_target_id().as_str()))
            .cloned())
    }

    fn browser(&self) -> Result<&Browser, ScrapeError> {
        self.browser
            .as_ref()
            .ok_or_else(|| ScrapeError::Session("browser already stopped".to_string()))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PageDriver for ChromeSession {
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        self.tab.set_default_timeout(timeout);
        let navigated = self.tab.navigate_to(url).map(|_| ()).map_err(ScrapeError::driver);
        self.tab.set_default_timeout(DEFAULT_ACTION_TIMEOUT);
        navigated?;

        wait::wait_until(&*self, timeout, "DOM ready", |page| {
            Ok(page.current_url() != "about:blank"
                && page.run(None, "ready", "")? == serde_json::Value::Bool(true))
        })
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn title(&self) -> Result<String, ScrapeError> {
        self.tab.get_title().map_err(ScrapeError::driver)
    }

    fn count(&self, target: &Target) -> Result<usize, ScrapeError> {
        let value = self.run(Some(target), "count", "")?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    fn is_visible(&self, target: &Target) -> Result<bool, ScrapeError> {
        Ok(self.run(Some(target), "visible", "")?.as_bool().unwrap_or(false))
    }

    fn inner_text(&self, target: &Target) -> Result<String, ScrapeError> {
        match self.run(Some(target), "text", "")? {
            serde_json::Value::String(s) => Ok(s),
            _ => Err(ScrapeError::driver(format!("no element for {}", target))),
        }
    }

    fn all_texts(&self, target: &Target) -> Result<Vec<String>, ScrapeError> {
        Ok(serde_json::from_value(self.run(Some(target), "texts", "")?)?)
    }

    fn click(&mut self, target: &Target) -> Result<(), ScrapeError> {
        let selector = self.mark(target)?;
        let element = self.tab.find_element(&selector).map_err(ScrapeError::driver)?;
        element.click().map_err(ScrapeError::driver)?;
        Ok(())
    }

    fn fill(&mut self, target: &Target, value: &str) -> Result<(), ScrapeError> {
        self.run(Some(target), "clear", "")?;
        let selector = self.mark(target)?;
        let element = self.tab.find_element(&selector).map_err(ScrapeError::driver)?;
        element.type_into(value).map_err(ScrapeError::driver)?;
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<(), ScrapeError> {
        self.tab.press_key(key).map_err(ScrapeError::driver)?;
        Ok(())
    }

    fn click_and_adopt_new_tab(&mut self, target: &Target, timeout: Duration) -> Result<(), ScrapeError> {
        let known = self.tab_ids()?;
        self.click(target)?;

        let deadline = Instant::now() + timeout;
        let new_tab = loop {
            if let Some(tab) = self.new_tab_since(&known)? {
                break tab;
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::timeout("new tab", timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        new_tab.set_default_timeout(timeout);
        new_tab.wait_until_navigated().map_err(ScrapeError::driver)?;
        new_tab.set_default_timeout(DEFAULT_ACTION_TIMEOUT);
        if let Err(e) = new_tab.activate() {
            debug!("Could not bring new tab to front: {}", e);
        }

        self.tab = new_tab;
        Ok(())
    }

    fn screenshot(&self) -> Result<Vec<u8>, ScrapeError> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(ScrapeError::driver)
    }

    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
