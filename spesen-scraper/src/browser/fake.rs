///! Scripted page for unit tests
///!
///! Elements are keyed by the exact `Target` the flows build, clicks and key
///! presses trigger scripted effects, and time only moves through `pause`.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use super::{PageDriver, Target};
use crate::error::ScrapeError;

#[derive(Debug, Clone)]
struct FakeElement {
    text: String,
    visible: bool,
    visible_from: Duration,
}

#[derive(Debug, Clone)]
pub enum Effect {
    Show(Target, String),
    Hide(Target),
    SetUrl(String),
    OpenTab(String),
}

/// Real instant the virtual clock starts from
#[derive(Debug, Clone, Copy)]
struct Epoch(Instant);

impl Default for Epoch {
    fn default() -> Self {
        Self(Instant::now())
    }
}

#[derive(Debug, Default)]
pub struct FakePage {
    url: String,
    elements: HashMap<Target, FakeElement>,
    counts: HashMap<Target, usize>,
    texts: HashMap<Target, Vec<String>>,
    on_click: HashMap<Target, Vec<Effect>>,
    on_key: HashMap<String, Vec<Effect>>,
    failing_clicks: HashSet<Target>,
    ignored_keys: HashMap<String, usize>,
    pending_tab: Option<String>,
    epoch: Epoch,
    clock: Cell<Duration>,
    pub clicks: Vec<Target>,
    pub keys: Vec<String>,
    pub fills: Vec<(Target, String)>,
    pub visits: Vec<String>,
    pub tabs_opened: usize,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn show(&mut self, target: &Target, text: &str) {
        self.show_after(target, text, Duration::ZERO);
    }

    pub fn show_after(&mut self, target: &Target, text: &str, delay: Duration) {
        let visible_from = self.clock.get() + delay;
        self.elements.insert(
            target.clone(),
            FakeElement {
                text: text.to_string(),
                visible: true,
                visible_from,
            },
        );
    }

    pub fn hide(&mut self, target: &Target) {
        if let Some(el) = self.elements.get_mut(target) {
            el.visible = false;
        }
    }

    pub fn set_count(&mut self, target: &Target, count: usize) {
        self.counts.insert(target.clone(), count);
    }

    pub fn set_texts(&mut self, target: &Target, texts: &[&str]) {
        self.texts
            .insert(target.clone(), texts.iter().map(|s| s.to_string()).collect());
    }

    pub fn on_click(&mut self, target: &Target, effect: Effect) {
        self.on_click.entry(target.clone()).or_default().push(effect);
    }

    pub fn on_key(&mut self, key: &str, effect: Effect) {
        self.on_key.entry(key.to_string()).or_default().push(effect);
    }

    pub fn fail_clicks_on(&mut self, target: &Target) {
        self.failing_clicks.insert(target.clone());
    }

    /// The next `times` presses of `key` have no effect
    pub fn ignore_key(&mut self, key: &str, times: usize) {
        self.ignored_keys.insert(key.to_string(), times);
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.get()
    }

    pub fn clicked(&self, target: &Target) -> bool {
        self.clicks.contains(target)
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Show(t, text) => self.show(&t, &text),
                Effect::Hide(t) => self.hide(&t),
                Effect::SetUrl(url) => self.url = url,
                Effect::OpenTab(url) => self.pending_tab = Some(url),
            }
        }
    }
}

impl PageDriver for FakePage {
    fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        self.visits.push(url.to_string());
        self.url = url.to_string();
        Ok(())
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn title(&self) -> Result<String, ScrapeError> {
        Ok("Fake".to_string())
    }

    fn count(&self, target: &Target) -> Result<usize, ScrapeError> {
        if let Some(n) = self.counts.get(target) {
            return Ok(*n);
        }
        Ok(usize::from(self.is_visible(target)?))
    }

    fn is_visible(&self, target: &Target) -> Result<bool, ScrapeError> {
        Ok(self
            .elements
            .get(target)
            .is_some_and(|el| el.visible && self.clock.get() >= el.visible_from))
    }

    fn inner_text(&self, target: &Target) -> Result<String, ScrapeError> {
        self.elements
            .get(target)
            .map(|el| el.text.trim().to_string())
            .ok_or_else(|| ScrapeError::driver(format!("no element for {}", target)))
    }

    fn all_texts(&self, target: &Target) -> Result<Vec<String>, ScrapeError> {
        Ok(self.texts.get(target).cloned().unwrap_or_default())
    }

    fn click(&mut self, target: &Target) -> Result<(), ScrapeError> {
        if self.failing_clicks.contains(target) {
            return Err(ScrapeError::driver(format!("click on {} failed", target)));
        }
        if !self.is_visible(target)? {
            return Err(ScrapeError::driver(format!("{} is not visible", target)));
        }
        self.clicks.push(target.clone());
        let effects = self.on_click.get(target).cloned().unwrap_or_default();
        self.apply(effects);
        Ok(())
    }

    fn fill(&mut self, target: &Target, value: &str) -> Result<(), ScrapeError> {
        self.fills.push((target.clone(), value.to_string()));
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<(), ScrapeError> {
        self.keys.push(key.to_string());
        if let Some(left) = self.ignored_keys.get_mut(key).filter(|left| **left > 0) {
            *left -= 1;
            return Ok(());
        }
        let effects = self.on_key.get(key).cloned().unwrap_or_default();
        self.apply(effects);
        Ok(())
    }

    fn click_and_adopt_new_tab(&mut self, target: &Target, timeout: Duration) -> Result<(), ScrapeError> {
        self.pending_tab = None;
        self.click(target)?;
        match self.pending_tab.take() {
            Some(url) => {
                self.tabs_opened += 1;
                self.url = url;
                Ok(())
            }
            None => {
                self.pause(timeout);
                Err(ScrapeError::timeout("new tab", timeout))
            }
        }
    }

    fn screenshot(&self) -> Result<Vec<u8>, ScrapeError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    fn pause(&self, duration: Duration) {
        self.clock.set(self.clock.get() + duration);
    }

    fn now(&self) -> Instant {
        self.epoch.0 + self.clock.get()
    }
}
