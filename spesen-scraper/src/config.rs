use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use spesen_common::Credentials;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub portal: PortalConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default)]
    pub sandbox: bool,

    /// Chrome binary; autodetected when unset
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Host of the login sub-domain; leaving it means the login went through
    #[serde(default = "default_auth_host")]
    pub auth_host: String,

    #[serde(default)]
    pub timeouts: PortalTimeouts,
}

/// Wait budgets of the portal flows, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalTimeouts {
    pub page_load: u64,
    pub consent: u64,
    pub consent_settle: u64,
    pub login_strategy: u64,
    pub login_settle: u64,
    pub login_form: u64,
    pub login_result_settle: u64,
    pub error_probe: u64,
    pub password_probe: u64,
    pub menu_toggle: u64,
    pub menu_settle: u64,
    pub menu_item: u64,
    pub new_tab: u64,
    pub match_list: u64,
    pub modal_open: u64,
    pub modal_content: u64,
    pub modal_close: u64,
    pub field: u64,
    pub referee_field: u64,
}

impl Default for PortalTimeouts {
    fn default() -> Self {
        Self {
            page_load: 60_000,
            consent: 10_000,
            consent_settle: 2_000,
            login_strategy: 2_000,
            login_settle: 2_000,
            login_form: 10_000,
            login_result_settle: 5_000,
            error_probe: 1_000,
            password_probe: 2_000,
            menu_toggle: 2_000,
            menu_settle: 1_000,
            menu_item: 5_000,
            new_tab: 15_000,
            match_list: 10_000,
            modal_open: 5_000,
            modal_content: 5_000,
            modal_close: 2_000,
            field: 1_000,
            referee_field: 500,
        }
    }
}

impl PortalTimeouts {
    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_true")]
    pub screenshot_on_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_run_hour")]
    pub hour: u32,

    #[serde(default)]
    pub minute: u32,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default)]
    pub run_on_start: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub label: String,
    pub username: String,
    pub password: String,
}

impl AccountConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("label", &self.label)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u64 {
    3
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_base_url() -> String {
    "https://www.dfbnet.org".to_string()
}

fn default_auth_host() -> String {
    "auth.dfbnet.org".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_run_hour() -> u32 {
    3
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            chrome_path: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_host: default_auth_host(),
            timeouts: PortalTimeouts::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            screenshot_on_failure: true,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: default_run_hour(),
            minute: 0,
            max_concurrent: default_max_concurrent(),
            run_on_start: false,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            log_retention_days: default_log_retention_days(),
            browser: BrowserConfig::default(),
            portal: PortalConfig::default(),
            output: OutputConfig::default(),
            scheduler: SchedulerConfig::default(),
            accounts: Vec::new(),
        }
    }
}

impl ScraperConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ScraperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scheduler.max_concurrent == 0 {
            bail!("scheduler.max_concurrent must be at least 1");
        }
        if self.scheduler.hour > 23 || self.scheduler.minute > 59 {
            bail!(
                "scheduler time {:02}:{:02} is not a valid time of day",
                self.scheduler.hour,
                self.scheduler.minute
            );
        }

        let mut labels = HashSet::new();
        for account in &self.accounts {
            if account.label.trim().is_empty() {
                bail!("account label must not be empty");
            }
            if !labels.insert(account.label.as_str()) {
                bail!("duplicate account label: {}", account.label);
            }
        }
        Ok(())
    }

    pub fn account(&self, label: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ScraperConfig::from_toml("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.browser.window_width, 1920);
        assert_eq!(config.browser.window_height, 1080);
        assert!(config.browser.headless);
        assert_eq!(config.portal.auth_host, "auth.dfbnet.org");
        assert_eq!(config.portal.timeouts.page_load, 60_000);
        assert_eq!(config.scheduler.max_concurrent, 4);
        assert_eq!(config.scheduler.hour, 3);
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let toml = r#"
            log_level = "debug"

            [browser]
            headless = false

            [portal.timeouts]
            field = 250

            [[accounts]]
            label = "louis"
            username = "l.gaudes"
            password = "secret"
        "#;
        let config = ScraperConfig::from_toml(toml).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(!config.browser.headless);
        assert_eq!(config.browser.window_width, 1920);
        assert_eq!(config.portal.timeouts.field, 250);
        assert_eq!(config.portal.timeouts.referee_field, 500);
        assert_eq!(config.account("louis").unwrap().credentials().username, "l.gaudes");
        assert!(!format!("{:?}", config.accounts[0]).contains("secret"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(ScraperConfig::from_toml("[scheduler]\nmax_concurrent = 0").is_err());
        assert!(ScraperConfig::from_toml("[scheduler]\nhour = 24").is_err());

        let duplicate = r#"
            [[accounts]]
            label = "a"
            username = "x"
            password = "y"

            [[accounts]]
            label = "a"
            username = "z"
            password = "w"
        "#;
        assert!(ScraperConfig::from_toml(duplicate).is_err());
    }
}
