use crate::error::Result;
use crate::formatter::ExportMode;
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Configuration for the extraction engine and its browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Directory holding the persisted `sync.json` / `local.json` stores
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// Stop watching the tab after this many seconds without a page event
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Delays and polling budgets
    #[serde(default)]
    pub timings: Timings,
}

/// Every delay the engine uses, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    /// Fixed wait before checking a freshly loaded page
    #[serde(default = "default_resume_initial_delay_ms")]
    pub resume_initial_delay_ms: u64,

    #[serde(default = "default_loading_poll_ms")]
    pub loading_poll_ms: u64,

    #[serde(default = "default_loading_max_polls")]
    pub loading_max_polls: u32,

    /// Extra wait for client-side rendering after the page reports ready
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Poll interval while waiting for in-place content
    #[serde(default = "default_dynamic_poll_ms")]
    pub dynamic_poll_ms: u64,

    #[serde(default = "default_dynamic_max_polls")]
    pub dynamic_max_polls: u32,

    /// Wait after growth is first seen
    #[serde(default = "default_growth_settle_ms")]
    pub growth_settle_ms: u64,

    /// Wait after the container poll budget runs out
    #[serde(default = "default_exhausted_settle_ms")]
    pub exhausted_settle_ms: u64,

    /// Wait between a click and the navigation check
    #[serde(default = "default_post_click_ms")]
    pub post_click_ms: u64,

    /// Window in which repeated navigation events for one tab and URL collapse
    #[serde(default = "default_navigation_debounce_ms")]
    pub navigation_debounce_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            resume_initial_delay_ms: default_resume_initial_delay_ms(),
            loading_poll_ms: default_loading_poll_ms(),
            loading_max_polls: default_loading_max_polls(),
            settle_delay_ms: default_settle_delay_ms(),
            dynamic_poll_ms: default_dynamic_poll_ms(),
            dynamic_max_polls: default_dynamic_max_polls(),
            growth_settle_ms: default_growth_settle_ms(),
            exhausted_settle_ms: default_exhausted_settle_ms(),
            post_click_ms: default_post_click_ms(),
            navigation_debounce_ms: default_navigation_debounce_ms(),
        }
    }
}

impl Timings {
    /// No delays at all, keeping polling budgets
    pub fn immediate() -> Self {
        Self {
            resume_initial_delay_ms: 0,
            loading_poll_ms: 0,
            settle_delay_ms: 0,
            dynamic_poll_ms: 0,
            growth_settle_ms: 0,
            exhausted_settle_ms: 0,
            post_click_ms: 0,
            ..Self::default()
        }
    }

    /// Budget for the loading-indicator check after a page load
    pub fn page_ready(&self) -> WaitOptions {
        WaitOptions {
            poll_interval_ms: self.loading_poll_ms,
            max_polls: self.loading_max_polls,
            settle_ms: 0,
            exhausted_settle_ms: 0,
        }
    }

    /// Budget for scoped container growth after an in-place advance
    pub fn container_growth(&self) -> WaitOptions {
        WaitOptions {
            poll_interval_ms: self.dynamic_poll_ms,
            max_polls: self.dynamic_max_polls,
            settle_ms: self.growth_settle_ms,
            exhausted_settle_ms: self.exhausted_settle_ms,
        }
    }

    /// Budget for the unscoped whole-document fallback
    pub fn document_change(&self) -> WaitOptions {
        WaitOptions {
            poll_interval_ms: self.dynamic_poll_ms,
            max_polls: self.dynamic_max_polls,
            settle_ms: self.growth_settle_ms,
            exhausted_settle_ms: 0,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            storage_dir: default_storage_dir(),
            idle_timeout_secs: default_idle_timeout_secs(),
            timings: Timings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        Ok(config)
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }
}

/// The synced user preference record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub export_mode: ExportMode,

    #[serde(default)]
    pub clean_urls: bool,

    #[serde(default = "default_true")]
    pub ignore_nested_anchors: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            export_mode: ExportMode::default(),
            clean_urls: false,
            ignore_nested_anchors: true,
        }
    }
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_storage_dir() -> String {
    ".region-links".to_string()
}

/// Default idle timeout, 5 minutes
fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_resume_initial_delay_ms() -> u64 {
    500
}

fn default_loading_poll_ms() -> u64 {
    300
}

fn default_loading_max_polls() -> u32 {
    20
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_dynamic_poll_ms() -> u64 {
    500
}

fn default_dynamic_max_polls() -> u32 {
    15
}

fn default_growth_settle_ms() -> u64 {
    1000
}

fn default_exhausted_settle_ms() -> u64 {
    1500
}

fn default_post_click_ms() -> u64 {
    300
}

fn default_navigation_debounce_ms() -> u64 {
    2000
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert_eq!(config.idle_timeout_secs, 300);
        assert_eq!(config.timings, Timings::default());
        assert_eq!(config.timings.dynamic_max_polls, 15);
        assert_eq!(config.timings.navigation_debounce_ms, 2000);
    }

    #[test]
    fn test_partial_timings_override() {
        let config =
            EngineConfig::from_json(r#"{"timings": {"post_click_ms": 50}, "storage_dir": "/tmp/rl"}"#)
                .unwrap();
        assert_eq!(config.timings.post_click_ms, 50);
        assert_eq!(config.timings.settle_delay_ms, 1000);
        assert_eq!(config.storage_dir, "/tmp/rl");
    }

    #[test]
    fn test_wait_budgets() {
        let timings = Timings::default();
        let growth = timings.container_growth();
        assert_eq!(growth.max_polls, 15);
        assert_eq!(growth.exhausted_settle_ms, 1500);
        assert_eq!(timings.document_change().exhausted_settle_ms, 0);
        assert_eq!(timings.page_ready().max_polls, 20);
        assert_eq!(Timings::immediate().container_growth().poll_interval_ms, 0);
    }

    #[test]
    fn test_preferences_record_shape() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"exportMode":"markdown","cleanUrls":true}"#).unwrap();
        assert_eq!(prefs.export_mode, ExportMode::Markdown);
        assert!(prefs.clean_urls);
        assert!(prefs.ignore_nested_anchors);

        let json = serde_json::to_value(Preferences::default()).unwrap();
        assert_eq!(json["exportMode"], "urls");
        assert_eq!(json["ignoreNestedAnchors"], true);
    }
}
