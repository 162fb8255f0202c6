// Re-export modules
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod extract;
pub mod filter;
pub mod formatter;
pub mod messages;
pub mod page;
pub mod pagination;
pub mod presenter;
pub mod results;
pub mod runner;
pub mod session;
pub mod storage;
pub mod templates;
pub mod urls;
pub mod utils;
pub mod wait;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use results::ExtractedLink;
pub use runner::Runner;
pub use session::Session;
pub use templates::Template;

use page::WebDriverPage;
use presenter::{LogPresenter, StdoutClipboard};
use std::rc::Rc;
use std::sync::Arc;
use storage::{JsonFileStore, MULTI_PAGE_STATE_KEY, Scope, Store};
use templates::TemplateStore;

/// Main builder wiring a browser tab, persisted storage and terminal output
pub struct RegionLinks {
    config: config::EngineConfig,
    auto_run_on_load: bool,
}

impl Default for RegionLinks {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionLinks {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: config::EngineConfig::default(),
            auto_run_on_load: true,
        }
    }

    /// Set the full configuration
    pub fn with_config(mut self, config: config::EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a file
    pub fn with_config_file(self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config = config::EngineConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Load configuration from a string
    pub fn with_config_str(self, config_str: &str) -> Result<Self> {
        let config = config::EngineConfig::from_json(config_str)?;
        Ok(self.with_config(config))
    }

    /// Set the directory templates and job state are persisted in
    pub fn with_storage_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    /// Set the idle timeout (watching stops if no page event for this duration)
    pub fn with_idle_timeout(mut self, timeout_seconds: u64) -> Self {
        self.config.idle_timeout_secs = timeout_seconds;
        self
    }

    /// Start the domain's auto-run templates when a page loads
    pub fn with_auto_run(mut self, enabled: bool) -> Self {
        self.auto_run_on_load = enabled;
        self
    }

    pub fn config(&self) -> &config::EngineConfig {
        &self.config
    }

    /// The persisted store, usable without a browser
    pub fn store(&self) -> Arc<JsonFileStore> {
        Arc::new(JsonFileStore::new(&self.config.storage_dir))
    }

    pub fn templates(&self) -> TemplateStore {
        TemplateStore::new(self.store())
    }

    /// Drops an interrupted multi-page job without opening a browser, so
    /// the next page load does not resume it. Returns false if none was
    /// recorded
    pub async fn cancel_job(&self) -> Result<bool> {
        let store = self.store();
        let recorded = store
            .get(Scope::Local, MULTI_PAGE_STATE_KEY)
            .await?
            .is_some();
        store.remove(Scope::Local, MULTI_PAGE_STATE_KEY).await?;
        if recorded {
            ::log::info!("Multi-page extraction cancelled");
        }
        Ok(recorded)
    }

    /// Connect to WebDriver and build a runner for the new tab
    pub async fn connect(&self) -> Result<Browser> {
        // Override the WebDriver URL with an environment variable if provided
        let config = self.config.clone().with_env_overrides();

        let page = Rc::new(
            WebDriverPage::connect(
                &config.webdriver_url,
                utils::millis(config.timings.post_click_ms),
            )
            .await?,
        );
        let runner = Runner::new(
            page.clone(),
            self.store(),
            Rc::new(LogPresenter),
            Rc::new(StdoutClipboard),
            &config,
        )
        .with_auto_run(self.auto_run_on_load);
        Ok(Browser { page, runner })
    }
}

/// A connected browser tab and the runner driving it
pub struct Browser {
    page: Rc<WebDriverPage>,
    pub runner: Runner,
}

impl Browser {
    /// End the WebDriver session
    pub async fn close(self) -> Result<()> {
        self.page.close().await
    }
}
