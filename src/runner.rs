//! Automation layer: drives one tab, dispatches a command and follows any
//! multi-page job across the page loads it causes.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::messages::{self, Command, Response};
use crate::page::Page;
use crate::presenter::{self, Clipboard, Presenter};
use crate::session::Session;
use crate::storage::Store;
use crate::utils::millis;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

const DEFAULT_TAB: &str = "main";

/// Collapses repeated navigation events for the same tab and URL
#[derive(Debug)]
pub struct NavigationDebouncer {
    window: Duration,
    seen: HashMap<(String, String), Instant>,
}

impl NavigationDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    /// True if this event should be handled, false if it repeats one seen
    /// within the window
    pub fn should_handle(&mut self, tab: &str, url: &str, now: Instant) -> bool {
        let window = self.window;
        self.seen
            .retain(|_, at| now.saturating_duration_since(*at) < window);

        let key = (tab.to_string(), url.to_string());
        if self.seen.contains_key(&key) {
            ::log::debug!("Ignoring duplicate navigation event for {}", url);
            return false;
        }
        self.seen.insert(key, now);
        true
    }
}

pub struct Runner {
    page: Rc<dyn Page>,
    store: Arc<dyn Store>,
    presenter: Rc<dyn Presenter>,
    clipboard: Rc<dyn Clipboard>,
    session: Session,
    debouncer: NavigationDebouncer,
    tab: String,
    auto_run_on_load: bool,
    poll_interval: Duration,
    idle_timeout: Duration,
}

impl Runner {
    pub fn new(
        page: Rc<dyn Page>,
        store: Arc<dyn Store>,
        presenter: Rc<dyn Presenter>,
        clipboard: Rc<dyn Clipboard>,
        config: &EngineConfig,
    ) -> Self {
        let timings = config.timings;
        Self {
            session: Session::new(page.clone(), store.clone(), presenter.clone(), timings),
            page,
            store,
            presenter,
            clipboard,
            debouncer: NavigationDebouncer::new(millis(timings.navigation_debounce_ms)),
            tab: DEFAULT_TAB.to_string(),
            auto_run_on_load: true,
            poll_interval: millis(timings.loading_poll_ms),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }
    }

    /// Names the tab in navigation events
    pub fn with_tab(mut self, tab: impl Into<String>) -> Self {
        self.tab = tab.into();
        self
    }

    /// Whether page loads start the domain's auto-run templates
    pub fn with_auto_run(mut self, enabled: bool) -> Self {
        self.auto_run_on_load = enabled;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Loads `url` and handles it like any other page load
    pub async fn open(&mut self, url: &str) -> Result<()> {
        ::log::info!("Opening {}", url);
        self.page.goto(url).await?;
        let current = self.page.current_url().await?;
        self.on_load(&current).await
    }

    /// Sends one command to the page's session
    pub async fn dispatch(&mut self, command: Command) -> Result<Response> {
        let response = messages::dispatch(&self.session, command).await?;
        self.deliver_copy().await?;
        Ok(response)
    }

    /// Follows an in-flight job until it ends or the tab goes idle
    pub async fn watch(&mut self) -> Result<()> {
        let mut last_url = self.page.current_url().await?;
        let mut last_event = Instant::now();

        while self.session.engine().job_in_flight().await? {
            if last_event.elapsed() >= self.idle_timeout {
                ::log::warn!(
                    "No page activity for {} seconds, leaving the job persisted",
                    self.idle_timeout.as_secs()
                );
                break;
            }

            let url = self.page.current_url().await?;
            if url != last_url {
                ::log::info!("Navigation observed: {}", url);
                last_url = url.clone();
                last_event = Instant::now();
                self.on_load(&url).await?;
                continue;
            }

            // Same URL: a reload or a route change the URL did not reflect
            match self.session.resume_multipage().await? {
                Some(outcome) => {
                    ::log::debug!("Resumed job ended with {:?}", outcome);
                    last_event = Instant::now();
                    self.deliver_copy().await?;
                }
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
        Ok(())
    }

    /// A fresh document: continue the job if one is in flight, otherwise
    /// start the domain's auto-run templates
    async fn on_load(&mut self, url: &Url) -> Result<()> {
        if !self
            .debouncer
            .should_handle(&self.tab, url.as_str(), Instant::now())
        {
            return Ok(());
        }

        if self.session.engine().job_in_flight().await? {
            if let Some(outcome) = self.session.engine().resume().await? {
                ::log::debug!("Resumed job ended with {:?}", outcome);
            }
        } else if self.auto_run_on_load {
            self.run_auto_templates(url).await?;
        }
        self.deliver_copy().await
    }

    async fn run_auto_templates(&self, url: &Url) -> Result<()> {
        let domain = url.host_str().unwrap_or_default();
        for template in self.session.templates().auto_run_for(domain).await? {
            ::log::info!("Auto-running template {} on {}", template.name, domain);
            let name = template.name.clone();
            if let Err(e) = self.session.run_template(template, true).await {
                ::log::warn!("Auto-run of {} failed: {}", name, e);
                continue;
            }
            // One job per tab; the rest wait for the next visit
            if self.session.engine().job_in_flight().await? {
                break;
            }
        }
        Ok(())
    }

    async fn deliver_copy(&self) -> Result<()> {
        presenter::deliver_pending_copy(
            self.store.as_ref(),
            self.clipboard.as_ref(),
            self.presenter.as_ref(),
        )
        .await?;
        Ok(())
    }
}
