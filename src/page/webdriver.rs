use super::{Activation, NodeKey, Page};
use crate::dom::Snapshot;
use crate::error::{Error, Result};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

/// Tags every element with the layout facts the extractors need and returns
/// the serialized document. Existing `data-rl-id` handles are kept so keys
/// stay stable between snapshots of the same document.
const ANNOTATE_SCRIPT: &str = r#"
const round = (v) => Math.round(v * 100) / 100;
if (window.__rlNextId === undefined) { window.__rlNextId = 1; }
for (const el of document.querySelectorAll('*')) {
  if (!el.hasAttribute('data-rl-id')) {
    el.setAttribute('data-rl-id', String(window.__rlNextId++));
  }
  const r = el.getBoundingClientRect();
  el.setAttribute('data-rl-box', [r.left, r.top, r.width, r.height].map(round).join(','));
  const tag = el.tagName.toLowerCase();
  const hidden = tag !== 'body' && tag !== 'html' && el.offsetParent === null
    && getComputedStyle(el).position !== 'fixed';
  el.toggleAttribute('data-rl-hidden', hidden);
  el.toggleAttribute('data-rl-pointer', getComputedStyle(el).cursor === 'pointer');
  el.toggleAttribute('data-rl-click', typeof el.onclick === 'function');
  if (tag === 'a' && el.hasAttribute('href')) {
    el.setAttribute('data-rl-href', el.href);
    el.toggleAttribute('data-rl-nested', !!(el.parentElement && el.parentElement.closest('a[href]')));
  }
}
return document.documentElement.outerHTML;
"#;

/// Clicks the element after arming an unload probe. Returns the URL at click time.
const ACTIVATE_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) { return null; }
window.__rlUnloaded = false;
window.__rlProbe = arguments[1];
window.addEventListener('beforeunload', () => { window.__rlUnloaded = true; }, { once: true });
try { el.scrollIntoView({ behavior: 'instant', block: 'center' }); } catch (e) {}
el.click();
return location.href;
"#;

/// True once the probe document is gone, unloading, or showing another URL
const NAVIGATED_SCRIPT: &str = r#"
return window.__rlProbe !== arguments[1]
  || window.__rlUnloaded === true
  || location.href !== arguments[0];
"#;

const SCROLL_INTO_VIEW_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (el) { el.scrollIntoView({ behavior: 'instant', block: 'center' }); }
"#;

/// Common WebDriver endpoints tried when the configured one refuses
const FALLBACK_WEBDRIVER_URLS: &[&str] = &[
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// A browser tab driven over WebDriver
pub struct WebDriverPage {
    client: Client,
    post_click_wait: Duration,
}

impl WebDriverPage {
    pub fn new(client: Client, post_click_wait: Duration) -> Self {
        Self {
            client,
            post_click_wait,
        }
    }

    /// Connects to `webdriver_url`, falling back to well-known local endpoints
    pub async fn connect(webdriver_url: &str, post_click_wait: Duration) -> Result<Self> {
        let client = connect_to_webdriver(webdriver_url).await?;
        Ok(Self::new(client, post_click_wait))
    }

    /// Ends the WebDriver session
    pub async fn close(&self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }

    async fn run(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.client.execute(script, args).await?)
    }
}

async fn connect_to_webdriver(webdriver_url: &str) -> Result<Client> {
    match ClientBuilder::native().connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    for url in FALLBACK_WEBDRIVER_URLS {
        if *url == webdriver_url {
            continue;
        }

        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = ClientBuilder::native().connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(Error::Session(format!(
        "no WebDriver server reachable at {} or the fallback endpoints",
        webdriver_url
    )))
}

#[async_trait(?Send)]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<()> {
        ::log::info!("Navigating to {}", url);
        self.client.goto(url).await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let html = self.run(ANNOTATE_SCRIPT, Vec::new()).await?;
        let html = html
            .as_str()
            .ok_or_else(|| Error::Page("annotation script returned no document".to_string()))?;
        let url = self.client.current_url().await?;
        let snapshot = Snapshot::parse(html).with_base_url(url);
        ::log::trace!("Snapshot taken with {} elements", snapshot.element_count());
        Ok(snapshot)
    }

    async fn current_url(&self) -> Result<Url> {
        Ok(self.client.current_url().await?)
    }

    async fn ready_state(&self) -> Result<String> {
        let state = self.run("return document.readyState;", Vec::new()).await?;
        Ok(state.as_str().unwrap_or_default().to_string())
    }

    async fn scroll_into_view(&self, key: &NodeKey) -> Result<()> {
        self.run(SCROLL_INTO_VIEW_SCRIPT, vec![json!(key.css())])
            .await?;
        Ok(())
    }

    async fn scroll_to_origin(&self) -> Result<()> {
        self.run("window.scrollTo(0, 0);", Vec::new()).await?;
        Ok(())
    }

    async fn scroll_by_viewport(&self) -> Result<()> {
        self.run("window.scrollBy(0, window.innerHeight);", Vec::new())
            .await?;
        Ok(())
    }

    async fn activate(&self, key: &NodeKey) -> Result<Activation> {
        let probe = crate::utils::now_millis().to_string();
        let clicked = self
            .run(ACTIVATE_SCRIPT, vec![json!(key.css()), json!(probe)])
            .await?;
        let Some(url_at_click) = clicked.as_str().map(str::to_string) else {
            return Err(Error::Page(format!("element {} vanished before click", key.0)));
        };

        tokio::time::sleep(self.post_click_wait).await;

        // A script error here usually means the old document is being torn down
        let navigated = match self
            .run(NAVIGATED_SCRIPT, vec![json!(url_at_click), json!(probe)])
            .await
        {
            Ok(value) => value.as_bool().unwrap_or(true),
            Err(e) => {
                ::log::debug!("Probe check failed after click, assuming navigation: {}", e);
                true
            }
        };

        if navigated {
            ::log::info!("Navigation detected after activating {}", key.0);
            Ok(Activation::Navigated)
        } else {
            ::log::debug!("No navigation after activating {}", key.0);
            Ok(Activation::InPlace)
        }
    }
}
