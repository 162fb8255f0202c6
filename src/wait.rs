//! Polling convergence waits.
//!
//! Every "wait until the page has new content" step is an instance of
//! [`wait_for_stable_condition`]: poll a [`Probe`] at a fixed interval, and
//! once it reports a change, give the page a settle delay. Running out of
//! polls is not an error; the caller proceeds as if the page were stable.

use crate::dom::Dom;
use crate::error::Result;
use crate::extract::ANCHOR_SELECTOR;
use crate::page::Page;
use crate::utils::millis;
use async_trait::async_trait;

/// Polling budget for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    /// Extra delay after the condition is observed
    pub settle_ms: u64,
    /// Extra delay when the budget runs out without a change
    pub exhausted_settle_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held after this many polls
    Changed { polls: u32 },
    /// No change within the budget
    Exhausted,
}

impl WaitOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, WaitOutcome::Changed { .. })
    }
}

/// A condition re-evaluated on every poll
#[async_trait(?Send)]
pub trait Probe {
    async fn check(&mut self) -> Result<bool>;
}

/// Polls `probe` until it reports true or the budget is spent
pub async fn wait_for_stable_condition<P: Probe + ?Sized>(
    probe: &mut P,
    options: &WaitOptions,
) -> Result<WaitOutcome> {
    for poll in 1..=options.max_polls {
        tokio::time::sleep(millis(options.poll_interval_ms)).await;
        if probe.check().await? {
            ::log::debug!("Condition met after {} polls", poll);
            tokio::time::sleep(millis(options.settle_ms)).await;
            return Ok(WaitOutcome::Changed { polls: poll });
        }
    }

    ::log::debug!(
        "Condition not met after {} polls, proceeding",
        options.max_polls
    );
    tokio::time::sleep(millis(options.exhausted_settle_ms)).await;
    Ok(WaitOutcome::Exhausted)
}

/// Growth of a container's link count or content size
pub struct ContainerGrowth<'a, P: Page + ?Sized> {
    page: &'a P,
    selector: String,
    initial_links: usize,
    initial_size: usize,
}

impl<'a, P: Page + ?Sized> ContainerGrowth<'a, P> {
    /// Records the container's current size. `None` if it does not resolve
    pub async fn start(page: &'a P, selector: &str) -> Result<Option<Self>> {
        let dom = page.snapshot().await?;
        let Some((links, size)) = container_metrics(&dom, selector) else {
            return Ok(None);
        };
        Ok(Some(Self {
            page,
            selector: selector.to_string(),
            initial_links: links,
            initial_size: size,
        }))
    }
}

fn container_metrics<D: Dom>(dom: &D, selector: &str) -> Option<(usize, usize)> {
    let container = dom.query(selector)?;
    Some((
        dom.query_all_within(container, ANCHOR_SELECTOR).len(),
        dom.content_size(container),
    ))
}

#[async_trait(?Send)]
impl<P: Page + ?Sized> Probe for ContainerGrowth<'_, P> {
    async fn check(&mut self) -> Result<bool> {
        let dom = self.page.snapshot().await?;
        let Some((links, size)) = container_metrics(&dom, &self.selector) else {
            return Ok(false);
        };
        if links > self.initial_links || size > self.initial_size {
            ::log::info!(
                "New content detected: {} additional links",
                links.saturating_sub(self.initial_links)
            );
            return Ok(true);
        }
        Ok(false)
    }
}

/// Any change to the document's element count or content size
pub struct DocumentChange<'a, P: Page + ?Sized> {
    page: &'a P,
    initial: (usize, usize),
}

impl<'a, P: Page + ?Sized> DocumentChange<'a, P> {
    pub async fn start(page: &'a P) -> Result<Self> {
        let dom = page.snapshot().await?;
        Ok(Self {
            page,
            initial: document_metrics(&dom),
        })
    }
}

fn document_metrics<D: Dom>(dom: &D) -> (usize, usize) {
    match dom.body() {
        Some(body) => (dom.query_all_within(body, "*").len(), dom.content_size(body)),
        None => (0, 0),
    }
}

#[async_trait(?Send)]
impl<P: Page + ?Sized> Probe for DocumentChange<'_, P> {
    async fn check(&mut self) -> Result<bool> {
        let dom = self.page.snapshot().await?;
        Ok(document_metrics(&dom) != self.initial)
    }
}

/// Markers common sites use while content is still loading
const LOADING_SELECTORS: &[&str] = &[
    "[aria-busy=\"true\"]",
    ".loading",
    ".spinner",
    "[data-loading=\"true\"]",
];

/// Document finished loading and shows no visible loading indicator
pub struct PageSettled<'a, P: Page + ?Sized> {
    page: &'a P,
}

impl<'a, P: Page + ?Sized> PageSettled<'a, P> {
    pub fn new(page: &'a P) -> Self {
        Self { page }
    }
}

fn has_visible_loading_indicator<D: Dom>(dom: &D) -> bool {
    LOADING_SELECTORS.iter().any(|selector| {
        dom.query_all(selector)
            .into_iter()
            .any(|node| dom.is_rendered(node) && !dom.bounding_box(node).is_empty())
    })
}

#[async_trait(?Send)]
impl<P: Page + ?Sized> Probe for PageSettled<'_, P> {
    async fn check(&mut self) -> Result<bool> {
        if self.page.ready_state().await? != "complete" {
            return Ok(false);
        }
        let dom = self.page.snapshot().await?;
        Ok(!has_visible_loading_indicator(&dom))
    }
}
