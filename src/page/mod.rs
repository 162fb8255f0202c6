//! The live page an extraction job runs against.

pub mod webdriver;

pub use crate::dom::NodeKey;
pub use webdriver::WebDriverPage;

use crate::dom::Snapshot;
use crate::error::Result;
use async_trait::async_trait;
use url::Url;

/// Outcome of activating a control on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The document unloaded or its URL changed
    Navigated,
    /// The document stayed in place (show-more, client-side update)
    InPlace,
}

/// Browser tab capability.
///
/// A snapshot is a point-in-time copy; every method that changes the page
/// invalidates earlier snapshots except for their [`NodeKey`] handles.
#[async_trait(?Send)]
pub trait Page {
    /// Loads `url` in the tab
    async fn goto(&self, url: &str) -> Result<()>;

    /// Serializes the current document with layout annotations
    async fn snapshot(&self) -> Result<Snapshot>;

    async fn current_url(&self) -> Result<Url>;

    /// `document.readyState`
    async fn ready_state(&self) -> Result<String>;

    /// Scrolls the element to the middle of the viewport
    async fn scroll_into_view(&self, key: &NodeKey) -> Result<()>;

    /// Scrolls the window back to the top-left corner
    async fn scroll_to_origin(&self) -> Result<()>;

    /// Scrolls down by one viewport height
    async fn scroll_by_viewport(&self) -> Result<()>;

    /// Dispatches a single click on the element and reports whether the
    /// document navigated away. Best effort: exotic widgets may ignore it.
    async fn activate(&self, key: &NodeKey) -> Result<Activation>;
}
