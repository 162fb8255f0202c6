//! Fixtures shared by unit tests: a scripted page and recording collaborators.

use crate::dom::{NodeKey, Snapshot};
use crate::error::{Error, Result};
use crate::page::{Activation, Page};
use crate::presenter::{Clipboard, Notice, NoticeKind, Presenter};
use crate::results::ExtractedLink;
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use url::Url;

/// One document the scripted page can show
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub html: String,
}

impl Document {
    pub fn new(url: &str, html: String) -> Self {
        Self {
            url: url.to_string(),
            html,
        }
    }
}

/// A page that walks through a fixed list of documents.
///
/// Each activation moves to the next document; it counts as a navigation
/// when the next document's URL differs. With no next document the click
/// does nothing. An in-place lag keeps showing the previous document for
/// that many snapshots after an in-place click.
pub struct ScriptedPage {
    documents: Vec<Document>,
    current: Cell<usize>,
    activations: RefCell<Vec<NodeKey>>,
    origin_scrolls: Cell<usize>,
    viewport_scrolls: Cell<usize>,
    /// Documents swapped in, in order, on each viewport scroll
    scroll_documents: RefCell<Vec<String>>,
    scroll_html: RefCell<Option<String>>,
    fail_snapshots: Cell<bool>,
    in_place_lag: Cell<usize>,
    /// Previous document index and the snapshots it is still shown for
    lagging: Cell<Option<(usize, usize)>>,
}

impl ScriptedPage {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            current: Cell::new(0),
            activations: RefCell::new(Vec::new()),
            origin_scrolls: Cell::new(0),
            viewport_scrolls: Cell::new(0),
            scroll_documents: RefCell::new(Vec::new()),
            scroll_html: RefCell::new(None),
            fail_snapshots: Cell::new(false),
            in_place_lag: Cell::new(0),
            lagging: Cell::new(None),
        }
    }

    pub fn single(url: &str, html: String) -> Self {
        Self::new(vec![Document::new(url, html)])
    }

    pub fn with_scroll_documents(self, documents: Vec<String>) -> Self {
        *self.scroll_documents.borrow_mut() = documents;
        self
    }

    pub fn with_in_place_lag(self, snapshots: usize) -> Self {
        self.in_place_lag.set(snapshots);
        self
    }

    pub fn current_index(&self) -> usize {
        self.current.get()
    }

    /// Shows document `index` as if it had just loaded
    pub fn load(&self, index: usize) {
        self.current.set(index);
        *self.scroll_html.borrow_mut() = None;
        self.lagging.set(None);
    }

    pub fn activations(&self) -> Vec<NodeKey> {
        self.activations.borrow().clone()
    }

    pub fn origin_scrolls(&self) -> usize {
        self.origin_scrolls.get()
    }

    pub fn viewport_scrolls(&self) -> usize {
        self.viewport_scrolls.get()
    }

    pub fn fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.set(fail);
    }

    fn document(&self) -> &Document {
        &self.documents[self.current.get()]
    }
}

#[async_trait(?Send)]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let index = self
            .documents
            .iter()
            .position(|d| d.url == url)
            .ok_or_else(|| Error::Page(format!("no scripted document for {}", url)))?;
        self.load(index);
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        if self.fail_snapshots.get() {
            return Err(Error::Page("snapshot failed".to_string()));
        }
        let html = match self.lagging.get() {
            Some((previous, remaining)) => {
                self.lagging
                    .set((remaining > 1).then_some((previous, remaining - 1)));
                self.documents[previous].html.clone()
            }
            None => self
                .scroll_html
                .borrow()
                .clone()
                .unwrap_or_else(|| self.document().html.clone()),
        };
        Ok(Snapshot::parse(&html).with_base_url(Url::parse(&self.document().url)?))
    }

    async fn current_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.document().url)?)
    }

    async fn ready_state(&self) -> Result<String> {
        Ok("complete".to_string())
    }

    async fn scroll_into_view(&self, _key: &NodeKey) -> Result<()> {
        Ok(())
    }

    async fn scroll_to_origin(&self) -> Result<()> {
        self.origin_scrolls.set(self.origin_scrolls.get() + 1);
        Ok(())
    }

    async fn scroll_by_viewport(&self) -> Result<()> {
        self.viewport_scrolls.set(self.viewport_scrolls.get() + 1);
        let mut queue = self.scroll_documents.borrow_mut();
        if !queue.is_empty() {
            *self.scroll_html.borrow_mut() = Some(queue.remove(0));
        }
        Ok(())
    }

    async fn activate(&self, key: &NodeKey) -> Result<Activation> {
        self.activations.borrow_mut().push(key.clone());
        let from = self.current.get();
        if from + 1 >= self.documents.len() {
            return Ok(Activation::InPlace);
        }
        self.load(from + 1);
        if self.documents[from].url != self.documents[from + 1].url {
            return Ok(Activation::Navigated);
        }
        let lag = self.in_place_lag.get();
        if lag > 0 {
            self.lagging.set(Some((from, lag)));
        }
        Ok(Activation::InPlace)
    }
}

/// Captures everything shown to the user
#[derive(Default)]
pub struct RecordingPresenter {
    notices: RefCell<Vec<Notice>>,
    progress: RefCell<Vec<(u32, u32, usize)>>,
    hides: Cell<usize>,
    results: RefCell<Vec<Vec<ExtractedLink>>>,
    manual_copies: RefCell<Vec<String>>,
}

impl RecordingPresenter {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices
            .borrow()
            .iter()
            .filter(|n| n.kind == NoticeKind::Error)
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn progress(&self) -> Vec<(u32, u32, usize)> {
        self.progress.borrow().clone()
    }

    pub fn hides(&self) -> usize {
        self.hides.get()
    }

    pub fn results(&self) -> Vec<Vec<ExtractedLink>> {
        self.results.borrow().clone()
    }

    pub fn manual_copies(&self) -> Vec<String> {
        self.manual_copies.borrow().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn notify(&self, notice: Notice) {
        self.notices.borrow_mut().push(notice);
    }

    fn show_progress(&self, current_page: u32, max_pages: u32, link_count: usize) {
        self.progress
            .borrow_mut()
            .push((current_page, max_pages, link_count));
    }

    fn hide_progress(&self) {
        self.hides.set(self.hides.get() + 1);
    }

    fn show_results(&self, links: &[ExtractedLink]) {
        self.results.borrow_mut().push(links.to_vec());
    }

    fn show_manual_copy(&self, text: &str) {
        self.manual_copies.borrow_mut().push(text.to_string());
    }
}

#[derive(Default)]
pub struct RecordingClipboard {
    written: RefCell<Vec<String>>,
}

impl RecordingClipboard {
    pub fn written(&self) -> Vec<String> {
        self.written.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Clipboard for RecordingClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        self.written.borrow_mut().push(text.to_string());
        Ok(())
    }
}

/// A clipboard that rejects every write, like a page without focus
pub struct FailingClipboard;

#[async_trait(?Send)]
impl Clipboard for FailingClipboard {
    async fn write_text(&self, _text: &str) -> Result<()> {
        Err(Error::Clipboard("Document is not focused".to_string()))
    }
}

/// A laid-out results page: `urls` as list items inside `ul#results`,
/// stacked 30px apart, plus an optional next-page control
pub fn list_page(urls: &[&str], next: Option<&str>) -> String {
    let items: String = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                r#"<li><a href="{url}" data-rl-box="20,{top},200,20">Item {i}</a></li>"#,
                url = url,
                top = 20 + i * 30,
                i = i
            )
        })
        .collect();
    let next = next.map(|control| control.to_string()).unwrap_or_default();
    format!(
        r#"<html><head></head><body data-rl-box="0,0,1000,2000"><ul id="results" data-rl-box="10,10,400,{height}">{items}</ul><nav>{next}</nav></body></html>"#,
        height = 30 * urls.len() + 20,
        items = items,
        next = next
    )
}

/// A standard `rel=next` pagination link
pub fn next_link(href: &str) -> String {
    format!(r#"<a href="{}" rel="next" data-rl-id="next" data-rl-box="20,900,60,20">Next</a>"#, href)
}

/// A "show more" button that loads content in place
pub fn show_more_button() -> String {
    r#"<button class="load-more" data-rl-id="more" data-rl-box="20,900,100,30">Show more</button>"#.to_string()
}
