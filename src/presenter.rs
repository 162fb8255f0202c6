//! User-facing surfaces: notices, progress, results and the clipboard.

use crate::error::{Error, Result};
use crate::results::{ExtractedLink, PendingAutoCopy};
use crate::storage::{self, PENDING_AUTO_COPY_KEY, Scope, Store};
use async_trait::async_trait;
use std::io::Write;

/// Age after which an unclaimed auto-copy record is shown for manual copy
/// instead of being written to the clipboard
pub const PENDING_COPY_TTL_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// A short message for the user (a toast, in a browser)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// Where extraction output and job progress are shown
pub trait Presenter {
    fn notify(&self, notice: Notice);

    /// Multi-page progress, rebuilt from persisted counters after a reload
    fn show_progress(&self, current_page: u32, max_pages: u32, link_count: usize);

    fn hide_progress(&self);

    /// Interactive review of extracted links
    fn show_results(&self, links: &[ExtractedLink]);

    /// Last resort when the clipboard refuses a write: show the text so the
    /// user can copy it by hand
    fn show_manual_copy(&self, text: &str);
}

#[async_trait(?Send)]
pub trait Clipboard {
    async fn write_text(&self, text: &str) -> Result<()>;
}

/// Leaves formatted output for whichever surface delivers it next
pub async fn stash_pending_copy<S: Store + ?Sized>(store: &S, text: String, count: usize) -> Result<()> {
    let pending = PendingAutoCopy {
        text,
        count,
        timestamp: crate::utils::now_millis(),
    };
    storage::save(store, Scope::Local, PENDING_AUTO_COPY_KEY, &pending).await?;
    ::log::info!("Stored {} links for auto-copy", count);
    Ok(())
}

/// Writes a pending auto-copy record to the clipboard and clears the slot.
///
/// Falls back to a manual-copy presentation when the write is rejected or
/// the record has gone stale, so the output is never lost. Returns the
/// number of links delivered.
pub async fn deliver_pending_copy<S, C>(
    store: &S,
    clipboard: &C,
    presenter: &dyn Presenter,
) -> Result<Option<usize>>
where
    S: Store + ?Sized,
    C: Clipboard + ?Sized,
{
    let Some(pending) =
        storage::load::<PendingAutoCopy, _>(store, Scope::Local, PENDING_AUTO_COPY_KEY).await?
    else {
        return Ok(None);
    };
    store.remove(Scope::Local, PENDING_AUTO_COPY_KEY).await?;

    let age = crate::utils::now_millis() - pending.timestamp;
    if age > PENDING_COPY_TTL_MS {
        ::log::warn!("Auto-copy record is {} ms old, showing it for manual copy", age);
        presenter.show_manual_copy(&pending.text);
        return Ok(Some(pending.count));
    }

    match clipboard.write_text(&pending.text).await {
        Ok(()) => {
            ::log::info!("Copied {} links to clipboard", pending.count);
            presenter.notify(Notice::success(format!(
                "Copied {} links to clipboard",
                pending.count
            )));
        }
        Err(e) => {
            ::log::warn!("Clipboard write rejected, showing manual copy: {}", e);
            presenter.show_manual_copy(&pending.text);
        }
    }
    Ok(Some(pending.count))
}

/// Presenter for terminal runs: notices go to the log, results to stdout
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Error => ::log::error!("{}", notice.message),
            NoticeKind::Info | NoticeKind::Success => ::log::info!("{}", notice.message),
        }
    }

    fn show_progress(&self, current_page: u32, max_pages: u32, link_count: usize) {
        if max_pages >= crate::templates::LIST_MODE_MAX_PAGES {
            ::log::info!("Page {}: {} links so far", current_page, link_count);
        } else {
            ::log::info!(
                "Page {} of {}: {} links so far",
                current_page,
                max_pages,
                link_count
            );
        }
    }

    fn hide_progress(&self) {
        ::log::debug!("Progress finished");
    }

    fn show_results(&self, links: &[ExtractedLink]) {
        let mut out = std::io::stdout().lock();
        for link in links {
            let _ = writeln!(out, "{}\t{}", link.url, link.text);
        }
        ::log::info!("Found {} links", links.len());
    }

    fn show_manual_copy(&self, text: &str) {
        println!("{}", text);
    }
}

/// Clipboard stand-in for terminal runs: the text is printed
#[derive(Debug, Default)]
pub struct StdoutClipboard;

#[async_trait(?Send)]
impl Clipboard for StdoutClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", text).map_err(|e| Error::Clipboard(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::{FailingClipboard, RecordingClipboard, RecordingPresenter};

    async fn stash(store: &MemoryStore, age_ms: i64) {
        let pending = PendingAutoCopy {
            text: "https://a.com, https://b.com".to_string(),
            count: 2,
            timestamp: crate::utils::now_millis() - age_ms,
        };
        storage::save(store, Scope::Local, PENDING_AUTO_COPY_KEY, &pending)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delivers_and_clears() {
        let store = MemoryStore::new();
        stash(&store, 0).await;
        let clipboard = RecordingClipboard::default();
        let presenter = RecordingPresenter::default();

        let delivered = deliver_pending_copy(&store, &clipboard, &presenter)
            .await
            .unwrap();
        assert_eq!(delivered, Some(2));
        assert_eq!(clipboard.written(), vec!["https://a.com, https://b.com"]);
        assert!(presenter.manual_copies().is_empty());
        assert_eq!(
            store.get(Scope::Local, PENDING_AUTO_COPY_KEY).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_rejected_write_falls_back_to_manual_copy() {
        let store = MemoryStore::new();
        stash(&store, 0).await;
        let presenter = RecordingPresenter::default();

        let delivered = deliver_pending_copy(&store, &FailingClipboard, &presenter)
            .await
            .unwrap();
        assert_eq!(delivered, Some(2));
        assert_eq!(
            presenter.manual_copies(),
            vec!["https://a.com, https://b.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_stale_record_is_shown_for_manual_copy() {
        let store = MemoryStore::new();
        stash(&store, PENDING_COPY_TTL_MS + 1_000).await;
        let clipboard = RecordingClipboard::default();
        let presenter = RecordingPresenter::default();

        let delivered = deliver_pending_copy(&store, &clipboard, &presenter)
            .await
            .unwrap();
        assert_eq!(delivered, Some(2));
        assert!(clipboard.written().is_empty());
        assert_eq!(
            presenter.manual_copies(),
            vec!["https://a.com, https://b.com".to_string()]
        );
        assert_eq!(
            store.get(Scope::Local, PENDING_AUTO_COPY_KEY).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_nothing_pending() {
        let store = MemoryStore::new();
        let presenter = RecordingPresenter::default();
        let delivered = deliver_pending_copy(&store, &FailingClipboard, &presenter)
            .await
            .unwrap();
        assert_eq!(delivered, None);
    }
}
