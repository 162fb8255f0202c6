//! Per-page extraction session.
//!
//! Owns what the user is doing on one page (selection mode, the last
//! rectangle and results, the active template) and routes each entry point
//! to the extractors, the template store or the multi-page engine.

use crate::config::{Preferences, Timings};
use crate::dom::SelectionRect;
use crate::engine::{Engine, JobOutcome};
use crate::error::{Error, Result};
use crate::extract::{self, ExtractOptions};
use crate::filter::{FilterKind, LinkFilter};
use crate::formatter;
use crate::page::Page;
use crate::presenter::{self, Notice, Presenter};
use crate::results::ExtractedLink;
use crate::storage::Store;
use crate::templates::{
    ExtractionMode, MultiPageSettings, Template, TemplateDraft, TemplateSettings, TemplateStore,
    TemplateUpdate,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use url::Url;

/// Mutable per-page state
#[derive(Debug, Clone)]
pub struct SessionState {
    pub preferences: Preferences,
    /// Selection mode is on and waiting for a rectangle
    pub is_active: bool,
    pub extracted_links: Vec<ExtractedLink>,
    pub current_filter: FilterKind,
    pub custom_filter_value: String,
    pub last_selection_rect: Option<SelectionRect>,
    pub current_template: Option<Template>,
    pub is_auto_run: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            preferences: Preferences::default(),
            is_active: false,
            extracted_links: Vec::new(),
            current_filter: FilterKind::All,
            custom_filter_value: String::new(),
            last_selection_rect: None,
            current_template: None,
            is_auto_run: false,
        }
    }
}

/// Where single-page results came from, for the "nothing found" notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Selection,
    SavedRegion,
    Container,
}

impl Source {
    fn empty_notice(self) -> Notice {
        match self {
            Source::Selection => Notice::info("No links found in selected area."),
            Source::SavedRegion => Notice::error("No links found in saved region"),
            Source::Container => Notice::error("No links found in container"),
        }
    }
}

pub struct Session {
    page: Rc<dyn Page>,
    store: Arc<dyn Store>,
    templates: TemplateStore,
    presenter: Rc<dyn Presenter>,
    engine: Engine,
    state: RefCell<SessionState>,
}

impl Session {
    pub fn new(
        page: Rc<dyn Page>,
        store: Arc<dyn Store>,
        presenter: Rc<dyn Presenter>,
        timings: Timings,
    ) -> Self {
        Self {
            engine: Engine::new(page.clone(), store.clone(), presenter.clone(), timings),
            templates: TemplateStore::new(store.clone()),
            page,
            store,
            presenter,
            state: RefCell::new(SessionState::default()),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// A copy of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Filter used for the next delivery
    pub fn set_filter(&self, kind: FilterKind, custom_value: &str) {
        let mut state = self.state.borrow_mut();
        state.current_filter = kind;
        state.custom_filter_value = custom_value.to_string();
    }

    /// Enters selection mode. Returns false if it was already on
    pub fn start_selection(&self, preferences: Preferences) -> bool {
        let mut state = self.state.borrow_mut();
        if state.is_active {
            ::log::debug!("Selection already active");
            return false;
        }
        state.preferences = preferences;
        state.current_template = None;
        state.is_active = true;
        ::log::info!("Selection mode started ({:?})", state.preferences.export_mode);
        true
    }

    pub fn cancel_selection(&self) {
        self.state.borrow_mut().is_active = false;
        ::log::info!("Selection cancelled");
    }

    /// Finishes a drawn selection and extracts the links under it.
    ///
    /// Rectangles at or below the minimum size are treated as a stray click:
    /// nothing is extracted and the last rectangle is kept.
    pub async fn complete_selection(&self, rect: SelectionRect) -> Result<Vec<ExtractedLink>> {
        let options = {
            let mut state = self.state.borrow_mut();
            state.is_active = false;
            if !rect.is_valid_selection() {
                ::log::debug!(
                    "Selection {}x{} too small, ignoring",
                    rect.width,
                    rect.height
                );
                return Ok(Vec::new());
            }
            state.last_selection_rect = Some(rect);
            state.is_auto_run = false;
            ExtractOptions {
                clean_urls: state.preferences.clean_urls,
                ignore_nested_anchors: state.preferences.ignore_nested_anchors,
            }
        };

        let dom = self.page.snapshot().await?;
        let links = extract::extract_links(&dom, &rect, &options);
        ::log::info!("Selection produced {} links", links.len());
        self.deliver(links, Source::Selection).await
    }

    /// Runs a saved template on the current page.
    ///
    /// Multi-page templates hand over to the engine; single-page runs
    /// finish here and report as [`JobOutcome::Finished`].
    pub async fn run_template(&self, template: Template, auto_run: bool) -> Result<JobOutcome> {
        let template = template.normalized();
        ::log::info!(
            "Running template {} (auto-run: {}, multi-page: {})",
            template.name,
            auto_run,
            template.multi_page
        );

        if let Err(e) = template.extraction_mode() {
            self.presenter.notify(Notice::error(
                "Error: This template has invalid selection data. Please recreate it.",
            ));
            return Err(e);
        }

        {
            let mut state = self.state.borrow_mut();
            state.preferences = Preferences {
                export_mode: template.export_mode,
                clean_urls: template.clean_urls,
                ignore_nested_anchors: template.ignore_nested_anchors,
            };
            state.current_filter = template.current_filter;
            state.custom_filter_value = template.custom_filter_value.clone();
            state.current_template = Some(template.clone());
            state.is_auto_run = auto_run;
        }

        if template.multi_page {
            let outcome = self.engine.start(&template, auto_run).await;
            self.state.borrow_mut().is_auto_run = false;
            return outcome;
        }

        let options = template.extract_options();
        let dom = self.page.snapshot().await?;
        let (links, source) = match template.extraction_mode()? {
            ExtractionMode::Container { selector, .. } => {
                ::log::info!("Using single-page container extraction: {}", selector);
                (
                    extract::extract_from_container(&dom, selector, &options),
                    Source::Container,
                )
            }
            ExtractionMode::Region(rect) => {
                ::log::info!("Using region extraction with {:?}", rect);
                (extract::extract_links(&dom, &rect, &options), Source::SavedRegion)
            }
        };
        let links = self.deliver(links, source).await?;
        Ok(JobOutcome::Finished { links })
    }

    /// Templates saved for `domain`
    pub async fn get_templates(&self, domain: &str) -> Result<Vec<Template>> {
        self.templates.for_domain(domain).await
    }

    /// Re-runs the continuation check, for route changes that do not reload
    pub async fn resume_multipage(&self) -> Result<Option<JobOutcome>> {
        ::log::info!("Manual multi-page resume requested");
        self.engine.resume().await
    }

    /// Stops the in-flight multi-page job so no later page load resumes it
    pub async fn cancel_multipage(&self) -> Result<()> {
        ::log::info!("Multi-page cancel requested");
        self.engine.cancel().await
    }

    /// Saves the last selection as a template on the current domain.
    ///
    /// With "use full list" on and no container given, the container is
    /// inferred from the anchors under the selection, then previewed.
    pub async fn save_template(
        &self,
        name: &str,
        auto_run: bool,
        mut multi_page: MultiPageSettings,
    ) -> Result<Template> {
        let page_url = self.page.current_url().await?;
        let (rect, settings) = {
            let state = self.state.borrow();
            (state.last_selection_rect, self.settings(&state))
        };
        let Some(rect) = rect.filter(|r| r.is_valid_selection()) else {
            self.presenter
                .notify(Notice::error("Error: No valid selection area to save"));
            return Err(Error::InvalidSelection);
        };

        self.infer_container(&mut multi_page, Some(rect)).await?;
        let draft = TemplateDraft {
            name: name.to_string(),
            domain: page_url.host_str().unwrap_or_default().to_string(),
            auto_run,
            selection_rect: Some(rect),
            settings,
            multi_page,
        };

        let template = self.templates.save(draft).await.inspect_err(|e| self.report(e))?;
        self.presenter
            .notify(Notice::success("Template saved successfully!"));
        self.after_save(&template).await?;
        Ok(template)
    }

    /// Applies the current settings (and any new selection) to a template
    pub async fn update_template(
        &self,
        id: &str,
        name: &str,
        auto_run: bool,
        multi_page: Option<MultiPageSettings>,
    ) -> Result<Template> {
        let (rect, settings) = {
            let state = self.state.borrow();
            (state.last_selection_rect, self.settings(&state))
        };

        let multi_page = match multi_page {
            Some(mut mp) => {
                self.infer_container(&mut mp, rect).await?;
                Some(mp)
            }
            None => None,
        };
        let update = TemplateUpdate {
            name: name.to_string(),
            auto_run,
            selection_rect: rect,
            settings,
            multi_page,
        };

        let template = self
            .templates
            .update(id, update)
            .await
            .inspect_err(|e| self.report(e))?;
        self.presenter
            .notify(Notice::success("Template updated successfully!"));
        self.after_save(&template).await?;
        Ok(template)
    }

    pub async fn delete_template(&self, id: &str) -> Result<bool> {
        let deleted = self.templates.delete(id).await?;
        let mut state = self.state.borrow_mut();
        if state.current_template.as_ref().is_some_and(|t| t.id == id) {
            state.current_template = None;
        }
        Ok(deleted)
    }

    fn settings(&self, state: &SessionState) -> TemplateSettings {
        TemplateSettings {
            export_mode: state.preferences.export_mode,
            clean_urls: state.preferences.clean_urls,
            ignore_nested_anchors: state.preferences.ignore_nested_anchors,
            current_filter: state.current_filter,
            custom_filter_value: state.custom_filter_value.clone(),
        }
    }

    fn report(&self, error: &Error) {
        let message = match error {
            Error::DuplicateTemplateName(_) => "A template with this name already exists".to_string(),
            other => format!("Error: {}", other),
        };
        self.presenter.notify(Notice::error(message));
    }

    /// Fills in a container selector for "use full list" when none was given
    async fn infer_container(
        &self,
        multi_page: &mut MultiPageSettings,
        rect: Option<SelectionRect>,
    ) -> Result<()> {
        let wants_container = multi_page.use_container_instead_of_viewport == Some(true);
        let has_selector = multi_page
            .container_selector
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        let Some(rect) = rect.filter(|_| wants_container && !has_selector) else {
            return Ok(());
        };

        let dom = self.page.snapshot().await?;
        let anchors = extract::anchors_in_rect(&dom, &rect);
        if anchors.is_empty() {
            return Ok(());
        }
        match extract::detect_container(&dom, &anchors) {
            Some(selector) => {
                ::log::info!("Detected container: {}", selector);
                multi_page.container_selector = Some(selector);
            }
            None => self.presenter.notify(Notice::info(
                "Could not detect container - will use region selection",
            )),
        }
        Ok(())
    }

    /// Remembers the saved template and previews its container, if any
    async fn after_save(&self, template: &Template) -> Result<()> {
        self.state.borrow_mut().current_template = Some(template.clone());
        let Some(selector) = template.active_container() else {
            return Ok(());
        };

        ::log::info!("Re-extracting with container after save: {}", selector);
        let dom = self.page.snapshot().await?;
        let links = extract::extract_from_container(&dom, selector, &template.extract_options());
        self.deliver(links, Source::Container).await?;
        Ok(())
    }

    fn filter_for(&self, page_url: &Url) -> LinkFilter {
        let state = self.state.borrow();
        LinkFilter::new(
            state.current_filter,
            &state.custom_filter_value,
            page_url.host_str().unwrap_or_default(),
        )
    }

    /// Filters single-page results, then shows them or stashes them for
    /// auto-copy
    async fn deliver(&self, links: Vec<ExtractedLink>, source: Source) -> Result<Vec<ExtractedLink>> {
        let auto_run = std::mem::take(&mut self.state.borrow_mut().is_auto_run);

        if links.is_empty() {
            self.state.borrow_mut().extracted_links.clear();
            self.presenter.notify(source.empty_notice());
            return Ok(links);
        }

        let page_url = self.page.current_url().await?;
        let filtered = self.filter_for(&page_url).apply(links);
        self.state.borrow_mut().extracted_links = filtered.clone();

        if filtered.is_empty() {
            ::log::info!("No links after filtering");
            self.presenter
                .notify(Notice::error("No links match current filters"));
            return Ok(filtered);
        }

        if auto_run {
            let export_mode = self.state.borrow().preferences.export_mode;
            let text = formatter::format_links(&filtered, export_mode, page_url.as_str());
            presenter::stash_pending_copy(self.store.as_ref(), text, filtered.len()).await?;
        } else {
            self.presenter.show_results(&filtered);
        }
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::ExportMode;
    use crate::results::PendingAutoCopy;
    use crate::storage::{self, MemoryStore, PENDING_AUTO_COPY_KEY, Scope};
    use crate::testing::{Document, RecordingPresenter, ScriptedPage, list_page};

    const URL: &str = "https://shop.test/list";

    struct Harness {
        page: Rc<ScriptedPage>,
        store: Arc<MemoryStore>,
        presenter: Rc<RecordingPresenter>,
        session: Session,
    }

    fn harness(html: String) -> Harness {
        let page = Rc::new(ScriptedPage::new(vec![Document::new(URL, html)]));
        let store = Arc::new(MemoryStore::new());
        let presenter = Rc::new(RecordingPresenter::default());
        let session = Session::new(
            page.clone(),
            store.clone(),
            presenter.clone(),
            Timings::immediate(),
        );
        Harness {
            page,
            store,
            presenter,
            session,
        }
    }

    fn rect() -> SelectionRect {
        SelectionRect::new(0.0, 0.0, 500.0, 500.0)
    }

    fn urls(links: &[ExtractedLink]) -> Vec<&str> {
        links.iter().map(|l| l.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_selection_extracts_and_shows_results() {
        let h = harness(list_page(&["https://shop.test/a", "https://shop.test/b"], None));
        assert!(h.session.start_selection(Preferences::default()));
        assert!(!h.session.start_selection(Preferences::default()));

        let links = h.session.complete_selection(rect()).await.unwrap();

        assert_eq!(urls(&links), vec!["https://shop.test/a", "https://shop.test/b"]);
        assert_eq!(h.presenter.results().len(), 1);
        let state = h.session.state();
        assert!(!state.is_active);
        assert_eq!(state.last_selection_rect, Some(rect()));
        assert_eq!(state.extracted_links.len(), 2);
    }

    #[tokio::test]
    async fn test_small_selection_is_ignored() {
        let h = harness(list_page(&["https://shop.test/a"], None));
        h.session.start_selection(Preferences::default());

        let links = h
            .session
            .complete_selection(SelectionRect::new(0.0, 0.0, 5.0, 5.0))
            .await
            .unwrap();

        assert!(links.is_empty());
        assert!(h.presenter.results().is_empty());
        assert!(h.presenter.notices().is_empty());
        assert_eq!(h.session.state().last_selection_rect, None);
    }

    #[tokio::test]
    async fn test_empty_selection_notifies() {
        let h = harness(list_page(&[], None));
        h.session.complete_selection(rect()).await.unwrap();
        assert_eq!(
            h.presenter.notices(),
            vec![Notice::info("No links found in selected area.")]
        );
    }

    #[tokio::test]
    async fn test_selection_uses_clean_urls_preference() {
        let h = harness(list_page(&["https://shop.test/a?utm_source=x&id=1"], None));
        h.session.start_selection(Preferences {
            clean_urls: true,
            ..Preferences::default()
        });
        let links = h.session.complete_selection(rect()).await.unwrap();
        assert_eq!(urls(&links), vec!["https://shop.test/a?id=1"]);
    }

    #[tokio::test]
    async fn test_save_infers_container_and_previews() {
        let h = harness(list_page(
            &["https://shop.test/1", "https://shop.test/2", "https://shop.test/3"],
            None,
        ));
        h.session
            .complete_selection(SelectionRect::new(0.0, 0.0, 500.0, 60.0))
            .await
            .unwrap();

        let template = h
            .session
            .save_template(
                "Results",
                false,
                MultiPageSettings {
                    use_container_instead_of_viewport: Some(true),
                    ..MultiPageSettings::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(template.domain, "shop.test");
        assert_eq!(template.container_selector.as_deref(), Some("#results"));
        let shown = h.presenter.results();
        assert_eq!(shown.len(), 2, "selection results, then the container preview");
        assert_eq!(shown[1].len(), 3);
        assert_eq!(h.session.state().current_template, Some(template));
    }

    #[tokio::test]
    async fn test_save_without_selection_fails() {
        let h = harness(list_page(&[], None));
        let err = h
            .session
            .save_template("Nope", false, MultiPageSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection));
        assert_eq!(h.presenter.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_reported() {
        let h = harness(list_page(&["https://shop.test/a"], None));
        h.session.complete_selection(rect()).await.unwrap();
        h.session
            .save_template("Feed", false, MultiPageSettings::default())
            .await
            .unwrap();

        let err = h
            .session
            .save_template("feed", false, MultiPageSettings::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateTemplateName(_)));
        assert_eq!(
            h.presenter.errors(),
            vec!["A template with this name already exists".to_string()]
        );
    }

    #[tokio::test]
    async fn test_auto_run_region_template_stashes_copy() {
        let h = harness(list_page(&["https://shop.test/a", "https://shop.test/b"], None));
        h.session.complete_selection(rect()).await.unwrap();
        let mut template = h
            .session
            .save_template("Auto", true, MultiPageSettings::default())
            .await
            .unwrap();
        template.export_mode = ExportMode::Markdown;

        let outcome = h.session.run_template(template, true).await.unwrap();

        assert!(matches!(outcome, JobOutcome::Finished { ref links } if links.len() == 2));
        let pending: PendingAutoCopy =
            storage::load(h.store.as_ref(), Scope::Local, PENDING_AUTO_COPY_KEY)
                .await
                .unwrap()
                .unwrap();
        assert_eq!(pending.count, 2);
        assert!(pending.text.starts_with("- [Item 0](https://shop.test/a)"));
        assert!(!h.session.state().is_auto_run);
    }

    #[tokio::test]
    async fn test_auto_run_with_nothing_left_after_filter() {
        let h = harness(list_page(&["https://shop.test/a"], None));
        h.session.complete_selection(rect()).await.unwrap();
        h.session.set_filter(FilterKind::External, "");
        let template = h
            .session
            .save_template("Ext", true, MultiPageSettings::default())
            .await
            .unwrap();

        h.session.run_template(template, true).await.unwrap();

        assert_eq!(
            h.presenter.errors(),
            vec!["No links match current filters".to_string()]
        );
        assert_eq!(
            h.store.get(Scope::Local, PENDING_AUTO_COPY_KEY).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_container_template_with_missing_container() {
        let h = harness(list_page(&["https://shop.test/a"], None));
        let template: Template = serde_json::from_value(serde_json::json!({
            "id": "1",
            "name": "Gone",
            "domain": "shop.test",
            "useContainerInsteadOfViewport": true,
            "containerSelector": "#not-here"
        }))
        .unwrap();

        let outcome = h.session.run_template(template, false).await.unwrap();

        assert_eq!(outcome, JobOutcome::Finished { links: Vec::new() });
        assert_eq!(
            h.presenter.errors(),
            vec!["No links found in container".to_string()]
        );
    }

    #[tokio::test]
    async fn test_invalid_template_is_reported() {
        let h = harness(list_page(&[], None));
        let template: Template = serde_json::from_value(serde_json::json!({
            "id": "1", "name": "Broken", "domain": "shop.test"
        }))
        .unwrap();

        assert!(h.session.run_template(template, false).await.is_err());
        assert_eq!(h.presenter.errors().len(), 1);
        assert!(h.page.activations().is_empty());
    }

    #[tokio::test]
    async fn test_multi_page_template_goes_through_engine() {
        let h = harness(list_page(&["https://shop.test/a"], None));
        h.session.complete_selection(rect()).await.unwrap();
        let template = h
            .session
            .save_template(
                "Paged",
                false,
                MultiPageSettings {
                    multi_page: Some(true),
                    max_pages: Some(3),
                    ..MultiPageSettings::default()
                },
            )
            .await
            .unwrap();

        let outcome = h.session.run_template(template, false).await.unwrap();

        assert!(matches!(outcome, JobOutcome::Finished { ref links } if links.len() == 1));
        assert_eq!(h.presenter.progress()[0], (1, 3, 0));
        assert_eq!(h.session.engine().state().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_and_delete_template() {
        let h = harness(list_page(&["https://shop.test/a"], None));
        h.session.complete_selection(rect()).await.unwrap();
        let saved = h
            .session
            .save_template("Old", false, MultiPageSettings::default())
            .await
            .unwrap();

        let updated = h
            .session
            .update_template(&saved.id, "New", true, None)
            .await
            .unwrap();
        assert_eq!(updated.name, "New");
        assert!(updated.auto_run);
        assert_eq!(h.session.get_templates("shop.test").await.unwrap(), vec![updated]);

        assert!(h.session.delete_template(&saved.id).await.unwrap());
        assert_eq!(h.session.state().current_template, None);
        assert!(h.session.get_templates("shop.test").await.unwrap().is_empty());
    }
}
