//! Multi-page continuation.
//!
//! A job runs extract, locate next, advance until pagination runs out or
//! `maxPages` is reached. Clicking "next" may unload the document, so the
//! job's state lives in the local store and is written before every click.
//! Whatever context loads next calls [`Engine::resume`] to pick it up.


use crate::config::Timings;
use crate::dom::{Dom, Snapshot};
use crate::error::{Error, Result};
use crate::extract;
use crate::filter::LinkFilter;
use crate::formatter;
use crate::page::{Activation, Page};
use crate::pagination;
use crate::presenter::{self, Notice, Presenter};
use crate::results::{ExtractedLink, dedupe_links};
use crate::storage::{self, MULTI_PAGE_STATE_KEY, Scope, Store};
use crate::templates::{ExtractionMode, Template, TemplateStore};
use crate::utils::millis;
use crate::wait::{self, ContainerGrowth, DocumentChange, PageSettled};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

/// Consecutive in-place loads without new links after which a job ends
const MAX_IN_PLACE_STALLS: u32 = 3;

/// Persisted continuation record for an in-flight job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPageState {
    pub template_id: String,
    pub current_page: u32,
    pub max_pages: u32,
    #[serde(default)]
    pub all_results: Vec<ExtractedLink>,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub is_auto_running: bool,
}

impl MultiPageState {
    fn new(template: &Template, auto_run: bool) -> Self {
        Self {
            template_id: template.id.clone(),
            current_page: 1,
            max_pages: template.max_pages,
            all_results: Vec::new(),
            is_running: true,
            is_auto_running: auto_run,
        }
    }
}

/// How a job (or this context's share of it) ended
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Results were delivered
    Finished { links: Vec<ExtractedLink> },
    /// The page navigated away; the next document resumes at `next_page`
    Navigating { next_page: u32 },
    /// The persisted state disappeared under us
    Cancelled,
    /// The job's template was deleted; state was cleared silently
    TemplateMissing,
    /// Extraction failed; state was cleared and the user notified
    Failed { message: String },
}

enum Step {
    Done(JobOutcome),
    Advanced(Activation),
}

/// Clears the re-entrancy flag when a resume finishes, however it finishes
struct ResumeGuard<'a>(&'a Cell<bool>);

impl Drop for ResumeGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Drives multi-page jobs against one page
pub struct Engine {
    page: Rc<dyn Page>,
    store: Arc<dyn Store>,
    templates: TemplateStore,
    presenter: Rc<dyn Presenter>,
    timings: Timings,
    resuming: Cell<bool>,
}

impl Engine {
    pub fn new(
        page: Rc<dyn Page>,
        store: Arc<dyn Store>,
        presenter: Rc<dyn Presenter>,
        timings: Timings,
    ) -> Self {
        Self {
            page,
            templates: TemplateStore::new(store.clone()),
            store,
            presenter,
            timings,
            resuming: Cell::new(false),
        }
    }

    /// The persisted job, if one is in flight. A record that no longer
    /// deserializes is removed and reported as absent.
    pub async fn state(&self) -> Result<Option<MultiPageState>> {
        let loaded =
            storage::load::<MultiPageState, _>(self.store.as_ref(), Scope::Local, MULTI_PAGE_STATE_KEY)
                .await;
        match loaded {
            Err(Error::Json(e)) => {
                ::log::warn!("Discarding unreadable multi-page state: {}", e);
                self.clear_state().await?;
                Ok(None)
            }
            other => other,
        }
    }

    /// True if a running job is recorded in storage
    pub async fn job_in_flight(&self) -> Result<bool> {
        Ok(self.state().await?.is_some_and(|s| s.is_running))
    }

    async fn clear_state(&self) -> Result<()> {
        self.store.remove(Scope::Local, MULTI_PAGE_STATE_KEY).await
    }

    /// Writes `state` unless the job was cancelled meanwhile. Returns false if it was
    async fn persist(&self, state: &MultiPageState) -> Result<bool> {
        let still_running = self.job_in_flight().await?;
        if !still_running {
            ::log::info!("Multi-page state gone, treating job as cancelled");
            return Ok(false);
        }
        storage::save(self.store.as_ref(), Scope::Local, MULTI_PAGE_STATE_KEY, state).await?;
        Ok(true)
    }

    /// Starts a multi-page job on the current page
    pub async fn start(&self, template: &Template, auto_run: bool) -> Result<JobOutcome> {
        template.extraction_mode()?;

        ::log::info!(
            "Starting {} extraction: {}",
            if template.is_list_mode() {
                "list"
            } else {
                "multi-page"
            },
            template.name
        );

        let state = MultiPageState::new(template, auto_run);
        storage::save(self.store.as_ref(), Scope::Local, MULTI_PAGE_STATE_KEY, &state).await?;
        self.presenter.show_progress(1, state.max_pages, 0);

        Ok(self.run(template, state).await)
    }

    /// Picks up a persisted job after a page load.
    ///
    /// Returns `Ok(None)` when there is nothing to resume or another resume
    /// is already under way in this context.
    pub async fn resume(&self) -> Result<Option<JobOutcome>> {
        if self.resuming.get() {
            ::log::debug!("Resume already in progress, skipping");
            return Ok(None);
        }
        self.resuming.set(true);
        let _guard = ResumeGuard(&self.resuming);

        let Some(state) = self.state().await?.filter(|s| s.is_running) else {
            return Ok(None);
        };

        ::log::info!(
            "Found pending multi-page state at page {}, resuming",
            state.current_page
        );
        self.presenter
            .show_progress(state.current_page, state.max_pages, state.all_results.len());

        match self.prepare_resumed_page(&state).await {
            Ok(Some(template)) => Ok(Some(self.run(&template, state).await)),
            Ok(None) => {
                ::log::warn!(
                    "Template {} not found for multi-page continuation (likely deleted), cleaning up",
                    state.template_id
                );
                self.clear_state().await?;
                self.presenter.hide_progress();
                Ok(Some(JobOutcome::TemplateMissing))
            }
            Err(e) => Ok(Some(self.fail(e).await)),
        }
    }

    /// Waits for the new document and reloads the job's template
    async fn prepare_resumed_page(&self, state: &MultiPageState) -> Result<Option<Template>> {
        self.wait_for_page_ready().await?;

        let Some(template) = self.templates.get(&state.template_id).await? else {
            return Ok(None);
        };

        // Saved rectangles are relative to the unscrolled viewport
        if template.active_container().is_none() {
            self.page.scroll_to_origin().await?;
        }
        Ok(Some(template))
    }

    /// Stops the job wherever it is
    pub async fn cancel(&self) -> Result<()> {
        self.clear_state().await?;
        self.presenter.hide_progress();
        self.presenter
            .notify(Notice::info("Multi-page extraction cancelled"));
        ::log::info!("Multi-page extraction cancelled");
        Ok(())
    }

    async fn wait_for_page_ready(&self) -> Result<()> {
        tokio::time::sleep(millis(self.timings.resume_initial_delay_ms)).await;
        let mut settled = PageSettled::new(self.page.as_ref());
        wait::wait_for_stable_condition(&mut settled, &self.timings.page_ready()).await?;
        tokio::time::sleep(millis(self.timings.settle_delay_ms)).await;
        Ok(())
    }

    /// Runs cycles in this context until the job ends or the page navigates
    async fn run(&self, template: &Template, mut state: MultiPageState) -> JobOutcome {
        // Counted only while in-place loads follow each other in this context
        let mut stalls: Option<u32> = None;
        loop {
            let step = match self
                .extract_current_page(template, state, stalls.as_mut())
                .await
            {
                Ok(step) => step,
                Err(e) => return self.fail(e).await,
            };

            match step {
                Step::Done(outcome) => return outcome,
                Step::Advanced(Activation::Navigated) => {
                    ::log::info!("Navigation detected, state will be resumed on the new page");
                    let next_page = match self.state().await {
                        Ok(Some(s)) => s.current_page,
                        _ => 0,
                    };
                    return JobOutcome::Navigating { next_page };
                }
                Step::Advanced(Activation::InPlace) => {
                    ::log::info!("Dynamic content loading detected (no navigation)");
                    if let Err(e) = self.wait_for_dynamic_content(template).await {
                        return self.fail(e).await;
                    }
                    state = match self.state().await {
                        Ok(Some(s)) if s.is_running => s,
                        Ok(_) => return JobOutcome::Cancelled,
                        Err(e) => return self.fail(e).await,
                    };
                    stalls = Some(stalls.unwrap_or(0));
                }
            }
        }
    }

    /// Extracts one page, then finalizes or advances.
    ///
    /// `stalls` is present after an in-place advance and counts the
    /// consecutive in-place loads that produced no new links.
    async fn extract_current_page(
        &self,
        template: &Template,
        mut state: MultiPageState,
        stalls: Option<&mut u32>,
    ) -> Result<Step> {
        ::log::info!(
            "Extracting page {} (max {}), {} results so far",
            state.current_page,
            state.max_pages,
            state.all_results.len()
        );

        if template.auto_scroll {
            self.auto_scroll(template).await?;
        }

        let dom = self.page.snapshot().await?;
        let links = extract_for_template(&dom, template)?;

        let seen: HashSet<&str> = state.all_results.iter().map(|l| l.url.as_str()).collect();
        let fresh = links
            .iter()
            .filter(|l| !seen.contains(l.url.as_str()))
            .count();

        ::log::info!(
            "Extracted {} links ({} new), total: {}",
            links.len(),
            fresh,
            state.all_results.len() + links.len()
        );
        state.all_results.extend(links);

        if !self.persist(&state).await? {
            return Ok(Step::Done(JobOutcome::Cancelled));
        }
        self.presenter
            .show_progress(state.current_page, state.max_pages, state.all_results.len());

        if state.current_page >= state.max_pages {
            ::log::info!("Reached max pages, finalizing");
            return self.finalize(template, state).await.map(Step::Done);
        }

        if let Some(stalls) = stalls {
            *stalls = if fresh == 0 { *stalls + 1 } else { 0 };
            if *stalls >= MAX_IN_PLACE_STALLS {
                ::log::info!(
                    "{} in-place loads in a row produced no new links, finalizing",
                    stalls
                );
                return self.finalize(template, state).await.map(Step::Done);
            }
            if *stalls > 0 {
                ::log::debug!("In-place load produced no new links ({} in a row)", stalls);
            }
        }

        let Some(next) =
            pagination::find_next_page_button(self.page.as_ref(), template.pagination_selector.as_deref())
                .await?
        else {
            ::log::info!(
                "No more pages available, extracted content from {} page(s)",
                state.current_page
            );
            return self.finalize(template, state).await.map(Step::Done);
        };

        state.current_page += 1;
        if !self.persist(&state).await? {
            return Ok(Step::Done(JobOutcome::Cancelled));
        }
        ::log::info!("State saved, activating next control for page {}", state.current_page);

        let dom = self.page.snapshot().await?;
        let target = dom
            .find_by_key(&next)
            .map(|node| pagination::clickable_target(&dom, node))
            .and_then(|node| dom.key(node))
            .unwrap_or(next);

        self.page.scroll_into_view(&target).await?;
        let activation = self.page.activate(&target).await?;
        Ok(Step::Advanced(activation))
    }

    /// Waits for content loaded in place, scoped to the container if known
    async fn wait_for_dynamic_content(&self, template: &Template) -> Result<()> {
        if let Some(selector) = template.container_selector.as_deref() {
            if let Some(mut growth) = ContainerGrowth::start(self.page.as_ref(), selector).await? {
                wait::wait_for_stable_condition(&mut growth, &self.timings.container_growth())
                    .await?;
                return Ok(());
            }
        }
        let mut change = DocumentChange::start(self.page.as_ref()).await?;
        wait::wait_for_stable_condition(&mut change, &self.timings.document_change()).await?;
        Ok(())
    }

    /// Scrolls one viewport at a time while each step loads more links
    async fn auto_scroll(&self, template: &Template) -> Result<()> {
        let scope = template.active_container().unwrap_or("body");
        for step in 1..=template.max_scroll_steps {
            let Some(mut growth) = ContainerGrowth::start(self.page.as_ref(), scope).await? else {
                break;
            };
            self.page.scroll_by_viewport().await?;
            let outcome =
                wait::wait_for_stable_condition(&mut growth, &self.timings.document_change())
                    .await?;
            if !outcome.changed() {
                ::log::debug!("Auto-scroll step {} loaded nothing, stopping", step);
                break;
            }
        }
        if template.active_container().is_none() {
            self.page.scroll_to_origin().await?;
        }
        Ok(())
    }

    /// Dedupes, filters and delivers the accumulated results
    async fn finalize(&self, template: &Template, state: MultiPageState) -> Result<JobOutcome> {
        let unique = dedupe_links(state.all_results);
        ::log::info!("Deduplicated to {} unique links", unique.len());

        let page_url = self.page.current_url().await?;
        let filter = LinkFilter::new(
            template.current_filter,
            &template.custom_filter_value,
            page_url.host_str().unwrap_or_default(),
        );
        let links = filter.apply(unique);
        ::log::info!("Filtered to {} links", links.len());

        self.clear_state().await?;
        self.presenter.hide_progress();

        if state.is_auto_running {
            let text = formatter::format_links(&links, template.export_mode, page_url.as_str());
            presenter::stash_pending_copy(self.store.as_ref(), text, links.len()).await?;
        } else {
            self.presenter.show_results(&links);
        }

        Ok(JobOutcome::Finished { links })
    }

    /// Ends the job after an error without leaving a stale running record
    async fn fail(&self, error: Error) -> JobOutcome {
        ::log::error!("Multi-page extraction failed: {}", error);
        if let Err(e) = self.clear_state().await {
            ::log::error!("Could not clear multi-page state: {}", e);
        }
        self.presenter.hide_progress();
        let message = error.to_string();
        self.presenter.notify(Notice::error(format!(
            "Multi-page extraction failed: {}",
            message
        )));
        JobOutcome::Failed { message }
    }
}

/// Runs the extractor a template calls for on one document
pub fn extract_for_template(dom: &Snapshot, template: &Template) -> Result<Vec<ExtractedLink>> {
    let options = template.extract_options();
    match template.extraction_mode()? {
        ExtractionMode::Container { selector, fallback } => {
            let links = extract::extract_from_container(dom, selector, &options);
            match fallback {
                Some(rect) if links.is_empty() => {
                    ::log::info!("Container extraction found nothing, falling back to selection rectangle");
                    Ok(extract::extract_links(dom, &rect, &options))
                }
                _ => Ok(links),
            }
        }
        ExtractionMode::Region(rect) => Ok(extract::extract_links(dom, &rect, &options)),
    }
}
