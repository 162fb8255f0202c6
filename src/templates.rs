//! Named, domain-scoped extraction presets.

use crate::config::default_true;
use crate::dom::SelectionRect;
use crate::error::{Error, Result};
use crate::extract::ExtractOptions;
use crate::filter::FilterKind;
use crate::formatter::ExportMode;
use crate::storage::{self, Scope, Store, TEMPLATES_KEY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `maxPages` value meaning "keep going until the list ends"
pub const LIST_MODE_MAX_PAGES: u32 = 999;
const DEFAULT_MAX_SCROLL_STEPS: u32 = 10;

/// A persisted extraction preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Creation time in epoch milliseconds, as a string
    pub id: String,

    pub name: String,

    /// Host the template was created on
    pub domain: String,

    /// Run without review when a matching page loads
    #[serde(default)]
    pub auto_run: bool,

    /// Baseline region, also the fallback for container mode
    #[serde(default)]
    pub selection_rect: Option<SelectionRect>,

    #[serde(default)]
    pub export_mode: ExportMode,

    #[serde(default)]
    pub clean_urls: bool,

    #[serde(default = "default_true")]
    pub ignore_nested_anchors: bool,

    #[serde(default)]
    pub current_filter: FilterKind,

    #[serde(default)]
    pub custom_filter_value: String,

    #[serde(default)]
    pub multi_page: bool,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default)]
    pub pagination_selector: Option<String>,

    #[serde(default)]
    pub use_container_instead_of_viewport: bool,

    #[serde(default)]
    pub container_selector: Option<String>,

    #[serde(default)]
    pub auto_scroll: bool,

    #[serde(default = "default_max_scroll_steps")]
    pub max_scroll_steps: u32,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_max_pages() -> u32 {
    LIST_MODE_MAX_PAGES
}

fn default_max_scroll_steps() -> u32 {
    DEFAULT_MAX_SCROLL_STEPS
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// How a template finds its links on a page
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionMode<'a> {
    /// Links beneath a container, falling back to the region if it yields none
    Container {
        selector: &'a str,
        fallback: Option<SelectionRect>,
    },
    /// Links intersecting a rectangle
    Region(SelectionRect),
}

impl Template {
    /// Applies defaults for records written by older versions
    pub fn normalized(mut self) -> Self {
        if self.max_pages == 0 {
            self.max_pages = LIST_MODE_MAX_PAGES;
        }
        if self.max_scroll_steps == 0 {
            self.max_scroll_steps = DEFAULT_MAX_SCROLL_STEPS;
        }
        self.pagination_selector = non_blank(self.pagination_selector);
        self.container_selector = non_blank(self.container_selector);
        self
    }

    /// True when the job runs until pagination runs out
    pub fn is_list_mode(&self) -> bool {
        self.max_pages >= LIST_MODE_MAX_PAGES
    }

    fn usable_rect(&self) -> Option<SelectionRect> {
        self.selection_rect.filter(|r| r.is_valid_selection())
    }

    /// Container selector to use, if container mode is on and one is set
    pub fn active_container(&self) -> Option<&str> {
        if self.use_container_instead_of_viewport {
            self.container_selector.as_deref()
        } else {
            None
        }
    }

    /// Resolves how to extract, rejecting templates with neither a usable
    /// rectangle nor a container selector
    pub fn extraction_mode(&self) -> Result<ExtractionMode<'_>> {
        if let Some(selector) = self.active_container() {
            return Ok(ExtractionMode::Container {
                selector,
                fallback: self.usable_rect(),
            });
        }
        match self.usable_rect() {
            Some(rect) => Ok(ExtractionMode::Region(rect)),
            None => Err(Error::InvalidTemplate(format!(
                "\"{}\" has invalid selection data, please recreate it",
                self.name
            ))),
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            clean_urls: self.clean_urls,
            ignore_nested_anchors: self.ignore_nested_anchors,
        }
    }

    fn same_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// Output and filter settings captured from the session when saving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSettings {
    pub export_mode: ExportMode,
    pub clean_urls: bool,
    pub ignore_nested_anchors: bool,
    pub current_filter: FilterKind,
    pub custom_filter_value: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            export_mode: ExportMode::default(),
            clean_urls: false,
            ignore_nested_anchors: true,
            current_filter: FilterKind::All,
            custom_filter_value: String::new(),
        }
    }
}

/// Multi-page fields of a save or update. `None` keeps the current value;
/// an empty selector string clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultiPageSettings {
    pub multi_page: Option<bool>,
    pub max_pages: Option<u32>,
    pub pagination_selector: Option<String>,
    pub use_container_instead_of_viewport: Option<bool>,
    pub container_selector: Option<String>,
    pub auto_scroll: Option<bool>,
    pub max_scroll_steps: Option<u32>,
}

/// A template about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDraft {
    pub name: String,
    pub domain: String,
    pub auto_run: bool,
    pub selection_rect: Option<SelectionRect>,
    pub settings: TemplateSettings,
    pub multi_page: MultiPageSettings,
}

/// Changes to an existing template
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateUpdate {
    pub name: String,
    pub auto_run: bool,
    /// Replaces the stored rectangle only if it is a valid selection
    pub selection_rect: Option<SelectionRect>,
    pub settings: TemplateSettings,
    pub multi_page: Option<MultiPageSettings>,
}

/// CRUD over the stored template list
#[derive(Clone)]
pub struct TemplateStore {
    store: Arc<dyn Store>,
}

impl TemplateStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Every stored template, normalized
    pub async fn all(&self) -> Result<Vec<Template>> {
        let templates: Vec<Template> =
            storage::load(self.store.as_ref(), Scope::Local, TEMPLATES_KEY)
                .await?
                .unwrap_or_default();
        Ok(templates.into_iter().map(Template::normalized).collect())
    }

    async fn write_all(&self, templates: &[Template]) -> Result<()> {
        storage::save(self.store.as_ref(), Scope::Local, TEMPLATES_KEY, templates).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Template>> {
        Ok(self.all().await?.into_iter().find(|t| t.id == id))
    }

    /// Templates created on `domain`
    pub async fn for_domain(&self, domain: &str) -> Result<Vec<Template>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|t| t.domain == domain)
            .collect())
    }

    /// Templates that should start on their own when `domain` loads
    pub async fn auto_run_for(&self, domain: &str) -> Result<Vec<Template>> {
        Ok(self
            .for_domain(domain)
            .await?
            .into_iter()
            .filter(|t| t.auto_run)
            .collect())
    }

    /// Finds a template on `domain` by id or case-insensitive name
    pub async fn find(&self, domain: Option<&str>, id_or_name: &str) -> Result<Option<Template>> {
        let templates = self.all().await?;
        let in_scope = |t: &&Template| domain.is_none_or(|d| t.domain == d);
        Ok(templates
            .iter()
            .filter(in_scope)
            .find(|t| t.id == id_or_name)
            .or_else(|| templates.iter().filter(in_scope).find(|t| t.same_name(id_or_name)))
            .cloned())
    }

    /// Creates a template from `draft`
    pub async fn save(&self, draft: TemplateDraft) -> Result<Template> {
        let rect = draft
            .selection_rect
            .filter(|r| r.is_valid_selection())
            .ok_or(Error::InvalidSelection)?;

        let mut templates = self.all().await?;
        if templates
            .iter()
            .any(|t| t.domain == draft.domain && t.same_name(&draft.name))
        {
            return Err(Error::DuplicateTemplateName(draft.name));
        }

        let mut id = crate::utils::now_millis();
        while templates.iter().any(|t| t.id == id.to_string()) {
            id += 1;
        }

        let mp = draft.multi_page;
        let template = Template {
            id: id.to_string(),
            name: draft.name.trim().to_string(),
            domain: draft.domain,
            auto_run: draft.auto_run,
            selection_rect: Some(rect),
            export_mode: draft.settings.export_mode,
            clean_urls: draft.settings.clean_urls,
            ignore_nested_anchors: draft.settings.ignore_nested_anchors,
            current_filter: draft.settings.current_filter,
            custom_filter_value: draft.settings.custom_filter_value,
            multi_page: mp.multi_page.unwrap_or(false),
            max_pages: mp.max_pages.unwrap_or(LIST_MODE_MAX_PAGES),
            pagination_selector: mp.pagination_selector,
            use_container_instead_of_viewport: mp.use_container_instead_of_viewport.unwrap_or(false),
            container_selector: mp.container_selector,
            auto_scroll: mp.auto_scroll.unwrap_or(false),
            max_scroll_steps: mp.max_scroll_steps.unwrap_or(DEFAULT_MAX_SCROLL_STEPS),
            created_at: Some(Utc::now()),
            updated_at: None,
        }
        .normalized();

        templates.push(template.clone());
        self.write_all(&templates).await?;
        ::log::info!("Saved template {} ({}) for {}", template.name, template.id, template.domain);
        Ok(template)
    }

    /// Applies `update` to the template with `id`
    pub async fn update(&self, id: &str, update: TemplateUpdate) -> Result<Template> {
        let mut templates = self.all().await?;
        let index = templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::TemplateNotFound(id.to_string()))?;

        let domain = templates[index].domain.clone();
        if templates
            .iter()
            .any(|t| t.id != id && t.domain == domain && t.same_name(&update.name))
        {
            return Err(Error::DuplicateTemplateName(update.name));
        }

        let template = &mut templates[index];
        template.name = update.name.trim().to_string();
        template.auto_run = update.auto_run;
        if let Some(rect) = update.selection_rect.filter(|r| r.is_valid_selection()) {
            template.selection_rect = Some(rect);
        }
        template.export_mode = update.settings.export_mode;
        template.clean_urls = update.settings.clean_urls;
        template.ignore_nested_anchors = update.settings.ignore_nested_anchors;
        template.current_filter = update.settings.current_filter;
        template.custom_filter_value = update.settings.custom_filter_value;
        template.updated_at = Some(Utc::now());

        if let Some(mp) = update.multi_page {
            if let Some(v) = mp.multi_page {
                template.multi_page = v;
            }
            if let Some(v) = mp.max_pages {
                template.max_pages = v;
            }
            if let Some(v) = mp.pagination_selector {
                template.pagination_selector = Some(v);
            }
            if let Some(v) = mp.use_container_instead_of_viewport {
                template.use_container_instead_of_viewport = v;
            }
            if let Some(v) = mp.container_selector {
                template.container_selector = Some(v);
            }
            if let Some(v) = mp.auto_scroll {
                template.auto_scroll = v;
            }
            if let Some(v) = mp.max_scroll_steps {
                template.max_scroll_steps = v;
            }
        }

        let updated = template.clone().normalized();
        templates[index] = updated.clone();
        self.write_all(&templates).await?;
        ::log::info!("Updated template {} ({})", updated.name, updated.id);
        Ok(updated)
    }

    /// Removes a template. Returns false if it did not exist
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut templates = self.all().await?;
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return Ok(false);
        }
        self.write_all(&templates).await?;
        ::log::info!("Deleted template {}", id);
        Ok(true)
    }
}
