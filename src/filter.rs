use crate::results::ExtractedLink;
use serde::{Deserialize, Serialize};
use url::Url;

/// Which links survive the final filter pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Keep everything
    #[default]
    All,
    /// Keep links on the current page's host
    Internal,
    /// Keep links pointing away from the current page's host
    External,
    /// Keep links whose URL or text contains a keyword
    Custom,
    /// Unrecognised stored value; behaves like `All`
    #[serde(other)]
    Unknown,
}

/// Filter applied to extracted links relative to the page they came from
#[derive(Debug, Clone)]
pub struct LinkFilter {
    kind: FilterKind,
    /// Lowercased keyword for `Custom`; empty means "match everything"
    keyword: String,
    /// Host of the page the extraction ran on
    current_domain: String,
}

impl LinkFilter {
    /// Create a filter for links found on `current_domain`
    pub fn new(kind: FilterKind, custom_value: &str, current_domain: &str) -> Self {
        Self {
            kind,
            keyword: custom_value.to_lowercase(),
            current_domain: current_domain.to_string(),
        }
    }

    /// Determine if a link passes the filter
    pub fn matches(&self, link: &ExtractedLink) -> bool {
        let host = match Url::parse(&link.url) {
            Ok(url) => url.host_str().map(|h| h.to_string()).unwrap_or_default(),
            Err(_) => {
                // Unparseable URLs only survive the permissive filters
                return matches!(
                    self.kind,
                    FilterKind::All | FilterKind::Custom | FilterKind::Unknown
                );
            }
        };

        match self.kind {
            FilterKind::All | FilterKind::Unknown => true,
            FilterKind::Internal => host == self.current_domain,
            FilterKind::External => host != self.current_domain,
            FilterKind::Custom => {
                if self.keyword.is_empty() {
                    return true;
                }
                link.url.to_lowercase().contains(&self.keyword)
                    || link.text.to_lowercase().contains(&self.keyword)
            }
        }
    }

    /// Keep only the links that pass the filter, preserving order
    pub fn apply(&self, links: Vec<ExtractedLink>) -> Vec<ExtractedLink> {
        let before = links.len();
        let kept: Vec<ExtractedLink> = links.into_iter().filter(|l| self.matches(l)).collect();
        ::log::debug!(
            "Filter {:?} kept {} of {} links",
            self.kind,
            kept.len(),
            before
        );
        kept
    }
}
