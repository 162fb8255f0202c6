//! Link extraction from a laid-out document.
//!
//! [`region`] maps a screen rectangle to links, [`container`] maps a CSS
//! container to links, and [`detector`] infers a container selector from a
//! set of selected anchors.

pub mod container;
pub mod detector;
pub mod region;

#[cfg(test)]
mod tests;

pub use container::extract_from_container;
pub use detector::detect_container;
pub use region::{anchors_in_rect, extract_links};

use crate::dom::Dom;
use crate::dom::snapshot::{HREF_ATTR, NESTED_ATTR};
use crate::results::ExtractedLink;
use crate::urls;

/// Selector for every anchor that carries an href
pub const ANCHOR_SELECTOR: &str = "a[href]";

/// Per-run extraction switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Strip known tracking parameters from URLs
    pub clean_urls: bool,
    /// Skip anchors that sit inside another anchor
    pub ignore_nested_anchors: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            clean_urls: false,
            ignore_nested_anchors: true,
        }
    }
}

/// Absolute href of an anchor, resolved against the document URL.
///
/// Returns `None` for anchors whose href is empty.
pub fn absolute_href<D: Dom>(dom: &D, anchor: D::Node) -> Option<String> {
    if let Some(resolved) = dom.attr(anchor, HREF_ATTR) {
        if !resolved.trim().is_empty() {
            return Some(resolved.to_string());
        }
    }

    let raw = dom.attr(anchor, "href")?.trim();
    if raw.is_empty() {
        return None;
    }

    match dom.base_url().map(|base| base.join(raw)) {
        Some(Ok(url)) => Some(url.to_string()),
        _ => Some(raw.to_string()),
    }
}

/// True if the anchor is contained inside another anchor
pub fn is_nested_anchor<D: Dom>(dom: &D, anchor: D::Node) -> bool {
    if dom.has_attr(anchor, NESTED_ATTR) {
        return true;
    }
    let mut current = dom.parent(anchor);
    while let Some(node) = current {
        if dom.tag_name(node) == "a" && dom.has_attr(node, "href") {
            return true;
        }
        current = dom.parent(node);
    }
    false
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Best-effort human label for an anchor.
///
/// Tries rendered text, the anchor's `aria-label`/`title`, a contained
/// image's `alt`/`title`, a contained SVG's `<title>` or `aria-label`, and
/// finally a label synthesized from the URL.
pub fn link_text<D: Dom>(dom: &D, anchor: D::Node, href: &str) -> String {
    if let Some(text) = non_empty(Some(dom.inner_text(anchor).as_str())) {
        return text;
    }

    if let Some(text) = non_empty(dom.attr(anchor, "aria-label"))
        .or_else(|| non_empty(dom.attr(anchor, "title")))
    {
        return text;
    }

    if let Some(img) = dom.query_within(anchor, "img") {
        if let Some(text) =
            non_empty(dom.attr(img, "alt")).or_else(|| non_empty(dom.attr(img, "title")))
        {
            return text;
        }
    }

    if let Some(svg) = dom.query_within(anchor, "svg") {
        let title = dom
            .query_within(svg, "title")
            .and_then(|t| non_empty(Some(dom.inner_text(t).as_str())));
        if let Some(text) = title.or_else(|| non_empty(dom.attr(svg, "aria-label"))) {
            return text;
        }
    }

    urls::label_from_url(href)
}

/// Builds the extracted record for one anchor, or `None` if it has no usable href
pub(crate) fn build_link<D: Dom>(
    dom: &D,
    anchor: D::Node,
    index: usize,
    options: &ExtractOptions,
) -> Option<ExtractedLink> {
    let href = absolute_href(dom, anchor)?;
    let text = link_text(dom, anchor, &href);
    let url = urls::normalize(&href, options.clean_urls);
    let bbox = dom.bounding_box(anchor);
    Some(ExtractedLink::new(text, url, index, bbox.top, bbox.left))
}
