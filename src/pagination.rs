//! Locating the "next page" control.

use crate::dom::{Dom, NodeKey};
use crate::error::Result;
use crate::page::Page;

/// Common next-page markup, most specific first
const NEXT_PATTERNS: &[&str] = &[
    r#"a[rel="next"]"#,
    r#"a[aria-label*="next" i]"#,
    r#"button[aria-label*="next" i]"#,
    ".pagination .next:not(.disabled)",
    ".pagination a:not(.disabled):last-of-type",
    r#"a[title*="next" i]"#,
    r#"button[title*="next" i]"#,
];

/// Control labels treated as "next" when no pattern matches
const NEXT_LABELS: &[&str] = &["next", "next page", "›", "→"];

/// Ancestor levels searched for a wrapper that owns the click handler
const CLICKABLE_ANCESTOR_LEVELS: usize = 3;

/// Elements the `disabled` attribute applies to
const FORM_CONTROLS: &[&str] = &["button", "input", "select", "textarea"];

/// Whether a control can be activated.
///
/// Native buttons and anchors must not be disabled and must be laid out.
/// Other elements only need to be visible and not flagged disabled. The
/// `disabled` attribute only counts on form controls; anchors ignore it.
pub fn is_button_enabled<D: Dom>(dom: &D, node: D::Node) -> bool {
    let tag = dom.tag_name(node);
    let disabled_class = dom.has_class(node, "disabled");
    let aria_disabled = dom.has_attr(node, "aria-disabled");
    let native_disabled = FORM_CONTROLS.contains(&tag) && dom.has_attr(node, "disabled");

    match tag {
        "a" | "button" => {
            !native_disabled && !disabled_class && !aria_disabled && dom.is_rendered(node)
        }
        _ => {
            let visible = dom.is_rendered(node) && !dom.bounding_box(node).is_empty();
            visible && !native_disabled && !disabled_class && !aria_disabled
        }
    }
}

/// Finds a next-page control without a saved selector
pub fn auto_detect_next_button<D: Dom>(dom: &D) -> Option<D::Node> {
    for pattern in NEXT_PATTERNS {
        if let Some(node) = dom.query(pattern) {
            if is_button_enabled(dom, node) {
                ::log::debug!("Next button matched pattern {}", pattern);
                return Some(node);
            }
        }
    }

    dom.query_all("a, button").into_iter().find(|node| {
        let text = dom.inner_text(*node).trim().to_lowercase();
        NEXT_LABELS.contains(&text.as_str()) && is_button_enabled(dom, *node)
    })
}

/// Resolves the next-page control on the current page.
///
/// A saved selector that resolves at all wins over auto-detection; if its
/// element is collapsed it is scrolled into view first. `Ok(None)` means
/// there is no next page.
pub async fn find_next_page_button<P: Page + ?Sized>(
    page: &P,
    saved_selector: Option<&str>,
) -> Result<Option<NodeKey>> {
    let dom = page.snapshot().await?;

    if let Some(selector) = saved_selector.filter(|s| !s.trim().is_empty()) {
        if let Some(node) = dom.query(selector) {
            if let Some(key) = dom.key(node) {
                if dom.bounding_box(node).is_empty() {
                    page.scroll_into_view(&key).await?;
                    let dom = page.snapshot().await?;
                    let enabled = dom
                        .find_by_key(&key)
                        .is_some_and(|n| is_button_enabled(&dom, n));
                    ::log::debug!("Saved next button scrolled into view, enabled: {}", enabled);
                } else {
                    ::log::debug!(
                        "Saved next button resolved, enabled: {}",
                        is_button_enabled(&dom, node)
                    );
                }
                return Ok(Some(key));
            }
        }
        ::log::debug!("Saved pagination selector {} did not resolve", selector);
    }

    Ok(auto_detect_next_button(&dom).and_then(|node| dom.key(node)))
}

/// The element that should receive the click: `node` itself, or the
/// nearest of its first few ancestors that looks like the real button
pub fn clickable_target<D: Dom>(dom: &D, node: D::Node) -> D::Node {
    let mut current = dom.parent(node);
    for _ in 0..CLICKABLE_ANCESTOR_LEVELS {
        let Some(ancestor) = current else {
            break;
        };
        if dom.attr(ancestor, "role") == Some("button")
            || dom.has_click_handler(ancestor)
            || dom.has_pointer_cursor(ancestor)
        {
            return ancestor;
        }
        current = dom.parent(ancestor);
    }
    node
}
