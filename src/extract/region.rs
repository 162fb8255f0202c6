use super::{ANCHOR_SELECTOR, ExtractOptions, build_link, is_nested_anchor};
use crate::dom::{Dom, SelectionRect};
use crate::results::{ExtractedLink, dedupe_links};

/// Extracts every visible link intersecting `rect`, deduplicated by URL.
///
/// Each call re-scans the document, so results reflect the DOM as it is now.
pub fn extract_links<D: Dom>(
    dom: &D,
    rect: &SelectionRect,
    options: &ExtractOptions,
) -> Vec<ExtractedLink> {
    let anchors = dom.query_all(ANCHOR_SELECTOR);
    let mut extracted = Vec::new();
    let mut intersecting = 0usize;

    for (index, anchor) in anchors.iter().copied().enumerate() {
        let bbox = dom.bounding_box(anchor);
        if !bbox.intersects(rect) {
            continue;
        }
        intersecting += 1;

        if bbox.is_empty() {
            continue;
        }

        if options.ignore_nested_anchors && is_nested_anchor(dom, anchor) {
            ::log::trace!("Skipping nested anchor at index {}", index);
            continue;
        }

        if let Some(link) = build_link(dom, anchor, index, options) {
            extracted.push(link);
        }
    }

    ::log::debug!(
        "Region extraction: {} anchors, {} intersecting, {} extracted",
        anchors.len(),
        intersecting,
        extracted.len()
    );

    if extracted.is_empty() && !anchors.is_empty() {
        for anchor in anchors.iter().take(5) {
            ::log::debug!(
                "Anchor outside selection: {:?} at {:?}",
                dom.attr(*anchor, "href"),
                dom.bounding_box(*anchor)
            );
        }
    }

    dedupe_links(extracted)
}

/// Anchor elements visually inside `rect`, used to seed container detection
pub fn anchors_in_rect<D: Dom>(dom: &D, rect: &SelectionRect) -> Vec<D::Node> {
    dom.query_all(ANCHOR_SELECTOR)
        .into_iter()
        .filter(|a| {
            let bbox = dom.bounding_box(*a);
            bbox.intersects(rect) && !bbox.is_empty()
        })
        .collect()
}
