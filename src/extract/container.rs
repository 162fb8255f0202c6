use super::{ANCHOR_SELECTOR, ExtractOptions, build_link, is_nested_anchor};
use crate::dom::Dom;
use crate::results::{ExtractedLink, dedupe_links};

/// Extracts every visible link beneath the element matched by `selector`.
///
/// If the container holds no anchors at all, the descendant with the most
/// visible anchors is used instead.
pub fn extract_from_container<D: Dom>(
    dom: &D,
    selector: &str,
    options: &ExtractOptions,
) -> Vec<ExtractedLink> {
    let Some(mut container) = dom.query(selector) else {
        ::log::warn!("Container not found: {}", selector);
        return Vec::new();
    };

    let mut anchors = dom.query_all_within(container, ANCHOR_SELECTOR);
    if anchors.is_empty() {
        if let Some(better) = find_best_child_container(dom, container) {
            ::log::debug!(
                "Container {} has no links, using <{}> descendant instead",
                selector,
                dom.tag_name(better)
            );
            container = better;
            anchors = dom.query_all_within(container, ANCHOR_SELECTOR);
        }
    }

    let mut extracted = Vec::new();
    for (index, anchor) in anchors.iter().copied().enumerate() {
        if !is_visible(dom, anchor) {
            continue;
        }
        if options.ignore_nested_anchors && is_nested_anchor(dom, anchor) {
            continue;
        }
        if let Some(link) = build_link(dom, anchor, index, options) {
            extracted.push(link);
        }
    }

    ::log::debug!(
        "Container extraction from {}: {} anchors, {} extracted",
        selector,
        anchors.len(),
        extracted.len()
    );

    dedupe_links(extracted)
}

/// Laid out and non-zero in size
fn is_visible<D: Dom>(dom: &D, node: D::Node) -> bool {
    dom.is_rendered(node) && !dom.bounding_box(node).is_empty()
}

fn visible_anchor_count<D: Dom>(dom: &D, node: D::Node) -> usize {
    dom.query_all_within(node, ANCHOR_SELECTOR)
        .into_iter()
        .filter(|a| dom.is_rendered(*a))
        .count()
}

/// Descendant holding the most visible anchors; ties go to the shallower one
fn find_best_child_container<D: Dom>(dom: &D, parent: D::Node) -> Option<D::Node> {
    let mut best: Option<(D::Node, usize, usize)> = None;

    for candidate in dom.query_all_within(parent, "*") {
        let count = visible_anchor_count(dom, candidate);
        if count == 0 {
            continue;
        }
        let depth = dom.depth(candidate);
        let better = match best {
            None => true,
            Some((_, best_count, best_depth)) => {
                count > best_count || (count == best_count && depth < best_depth)
            }
        };
        if better {
            best = Some((candidate, count, depth));
        }
    }

    best.map(|(node, _, _)| node)
}
