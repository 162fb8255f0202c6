//! Container detection: infer a CSS selector for the list that holds a set
//! of selected anchors.

use super::ANCHOR_SELECTOR;
use crate::dom::Dom;
use crate::utils::css_escape;
use std::collections::HashSet;

/// Ancestor levels climbed for a lone selected link
const SINGLE_LINK_ANCESTOR_LEVELS: usize = 3;
/// Deepest ancestor chain considered when looking for an item container
const MAX_ITEM_DEPTH: usize = 10;
/// Classes with this prefix belong to our own overlay
const INTERNAL_CLASS_PREFIX: &str = "rl-";

/// Infers a selector for the element enclosing the repeating list `elements`
/// belongs to. Returns `None` when no container covering every input exists.
pub fn detect_container<D: Dom>(dom: &D, elements: &[D::Node]) -> Option<String> {
    match elements {
        [] => None,
        [single] => {
            let mut container = *single;
            for _ in 0..SINGLE_LINK_ANCESTOR_LEVELS {
                match dom.parent(container) {
                    Some(parent) if !is_document_level(dom, parent) => container = parent,
                    _ => break,
                }
            }
            let selector = generate_selector(dom, container);
            ::log::debug!("Single link container: {}", selector);
            Some(selector)
        }
        _ => {
            let items: Vec<D::Node> = elements
                .iter()
                .map(|el| find_item_container(dom, *el, elements))
                .collect();

            let container = items
                .iter()
                .skip(1)
                .try_fold(items[0], |acc, item| common_ancestor(dom, acc, *item))
                .or_else(|| dom.body())?;

            let anchor_count = dom.query_all_within(container, ANCHOR_SELECTOR).len();
            if anchor_count < elements.len() {
                ::log::debug!(
                    "Container <{}> holds {} anchors, fewer than the {} selected",
                    dom.tag_name(container),
                    anchor_count,
                    elements.len()
                );
                return None;
            }

            let selector = generate_selector(dom, container);
            ::log::debug!(
                "Detected container {} for {} links ({} anchors inside)",
                selector,
                elements.len(),
                anchor_count
            );
            Some(selector)
        }
    }
}

fn is_document_level<D: Dom>(dom: &D, node: D::Node) -> bool {
    matches!(dom.tag_name(node), "body" | "html")
}

/// The outermost ancestor of `element` that still contains exactly one of `all`
fn find_item_container<D: Dom>(dom: &D, element: D::Node, all: &[D::Node]) -> D::Node {
    let mut item = element;
    let mut current = dom.parent(element);
    let mut depth = 0;

    while let Some(node) = current {
        if depth >= MAX_ITEM_DEPTH || is_document_level(dom, node) {
            break;
        }
        let contained = all.iter().filter(|el| dom.contains(node, **el)).count();
        if contained > 1 {
            break;
        }
        if contained == 1 {
            item = node;
        }
        current = dom.parent(node);
        depth += 1;
    }

    item
}

/// Nearest shared ancestor, falling back to `<body>`
fn common_ancestor<D: Dom>(dom: &D, a: D::Node, b: D::Node) -> Option<D::Node> {
    let mut ancestors = HashSet::new();
    let mut current = Some(a);
    while let Some(node) = current {
        ancestors.insert(node);
        current = dom.parent(node);
    }

    let mut current = Some(b);
    while let Some(node) = current {
        if ancestors.contains(&node) {
            return Some(node);
        }
        current = dom.parent(node);
    }

    dom.body()
}

fn is_unique<D: Dom>(dom: &D, selector: &str) -> bool {
    dom.query_all(selector).len() == 1
}

/// `tag.class1.class2`, skipping our own classes. `None` without usable classes
fn class_selector<D: Dom>(dom: &D, node: D::Node) -> Option<String> {
    let classes: Vec<String> = dom
        .classes(node)
        .into_iter()
        .filter(|c| !c.starts_with(INTERNAL_CLASS_PREFIX))
        .map(css_escape)
        .collect();
    if classes.is_empty() {
        return None;
    }
    Some(format!("{}.{}", dom.tag_name(node), classes.join(".")))
}

/// A selector that resolves to `node`, preferring short stable forms
pub fn generate_selector<D: Dom>(dom: &D, node: D::Node) -> String {
    if let Some(id) = dom.attr(node, "id").filter(|id| !id.trim().is_empty()) {
        let selector = format!("#{}", css_escape(id));
        if is_unique(dom, &selector) {
            return selector;
        }
    }

    if let Some(selector) = class_selector(dom, node) {
        if is_unique(dom, &selector) {
            return selector;
        }

        if let Some(parent) = dom.parent(node) {
            let parent_selector = match dom.attr(parent, "id").filter(|id| !id.trim().is_empty()) {
                Some(id) => format!("#{}", css_escape(id)),
                None => class_selector(dom, parent).unwrap_or_else(|| dom.tag_name(parent).to_string()),
            };
            let scoped = format!("{} > {}", parent_selector, selector);
            if is_unique(dom, &scoped) {
                return scoped;
            }
        }
    }

    build_path(dom, node)
}

/// Full `tag:nth-of-type(n)` chain from below `<body>` down to `node`
fn build_path<D: Dom>(dom: &D, node: D::Node) -> String {
    let mut parts = Vec::new();
    let mut current = Some(node);

    while let Some(el) = current {
        let tag = dom.tag_name(el);
        if matches!(tag, "body" | "html") {
            break;
        }

        let mut part = tag.to_string();
        if let Some(parent) = dom.parent(el) {
            let same_tag: Vec<D::Node> = dom
                .children(parent)
                .into_iter()
                .filter(|sibling| dom.tag_name(*sibling) == tag)
                .collect();
            if same_tag.len() > 1 {
                if let Some(position) = same_tag.iter().position(|s| *s == el) {
                    part = format!("{}:nth-of-type({})", tag, position + 1);
                }
            }
        }
        parts.push(part);
        current = dom.parent(el);
    }

    if parts.is_empty() {
        return dom.tag_name(node).to_string();
    }

    parts.reverse();
    format!("body > {}", parts.join(" > "))
}
