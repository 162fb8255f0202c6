use super::{BoundingBox, Dom, KEY_ATTR, NodeKey};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use url::Url;

pub use ego_tree::NodeId;

/// Attribute holding `left,top,width,height` of the element's client rect
pub const BOX_ATTR: &str = "data-rl-box";
/// Present when the element has no offset parent (not laid out)
pub const HIDDEN_ATTR: &str = "data-rl-hidden";
/// Present when the computed cursor is `pointer`
pub const POINTER_ATTR: &str = "data-rl-pointer";
/// Present when the element has a click handler property set
pub const CLICK_ATTR: &str = "data-rl-click";
/// Present on anchors nested inside another anchor in the live tree
pub const NESTED_ATTR: &str = "data-rl-nested";
/// Absolute `href` as resolved by the host
pub const HREF_ATTR: &str = "data-rl-href";

const SKIPPED_TEXT_TAGS: &[&str] = &["script", "style", "noscript", "template", "title", "head"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Parsed copy of a page plus the layout facts the host annotated it with
pub struct Snapshot {
    html: Html,
    base_url: Option<Url>,
    keys: HashMap<NodeId, String>,
    by_key: HashMap<String, NodeId>,
}

impl Snapshot {
    /// Parses a serialized document
    pub fn parse(html: &str) -> Self {
        let html = Html::parse_document(html);
        let mut keys = HashMap::new();
        let mut by_key = HashMap::new();

        // Elements the host did not tag get an ordinal key so fixtures stay addressable
        for (ordinal, element) in html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .enumerate()
        {
            let key = element
                .value()
                .attr(KEY_ATTR)
                .map(|k| k.to_string())
                .unwrap_or_else(|| format!("auto-{}", ordinal));
            by_key.insert(key.clone(), element.id());
            keys.insert(element.id(), key);
        }

        ::log::trace!("Snapshot parsed with {} elements", keys.len());

        Self {
            html,
            base_url: None,
            keys,
            by_key,
        }
    }

    /// Sets the URL relative hrefs are resolved against
    pub fn with_base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Number of elements in the document
    pub fn element_count(&self) -> usize {
        self.keys.len()
    }

    fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    fn selector(selector: &str) -> Option<Selector> {
        match Selector::parse(selector) {
            Ok(sel) => Some(sel),
            Err(e) => {
                ::log::debug!("Ignoring invalid selector {:?}: {:?}", selector, e);
                None
            }
        }
    }
}

fn collect_text(node: ego_tree::NodeRef<'_, scraper::Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            scraper::Node::Text(text) => out.push_str(&text.text),
            scraper::Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TEXT_TAGS.contains(&name) || el.attr(HIDDEN_ATTR).is_some() {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Approximate markup length of one node, ignoring our own annotations
fn serialized_len(node: ego_tree::NodeRef<'_, scraper::Node>) -> usize {
    match node.value() {
        scraper::Node::Text(text) => text.text.len(),
        scraper::Node::Element(el) => {
            let attrs: usize = el
                .attrs()
                .filter(|(name, _)| !name.starts_with("data-rl-"))
                .map(|(name, value)| name.len() + value.len() + 4)
                .sum();
            el.name().len() * 2 + 5 + attrs
        }
        _ => 0,
    }
}

fn parse_box(value: &str) -> Option<BoundingBox> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [left, top, width, height] => Some(BoundingBox::new(*left, *top, *width, *height)),
        _ => None,
    }
}

impl Dom for Snapshot {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.html.root_element().id()
    }

    fn body(&self) -> Option<NodeId> {
        self.query("body")
    }

    fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(sel) = Self::selector(selector) else {
            return Vec::new();
        };
        self.html.select(&sel).map(|e| e.id()).collect()
    }

    fn query_all_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let (Some(el), Some(sel)) = (self.element(scope), Self::selector(selector)) else {
            return Vec::new();
        };
        el.select(&sel).map(|e| e.id()).collect()
    }

    fn tag_name(&self, node: NodeId) -> &str {
        self.element(node).map(|e| e.value().name()).unwrap_or("")
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.value().attr(name)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node)?
            .parent()
            .and_then(ElementRef::wrap)
            .map(|e| e.id())
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        match self.element(node) {
            Some(el) => el
                .children()
                .filter_map(ElementRef::wrap)
                .map(|e| e.id())
                .collect(),
            None => Vec::new(),
        }
    }

    fn bounding_box(&self, node: NodeId) -> BoundingBox {
        self.attr(node, BOX_ATTR)
            .and_then(parse_box)
            .unwrap_or_default()
    }

    fn inner_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(tree_node) = self.html.tree.get(node) {
            collect_text(tree_node, &mut out);
        }
        out
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.has_attr(n, HIDDEN_ATTR) {
                return false;
            }
            current = self.parent(n);
        }
        true
    }

    fn has_pointer_cursor(&self, node: NodeId) -> bool {
        self.has_attr(node, POINTER_ATTR)
    }

    fn has_click_handler(&self, node: NodeId) -> bool {
        self.has_attr(node, CLICK_ATTR) || self.has_attr(node, "onclick")
    }

    fn content_size(&self, node: NodeId) -> usize {
        self.html
            .tree
            .get(node)
            .map(|n| n.descendants().skip(1).map(serialized_len).sum())
            .unwrap_or(0)
    }

    fn key(&self, node: NodeId) -> Option<NodeKey> {
        self.keys.get(&node).cloned().map(NodeKey)
    }

    fn find_by_key(&self, key: &NodeKey) -> Option<NodeId> {
        self.by_key.get(&key.0).copied()
    }
}
