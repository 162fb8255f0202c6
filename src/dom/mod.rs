//! DOM capability used by the extractors, the container detector and the
//! pagination locator.
//!
//! The algorithms only ever see a [`Dom`]. The live browser and test fixtures
//! both provide one through [`Snapshot`].

pub mod snapshot;


pub use snapshot::{NodeId, Snapshot};

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use url::Url;

/// Smallest width and height (exclusive) a drawn selection must exceed
pub const MIN_SELECTION_SIZE: f64 = 10.0;

/// Attribute carrying the stable per-element handle written by the host
pub const KEY_ATTR: &str = "data-rl-id";

/// Rendered box of an element in viewport pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// True for collapsed or hidden boxes
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }

    /// Axis-aligned overlap test; touching edges count as overlap
    pub fn intersects(&self, rect: &SelectionRect) -> bool {
        !(self.right() < rect.left
            || self.left > rect.right
            || self.bottom() < rect.top
            || self.top > rect.bottom)
    }
}

/// A user-drawn (or saved) selection rectangle in viewport pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionRect {
    /// Build a rectangle from its top-left corner and size
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            right: left + width,
            bottom: top + height,
            width,
            height,
        }
    }

    /// Build a rectangle from two drag corners in any order
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs())
    }

    /// Whether this rectangle is large enough to count as a real selection
    pub fn is_valid_selection(&self) -> bool {
        let finite = [
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width,
            self.height,
        ]
        .iter()
        .all(|v| v.is_finite());
        finite && self.width > MIN_SELECTION_SIZE && self.height > MIN_SELECTION_SIZE
    }
}

/// Stable handle for an element that survives re-snapshotting the same page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKey(pub String);

impl NodeKey {
    /// CSS selector resolving this handle in the live document
    pub fn css(&self) -> String {
        format!("[{}=\"{}\"]", KEY_ATTR, self.0.replace('"', "\\\""))
    }
}

/// Read-only view of a laid-out document
pub trait Dom {
    type Node: Copy + Eq + Hash + Debug;

    /// The document element
    fn root(&self) -> Self::Node;

    /// The `<body>` element, if any
    fn body(&self) -> Option<Self::Node>;

    /// Document URL used to resolve relative hrefs
    fn base_url(&self) -> Option<&Url>;

    /// All elements matching `selector` in document order; invalid selectors match nothing
    fn query_all(&self, selector: &str) -> Vec<Self::Node>;

    /// Descendants of `scope` (excluding `scope`) matching `selector`
    fn query_all_within(&self, scope: Self::Node, selector: &str) -> Vec<Self::Node>;

    /// Lowercase tag name
    fn tag_name(&self, node: Self::Node) -> &str;

    fn attr(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Parent element
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// Element children in document order
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn bounding_box(&self, node: Self::Node) -> BoundingBox;

    /// Rendered text, excluding content that is never displayed
    fn inner_text(&self, node: Self::Node) -> String;

    /// False when the element (or an ancestor) is not laid out
    fn is_rendered(&self, node: Self::Node) -> bool;

    fn has_pointer_cursor(&self, node: Self::Node) -> bool;

    fn has_click_handler(&self, node: Self::Node) -> bool;

    /// Serialized size of the element's content
    fn content_size(&self, node: Self::Node) -> usize;

    /// Host handle for the element
    fn key(&self, node: Self::Node) -> Option<NodeKey>;

    /// Resolve a host handle back to an element
    fn find_by_key(&self, key: &NodeKey) -> Option<Self::Node>;

    fn query(&self, selector: &str) -> Option<Self::Node> {
        self.query_all(selector).into_iter().next()
    }

    fn query_within(&self, scope: Self::Node, selector: &str) -> Option<Self::Node> {
        self.query_all_within(scope, selector).into_iter().next()
    }

    fn has_attr(&self, node: Self::Node, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Class names in source order
    fn classes(&self, node: Self::Node) -> Vec<&str> {
        self.attr(node, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    fn has_class(&self, node: Self::Node, class: &str) -> bool {
        self.classes(node).contains(&class)
    }

    /// True if `node` is `ancestor` or lies beneath it
    fn contains(&self, ancestor: Self::Node, node: Self::Node) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Number of element ancestors
    fn depth(&self, node: Self::Node) -> usize {
        let mut depth = 0;
        let mut current = self.parent(node);
        while let Some(n) = current {
            depth += 1;
            current = self.parent(n);
        }
        depth
    }
}
