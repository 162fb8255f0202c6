use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A link found on the page, with its best-effort label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedLink {
    /// Human readable label
    pub text: String,

    /// Normalized absolute URL (identity key)
    pub url: String,

    /// Enumeration order of the anchor at extraction time
    pub index: usize,

    /// Viewport-relative top edge at extraction time
    pub top: f64,

    /// Viewport-relative left edge at extraction time
    pub left: f64,
}

impl ExtractedLink {
    /// Create a new extracted link
    pub fn new(text: String, url: String, index: usize, top: f64, left: f64) -> Self {
        Self {
            text,
            url,
            index,
            top,
            left,
        }
    }
}

/// Formatted output waiting to be written to the clipboard by whichever
/// surface picks it up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAutoCopy {
    pub text: String,
    pub count: usize,
    /// Epoch milliseconds when the record was written
    pub timestamp: i64,
}

/// Removes links whose URL was already seen, keeping the first occurrence
/// and the relative order of survivors.
pub fn dedupe_links(links: Vec<ExtractedLink>) -> Vec<ExtractedLink> {
    let mut seen = HashSet::with_capacity(links.len());
    links
        .into_iter()
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str, index: usize) -> ExtractedLink {
        ExtractedLink::new(format!("text {index}"), url.to_string(), index, 0.0, 0.0)
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence_in_order() {
        let input = vec![
            link("a", 0),
            link("b", 1),
            link("a", 2),
            link("c", 3),
            link("b", 4),
        ];
        let out = dedupe_links(input);
        let urls: Vec<&str> = out.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
        assert_eq!(out[0].index, 0);
        assert_eq!(out[1].index, 1);
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let once = dedupe_links(vec![link("a", 0), link("a", 1), link("b", 2)]);
        let twice = dedupe_links(once.clone());
        assert_eq!(once, twice);
    }
}
