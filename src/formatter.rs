use crate::results::ExtractedLink;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Whitespace pattern should be valid"));

/// Output encoding for exported links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// `url1, url2, ...`
    #[default]
    Urls,
    /// `text - url`, one per line
    TextUrl,
    /// `- [text](url)`, one per line
    Markdown,
    /// `name,url,source_page` with minimal quoting
    Csv,
    /// Anything else: one URL per line
    #[serde(other)]
    Lines,
}

/// Collapses whitespace runs to single spaces and trims
pub fn normalize_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Renders links in the requested encoding.
///
/// `source_page` is only used by CSV output.
pub fn format_links(links: &[ExtractedLink], mode: ExportMode, source_page: &str) -> String {
    match mode {
        ExportMode::Urls => links
            .iter()
            .map(|l| l.url.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        ExportMode::TextUrl => links
            .iter()
            .map(|l| format!("{} - {}", normalize_text(&l.text), l.url))
            .collect::<Vec<_>>()
            .join("\n"),
        ExportMode::Markdown => links
            .iter()
            .map(|l| {
                let text = normalize_text(&l.text);
                let label = if text.is_empty() { l.url.as_str() } else { text.as_str() };
                format!("- [{}]({})", label, l.url)
            })
            .collect::<Vec<_>>()
            .join("\n"),
        ExportMode::Csv => {
            let mut rows = Vec::with_capacity(links.len() + 1);
            rows.push("name,url,source_page".to_string());
            for link in links {
                rows.push(format!(
                    "{},{},{}",
                    csv_field(&normalize_text(&link.text)),
                    csv_field(&link.url),
                    csv_field(source_page)
                ));
            }
            rows.join("\n")
        }
        ExportMode::Lines => links
            .iter()
            .map(|l| l.url.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Quotes a field only if it contains a comma or a double quote
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
