//! Error types for region-links.

/// Error type for extraction, template and continuation operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The selection rectangle is missing or too small to be a real selection.
    #[error("Invalid selection area")]
    InvalidSelection,

    /// A template cannot be run as stored.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Another template on the same domain already uses this name.
    #[error("A template named \"{0}\" already exists for this site")]
    DuplicateTemplateName(String),

    /// No template with this id is stored.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The page URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A stored record could not be (de)serialised.
    #[error("Storage format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the backing store failed.
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A WebDriver command failed.
    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    /// No WebDriver session could be opened.
    #[error("WebDriver session could not be created: {0}")]
    Session(String),

    /// The clipboard rejected a write.
    #[error("Clipboard write failed: {0}")]
    Clipboard(String),

    /// The host page did something the engine could not interpret.
    #[error("Page error: {0}")]
    Page(String),
}

/// Result type alias for region-links operations.
pub type Result<T> = std::result::Result<T, Error>;
