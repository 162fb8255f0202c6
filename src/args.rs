use clap::{Parser, Subcommand, ValueEnum};
use region_links::dom::SelectionRect;
use region_links::formatter::ExportMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "region-links")]
#[command(about = "Extract the links inside a region of a web page, across pages")]
#[command(version)]
pub struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for saved templates and job state
    #[arg(long, global = true)]
    pub storage: Option<String>,

    /// Idle timeout in seconds (watching stops if no page event for this duration)
    #[arg(long, global = true)]
    pub idle_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: CommandArg,
}

#[derive(Subcommand, Debug)]
pub enum CommandArg {
    /// Extract the links intersecting a rectangle
    Select {
        #[arg(long)]
        url: String,

        /// left,top,width,height in viewport pixels
        #[arg(long, value_parser = parse_rect)]
        rect: SelectionRect,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run a saved template on a page
    Run {
        #[arg(long)]
        url: String,

        /// Template name or id
        #[arg(long)]
        template: String,

        /// Copy the formatted output instead of listing it
        #[arg(long)]
        auto: bool,
    },

    /// List saved templates
    Templates {
        /// Only templates created on this domain
        #[arg(long)]
        domain: Option<String>,
    },

    /// Save a selection as a template
    Save {
        #[arg(long)]
        url: String,

        /// left,top,width,height in viewport pixels
        #[arg(long, value_parser = parse_rect)]
        rect: SelectionRect,

        #[arg(long)]
        name: String,

        /// Run whenever a page on this domain loads
        #[arg(long)]
        auto_run: bool,

        #[command(flatten)]
        output: OutputArgs,

        /// Follow pagination
        #[arg(long)]
        multi_page: bool,

        /// Page limit; omit to follow the list to its end
        #[arg(long)]
        max_pages: Option<u32>,

        /// CSS selector of the next-page control
        #[arg(long)]
        pagination_selector: Option<String>,

        /// Extract the whole list the selection belongs to
        #[arg(long)]
        full_list: bool,

        /// Scroll to load lazy content before each page
        #[arg(long)]
        auto_scroll: bool,
    },

    /// Delete a saved template
    Delete {
        #[arg(long)]
        id: String,
    },

    /// Continue an interrupted multi-page job
    Resume {
        #[arg(long)]
        url: String,
    },

    /// Drop an interrupted multi-page job so no page load resumes it
    Cancel,
}

#[derive(clap::Args, Debug)]
pub struct OutputArgs {
    /// Export format
    #[arg(long, value_enum, default_value_t = ExportArg::Urls)]
    pub export: ExportArg,

    /// Strip tracking parameters
    #[arg(long)]
    pub clean_urls: bool,

    /// Keep anchors nested inside other anchors
    #[arg(long)]
    pub include_nested: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportArg {
    Urls,
    TextUrl,
    Markdown,
    Csv,
}

/// Convert from CLI argument export format to the internal export mode
pub fn convert_export_mode(arg: ExportArg) -> ExportMode {
    match arg {
        ExportArg::Urls => ExportMode::Urls,
        ExportArg::TextUrl => ExportMode::TextUrl,
        ExportArg::Markdown => ExportMode::Markdown,
        ExportArg::Csv => ExportMode::Csv,
    }
}

fn parse_rect(value: &str) -> Result<SelectionRect, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in rectangle: {}", e))?;
    match parts.as_slice() {
        [left, top, width, height] => Ok(SelectionRect::new(*left, *top, *width, *height)),
        _ => Err("expected left,top,width,height".to_string()),
    }
}
