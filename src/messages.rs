//! JSON command surface used by popups and automation.
//!
//! Messages carry an `action` tag, e.g.
//! `{"action":"START_SELECTION","exportMode":"markdown"}`.

use crate::config::{Preferences, default_true};
use crate::error::Result;
use crate::formatter::ExportMode;
use crate::session::Session;
use crate::templates::Template;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Liveness probe
    Ping,

    #[serde(rename_all = "camelCase")]
    StartSelection {
        #[serde(default)]
        export_mode: ExportMode,
        #[serde(default)]
        clean_urls: bool,
        #[serde(default = "default_true")]
        ignore_nested_anchors: bool,
    },

    CancelSelection,

    /// Runs `template`; `autoRun` defaults to the template's own flag
    #[serde(rename_all = "camelCase")]
    RunTemplate {
        template: Template,
        #[serde(default)]
        auto_run: Option<bool>,
    },

    GetTemplates { domain: String },

    ResumeMultipage,

    /// The cancel button of a running multi-page job
    CancelMultipage,
}

impl Command {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Loaded { loaded: bool },
    Templates { templates: Vec<Template> },
    Success { success: bool },
}

impl Response {
    fn success(ok: bool) -> Self {
        Response::Success { success: ok }
    }
}

/// Routes one command to the session.
///
/// Failures the user has already been told about (an invalid template, an
/// extraction error) come back as `{"success":false}` rather than `Err`.
pub async fn dispatch(session: &Session, command: Command) -> Result<Response> {
    ::log::debug!("Dispatching {:?}", command);
    match command {
        Command::Ping => Ok(Response::Loaded { loaded: true }),
        Command::StartSelection {
            export_mode,
            clean_urls,
            ignore_nested_anchors,
        } => {
            session.start_selection(Preferences {
                export_mode,
                clean_urls,
                ignore_nested_anchors,
            });
            Ok(Response::success(true))
        }
        Command::CancelSelection => {
            session.cancel_selection();
            Ok(Response::success(true))
        }
        Command::RunTemplate { template, auto_run } => {
            let auto_run = auto_run.unwrap_or(template.auto_run);
            match session.run_template(template, auto_run).await {
                Ok(outcome) => {
                    ::log::debug!("Template run ended: {:?}", outcome);
                    Ok(Response::success(true))
                }
                Err(e) => {
                    ::log::error!("Template run failed: {}", e);
                    Ok(Response::success(false))
                }
            }
        }
        Command::GetTemplates { domain } => Ok(Response::Templates {
            templates: session.get_templates(&domain).await?,
        }),
        Command::ResumeMultipage => {
            session.resume_multipage().await?;
            Ok(Response::success(true))
        }
        Command::CancelMultipage => {
            session.cancel_multipage().await?;
            Ok(Response::success(true))
        }
    }
}
