use std::collections::BTreeMap;

use indexmap::IndexMap;
use minijinja::{Environment, Error};
use serde::Serialize;

use crate::error::RenderError;
use crate::record::MetadataRecord;

/// Template bundled with the crate, used when no template is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/default_html.template");

/// Variables exposed to attribution templates.
#[derive(Debug, Serialize)]
pub struct AttributionContext<'a> {
    pub abouts: &'a [MetadataRecord],
    pub common_licenses: &'a [&'static str],
    pub license_key_and_context: &'a BTreeMap<String, String>,
    pub license_file_name_and_key: &'a IndexMap<String, String>,
    pub license_key_to_license_name: &'a IndexMap<String, String>,
    pub license_name_to_license_key: &'a IndexMap<String, String>,
    /// Render time, UTC, formatted `YYYY-MM-DD HH:MM:SS`.
    pub utcnow: String,
    /// Free-form `key=value` variables.
    pub vartext_dict: &'a IndexMap<String, String>,
}

/// Text renderer fed with an [`AttributionContext`].
pub trait TemplateRenderer {
    /// Check the template syntax without rendering.
    fn check(&self, source: &str) -> Result<(), RenderError>;

    fn render(&self, source: &str, context: &AttributionContext<'_>) -> Result<String, RenderError>;
}

/// Jinja-syntax renderer.
pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }
}

impl Default for JinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn message(e: &Error) -> String {
    match e.detail() {
        Some(detail) => detail.to_string(),
        None => e.kind().to_string(),
    }
}

impl TemplateRenderer for JinjaRenderer {
    fn check(&self, source: &str) -> Result<(), RenderError> {
        self.env
            .template_from_str(source)
            .map(|_| ())
            .map_err(|e| RenderError::Syntax {
                line: e.line().unwrap_or(0),
                message: message(&e),
            })
    }

    fn render(&self, source: &str, context: &AttributionContext<'_>) -> Result<String, RenderError> {
        let template = self
            .env
            .template_from_str(source)
            .map_err(|e| RenderError::Syntax {
                line: e.line().unwrap_or(0),
                message: message(&e),
            })?;
        template.render(context).map_err(|e| RenderError::Runtime {
            line: e.line(),
            message: message(&e),
        })
    }
}
