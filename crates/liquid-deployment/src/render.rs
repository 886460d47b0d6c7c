//! Job template rendering
//!
//! Templates are scheduler job files with `${name}` placeholders. Only known
//! variables are substituted; anything else, such as the scheduler's own
//! runtime interpolation (`${NOMAD_ALLOC_DIR}`), is left untouched.

use crate::config::{CollectionConfig, LiquidConfig};
use crate::error::{DeployError, DeployResult};
use async_trait::async_trait;
use liquid_types::CollectionName;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Variables available to a template
pub type TemplateVars = BTreeMap<String, String>;

/// Produces job text from a template name
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(&self, template: &str, vars: &TemplateVars) -> DeployResult<String>;
}

/// Variables every template receives.
pub fn node_vars(config: &LiquidConfig) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("liquid_domain".into(), config.liquid.domain.clone());
    vars.insert("liquid_debug".into(), config.liquid.debug.to_string());
    vars.insert(
        "liquid_http_protocol".into(),
        config.liquid.http_protocol.clone(),
    );
    vars.insert(
        "liquid_volumes".into(),
        config.liquid.volumes.display().to_string(),
    );
    vars
}

/// Variables of a collection template.
pub fn collection_vars(
    config: &LiquidConfig,
    name: &CollectionName,
    settings: &CollectionConfig,
) -> TemplateVars {
    let mut vars = node_vars(config);
    for (key, value) in &settings.extra {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        vars.insert(key.clone(), value);
    }
    vars.insert("name".into(), name.to_string());
    vars.insert(
        "title".into(),
        settings.title.clone().unwrap_or_else(|| name.to_string()),
    );
    vars.insert("workers".into(), settings.workers.unwrap_or(1).to_string());
    vars
}

/// Substitute known `${name}` placeholders.
pub fn substitute(text: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) => match vars.get(after[..end].trim()) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str("${");
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Renders templates from files in a directory
pub struct FileTemplates {
    dir: PathBuf,
}

impl FileTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl TemplateRenderer for FileTemplates {
    async fn render(&self, template: &str, vars: &TemplateVars) -> DeployResult<String> {
        let path = self.dir.join(template);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DeployError::Template {
                template: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(substitute(&text, vars))
    }
}

/// Renders templates held in memory
#[derive(Default)]
pub struct InMemoryTemplates {
    templates: BTreeMap<String, String>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.templates.insert(name.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl TemplateRenderer for InMemoryTemplates {
    async fn render(&self, template: &str, vars: &TemplateVars) -> DeployResult<String> {
        self.templates
            .get(template)
            .map(|text| substitute(text, vars))
            .ok_or_else(|| DeployError::Template {
                template: template.to_string(),
                reason: "not found".to_string(),
            })
    }
}
