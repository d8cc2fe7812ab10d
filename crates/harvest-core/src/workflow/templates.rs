//! Built-in workflow templates, embedded at compile time.
//!
//! A template is an ordinary workflow definition whose step inputs may carry
//! `${params.<name>}` parameters. [`WorkflowTemplate::instantiate`] fills
//! them in from caller-supplied values (or the template's defaults) and
//! returns a definition ready for the orchestrator. Step output
//! placeholders (`${steps...}`) are left untouched.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::schema::WorkflowDefinition;

static PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{params\.([A-Za-z0-9_]+)\}").expect("parameter pattern"));

pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image and what it shows.";

/// The templates shipped with harvest, in listing order.
pub static BUILTIN_TEMPLATES: [WorkflowTemplate; 3] = [
    WorkflowTemplate {
        name: "extract-and-analyze",
        source: include_str!("../../templates/extract-and-analyze.yaml"),
        defaults: &[("prompt", DEFAULT_IMAGE_PROMPT)],
    },
    WorkflowTemplate {
        name: "discover-and-extract",
        source: include_str!("../../templates/discover-and-extract.yaml"),
        defaults: &[],
    },
    WorkflowTemplate {
        name: "full-analysis",
        source: include_str!("../../templates/full-analysis.yaml"),
        defaults: &[("prompt", DEFAULT_IMAGE_PROMPT)],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown workflow template '{0}'")]
    UnknownTemplate(String),

    #[error("template '{template}' requires parameter '{parameter}'")]
    MissingParameter { template: String, parameter: String },

    #[error("template '{template}' is malformed: {message}")]
    Malformed { template: String, message: String },
}

#[derive(Debug)]
pub struct WorkflowTemplate {
    pub name: &'static str,
    source: &'static str,
    defaults: &'static [(&'static str, &'static str)],
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateParameter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
}

/// Listing entry for a template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub name: &'static str,
    pub description: Option<String>,
    pub steps: usize,
    pub parameters: Vec<TemplateParameter>,
}

/// Look up a built-in template by name.
pub fn find(name: &str) -> Result<&'static WorkflowTemplate, TemplateError> {
    BUILTIN_TEMPLATES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
}

/// Summaries of every built-in template.
pub fn summaries() -> Result<Vec<TemplateSummary>, TemplateError> {
    BUILTIN_TEMPLATES.iter().map(WorkflowTemplate::summary).collect()
}

impl WorkflowTemplate {
    /// The raw definition, parameters still unfilled.
    pub fn definition(&self) -> Result<WorkflowDefinition, TemplateError> {
        WorkflowDefinition::from_yaml(self.source).map_err(|message| TemplateError::Malformed {
            template: self.name.to_string(),
            message,
        })
    }

    /// Parameter names used anywhere in the step inputs, sorted.
    pub fn parameters(&self) -> Result<Vec<TemplateParameter>, TemplateError> {
        let definition = self.definition()?;
        let mut names = BTreeSet::new();
        for step in &definition.steps {
            collect_parameters(&step.input, &mut names);
        }
        Ok(names
            .into_iter()
            .map(|name| TemplateParameter {
                default: self.default_for(&name),
                name,
            })
            .collect())
    }

    pub fn summary(&self) -> Result<TemplateSummary, TemplateError> {
        let definition = self.definition()?;
        Ok(TemplateSummary {
            name: self.name,
            description: definition.description.clone(),
            steps: definition.steps.len(),
            parameters: self.parameters()?,
        })
    }

    /// Fill in every `${params.X}` from `params`, falling back to the
    /// template's defaults. Blank values count as missing.
    pub fn instantiate(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<WorkflowDefinition, TemplateError> {
        let mut definition = self.definition()?;
        let lookup = |name: &str| -> Result<String, TemplateError> {
            params
                .get(name)
                .map(String::as_str)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| self.default_for(name))
                .map(str::to_string)
                .ok_or_else(|| TemplateError::MissingParameter {
                    template: self.name.to_string(),
                    parameter: name.to_string(),
                })
        };

        for step in &mut definition.steps {
            step.input = fill(&step.input, &lookup)?;
        }

        tracing::debug!("[Templates] Instantiated '{}'", self.name);
        Ok(definition)
    }

    fn default_for(&self, name: &str) -> Option<&'static str> {
        self.defaults
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

fn collect_parameters(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for caps in PARAM_RE.captures_iter(s) {
                names.insert(caps[1].to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_parameters(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect_parameters(v, names)),
        _ => {}
    }
}

fn fill<F>(value: &Value, lookup: &F) -> Result<Value, TemplateError>
where
    F: Fn(&str) -> Result<String, TemplateError>,
{
    match value {
        Value::String(s) => {
            let mut rendered = String::with_capacity(s.len());
            let mut last = 0;
            for caps in PARAM_RE.captures_iter(s) {
                let Some(whole) = caps.get(0) else { continue };
                rendered.push_str(&s[last..whole.start()]);
                rendered.push_str(&lookup(&caps[1])?);
                last = whole.end();
            }
            rendered.push_str(&s[last..]);
            Ok(Value::String(rendered))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| fill(v, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut filled = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                filled.insert(key.clone(), fill(v, lookup)?);
            }
            Ok(Value::Object(filled))
        }
        other => Ok(other.clone()),
    }
}
