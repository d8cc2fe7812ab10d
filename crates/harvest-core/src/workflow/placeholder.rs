//! `${steps.<name>.output}` placeholder handling for step inputs.
//!
//! Supported patterns, anywhere inside a JSON string value:
//! - `${steps.<StepName>.output}` — the whole captured output of a step
//! - `${steps.<StepName>.output.<path>}` — a dotted path into that output;
//!   numeric segments index arrays
//!
//! A string that is exactly one placeholder is replaced by the referenced
//! value with its JSON type intact. Placeholders embedded in longer text are
//! rendered as text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{steps\.([^.}]+)\.output((?:\.[^.}]+)*)\}").expect("placeholder pattern")
});

/// Whether a step called `name` can be referenced by a placeholder.
pub fn is_addressable_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(|c: char| c == '.' || c == '}')
}

/// A placeholder that could not be resolved against the available outputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaceholderError {
    #[error("no output captured for step '{step}'")]
    MissingOutput { step: String },

    #[error("output of step '{step}' has no value at '{path}'")]
    MissingPath { step: String, path: String },
}

/// Names of every step referenced by placeholders in `value`, in the order
/// they first appear.
pub fn referenced_steps(value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_references(value, &mut names);
    names
}

fn collect_references(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in PLACEHOLDER_RE.captures_iter(s) {
                let name = caps[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect_references(v, names)),
        _ => {}
    }
}

/// Substitute every placeholder in `value` using `outputs` (step name →
/// captured output).
pub fn resolve(value: &Value, outputs: &HashMap<String, Value>) -> Result<Value, PlaceholderError> {
    match value {
        Value::String(s) => resolve_string(s, outputs),
        Value::Array(items) => items
            .iter()
            .map(|v| resolve(v, outputs))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                resolved.insert(key.clone(), resolve(v, outputs)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string(s: &str, outputs: &HashMap<String, Value>) -> Result<Value, PlaceholderError> {
    // Whole-string placeholder keeps the referenced JSON type
    if let Some(caps) = PLACEHOLDER_RE.captures(s) {
        if caps.get(0).map(|m| m.as_str().len()) == Some(s.len()) {
            return lookup(&caps, outputs).cloned();
        }
    } else {
        return Ok(Value::String(s.to_string()));
    }

    let mut rendered = String::with_capacity(s.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(s) {
        let Some(whole) = caps.get(0) else { continue };
        rendered.push_str(&s[last..whole.start()]);
        match lookup(&caps, outputs)? {
            Value::String(text) => rendered.push_str(text),
            other => rendered.push_str(&other.to_string()),
        }
        last = whole.end();
    }
    rendered.push_str(&s[last..]);
    Ok(Value::String(rendered))
}

fn lookup<'a>(
    caps: &Captures<'_>,
    outputs: &'a HashMap<String, Value>,
) -> Result<&'a Value, PlaceholderError> {
    let step = &caps[1];
    let path = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let mut current = outputs
        .get(step)
        .ok_or_else(|| PlaceholderError::MissingOutput { step: step.to_string() })?;

    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| PlaceholderError::MissingPath {
            step: step.to_string(),
            path: path.trim_start_matches('.').to_string(),
        })?;
    }

    Ok(current)
}
