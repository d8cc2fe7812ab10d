//! Schema types for workflow definitions.
//!
//! A workflow is a flat, ordered list of named steps. Each step names a
//! capability `kind`, an opaque `input` object, and the steps it depends on:
//!
//! ```yaml
//! name: "Product pages"
//! allow_parallel: true
//! persist: true
//! step_timeout_secs: 120
//!
//! steps:
//!   - name: search
//!     kind: discovery
//!     input:
//!       query: "mechanical keyboards"
//!       limit: 5
//!
//!   - name: details
//!     kind: extraction
//!     depends_on: [search]
//!     input:
//!       url: "${steps.search.output.0.url}"
//!       schema:
//!         properties: { title: {}, price: {} }
//!
//!   - name: photos
//!     kind: image-analysis
//!     depends_on: [search]
//!     timeout_secs: 60
//!     input:
//!       images: ["${steps.search.output.0.url}"]
//!       prompt: "What product is shown?"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level workflow definition, supplied once per execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Display name (not required to be unique)
    #[serde(default)]
    pub name: Option<String>,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered list of step declarations
    #[serde(default)]
    pub steps: Vec<StepDeclaration>,

    /// Run independent ready steps of the same wave concurrently
    #[serde(default)]
    pub allow_parallel: bool,

    /// Hand the finished result to the storage collaborator
    #[serde(default)]
    pub persist: bool,

    /// Default dispatch timeout for every step in this workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,
}

/// One declared unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDeclaration {
    /// Step name, unique within the workflow
    pub name: String,

    /// Capability identifier, validated against the registry at build time
    pub kind: String,

    /// Parameters forwarded to the capability. String values may contain
    /// `${steps.<name>.output}` placeholders.
    #[serde(default = "empty_object")]
    pub input: serde_json::Value,

    /// Steps that must succeed before this one may run
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Per-step dispatch timeout override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// The closed set of capabilities a step can be dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityKind {
    Discovery,
    Extraction,
    ImageAnalysis,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 3] = [
        CapabilityKind::Discovery,
        CapabilityKind::Extraction,
        CapabilityKind::ImageAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Discovery => "discovery",
            CapabilityKind::Extraction => "extraction",
            CapabilityKind::ImageAnalysis => "image-analysis",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovery" => Ok(CapabilityKind::Discovery),
            "extraction" => Ok(CapabilityKind::Extraction),
            "image-analysis" | "image_analysis" | "vision" => Ok(CapabilityKind::ImageAnalysis),
            _ => Err(()),
        }
    }
}

impl WorkflowDefinition {
    /// Parse a workflow definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse workflow YAML: {}", e))
    }

    /// Parse a workflow definition from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse workflow JSON: {}", e))
    }

    /// Load a workflow definition from a file. `.json` files are parsed as
    /// JSON, everything else as YAML.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read workflow file '{}': {}", path, e))?;
        if path.ends_with(".json") {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Display name, falling back to a generic label.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed workflow")
    }
}
