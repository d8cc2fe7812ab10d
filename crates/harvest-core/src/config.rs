//! Environment-driven configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `DISCOVERY_URL` | `http://agent-discovery:8001` |
//! | `EXTRACTION_URL` | `http://agent-extraction:8004` |
//! | `VISION_URL` | `http://agent-vision:8003` |
//! | `HARVEST_STEP_TIMEOUT_SECS` | `300` |
//! | `HARVEST_DB_PATH` | `harvest.db` |

use std::time::Duration;

pub const DEFAULT_DISCOVERY_URL: &str = "http://agent-discovery:8001";
pub const DEFAULT_EXTRACTION_URL: &str = "http://agent-extraction:8004";
pub const DEFAULT_VISION_URL: &str = "http://agent-vision:8003";
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_DB_PATH: &str = "harvest.db";

/// Base URLs of the capability services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEndpoints {
    pub discovery_url: String,
    pub extraction_url: String,
    pub vision_url: String,
}

impl Default for CapabilityEndpoints {
    fn default() -> Self {
        Self {
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            extraction_url: DEFAULT_EXTRACTION_URL.to_string(),
            vision_url: DEFAULT_VISION_URL.to_string(),
        }
    }
}

impl CapabilityEndpoints {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            discovery_url: get("DISCOVERY_URL", DEFAULT_DISCOVERY_URL),
            extraction_url: get("EXTRACTION_URL", DEFAULT_EXTRACTION_URL),
            vision_url: get("VISION_URL", DEFAULT_VISION_URL),
        }
    }
}

/// Everything needed to build an orchestrator and its run store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub endpoints: CapabilityEndpoints,
    pub step_timeout: Duration,
    pub db_path: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            endpoints: CapabilityEndpoints::default(),
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            db_path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let step_timeout_secs = match lookup("HARVEST_STEP_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(
                    "Ignoring invalid HARVEST_STEP_TIMEOUT_SECS '{}', using {}",
                    raw,
                    DEFAULT_STEP_TIMEOUT_SECS
                );
                DEFAULT_STEP_TIMEOUT_SECS
            }),
            None => DEFAULT_STEP_TIMEOUT_SECS,
        };

        Self {
            endpoints: CapabilityEndpoints::from_lookup(&lookup),
            step_timeout: Duration::from_secs(step_timeout_secs),
            db_path: lookup("HARVEST_DB_PATH")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<String>) -> Self {
        self.db_path = db_path.into();
        self
    }
}
