pub mod manager;
pub use manager::ConfigManager;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{api, scheduling};
use crate::policy::Frequency;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Regions scanned for eligible instances
    pub regions: Vec<String>,

    /// Provider API endpoint template; `{region}` is substituted per region
    pub api_endpoint: String,

    /// Bearer token presented on every provider API request
    pub api_key: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_copy_wait_timeout")]
    pub copy_wait_timeout_seconds: u64,

    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Global policy defaults; per-instance tags override individual fields
    pub defaults: PolicyDefaults,

    /// Instances pinned explicitly by id or name, in addition to tag discovery
    #[serde(default)]
    pub instances: Vec<PinnedInstance>,
}

fn default_request_timeout() -> u64 {
    api::REQUEST_TIMEOUT_SECONDS
}

fn default_copy_wait_timeout() -> u64 {
    api::COPY_WAIT_TIMEOUT_SECONDS
}

fn default_concurrency_limit() -> usize {
    scheduling::DEFAULT_CONCURRENCY_LIMIT
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Global policy defaults. Every field an instance can override has a
/// complete default here; deserialization fails fast when one is missing,
/// which is what lets the resolver assume completeness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDefaults {
    pub frequency: Frequency,
    pub retention_count: u32,
    pub root_volume_selector: String,
    pub delete_old_snapshots: bool,
    #[serde(default)]
    pub offsite_enabled: bool,
    pub offsite_region: Option<String>,
    pub offsite_frequency: Option<Frequency>,
    pub offsite_retention_count: Option<u32>,
}

/// An instance named directly in the config rather than found by tag.
/// Exactly one of `id` / `name` is expected; `id` wins when both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnedInstance {
    pub region: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}
