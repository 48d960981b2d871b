//! Per-instance policy resolution
//!
//! Merges the global defaults with an instance's override map (ingested from
//! its namespaced tags, or from pinned-instance config) into a fully
//! resolved, typed `Policy`. An override wins whenever it is present and
//! coercible to the type of the corresponding default; coercion failures are
//! configuration errors scoped to that instance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::cloud::is_truthy;
use crate::config::PolicyDefaults;
use crate::errors::{ConfigError, Result, ShutterError};

/// Minimum calendar interval between successive managed snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl FromStr for Frequency {
    type Err = ShutterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(ShutterError::Config(ConfigError::InvalidValue {
                field: "frequency".to_string(),
                reason: format!("unrecognized frequency '{}'", other),
            })),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
        }
    }
}

/// Fully resolved snapshot policy for one instance, immutable for the run
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub frequency: Frequency,
    pub retention_count: u32,
    pub root_volume_selector: String,
    pub delete_old_snapshots: bool,
    pub offsite: Option<OffsitePolicy>,
}

/// Offsite replication settings; present only when replication is enabled,
/// and then every field is resolved
#[derive(Debug, Clone, PartialEq)]
pub struct OffsitePolicy {
    pub region: String,
    pub frequency: Frequency,
    pub retention_count: u32,
}

/// Merge defaults and overrides into a `Policy`.
///
/// Override keys are the bare field names (`frequency`, `retention_count`,
/// ...), lower-cased by the ingestion side. Booleans accept case-insensitive
/// "true"/"yes" as true and anything else as false; integers and frequencies
/// must parse or the instance fails resolution.
pub fn resolve(defaults: &PolicyDefaults, overrides: &HashMap<String, String>) -> Result<Policy> {
    let frequency = match overrides.get("frequency") {
        Some(raw) => raw.parse()?,
        None => defaults.frequency,
    };

    let retention_count = match overrides.get("retention_count") {
        Some(raw) => coerce_u32("retention_count", raw)?,
        None => defaults.retention_count,
    };

    let root_volume_selector = overrides
        .get("root_volume_selector")
        .cloned()
        .unwrap_or_else(|| defaults.root_volume_selector.clone());

    let delete_old_snapshots = overrides
        .get("delete_old_snapshots")
        .map(|raw| is_truthy(raw))
        .unwrap_or(defaults.delete_old_snapshots);

    let offsite_enabled = overrides
        .get("offsite_enabled")
        .map(|raw| is_truthy(raw))
        .unwrap_or(defaults.offsite_enabled);

    let offsite = if offsite_enabled {
        let region = overrides
            .get("offsite_region")
            .cloned()
            .or_else(|| defaults.offsite_region.clone())
            .ok_or_else(|| {
                ShutterError::Config(ConfigError::MissingRequired {
                    field: "offsite_region".to_string(),
                })
            })?;

        let frequency = match overrides.get("offsite_frequency") {
            Some(raw) => raw.parse()?,
            None => defaults.offsite_frequency.ok_or_else(|| {
                ShutterError::Config(ConfigError::MissingRequired {
                    field: "offsite_frequency".to_string(),
                })
            })?,
        };

        let retention_count = match overrides.get("offsite_retention_count") {
            Some(raw) => coerce_u32("offsite_retention_count", raw)?,
            None => defaults.offsite_retention_count.ok_or_else(|| {
                ShutterError::Config(ConfigError::MissingRequired {
                    field: "offsite_retention_count".to_string(),
                })
            })?,
        };

        Some(OffsitePolicy {
            region,
            frequency,
            retention_count,
        })
    } else {
        None
    };

    Ok(Policy {
        frequency,
        retention_count,
        root_volume_selector,
        delete_old_snapshots,
        offsite,
    })
}

fn coerce_u32(field: &str, raw: &str) -> Result<u32> {
    raw.trim().parse::<u32>().map_err(|_| {
        ShutterError::Config(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a non-negative integer", raw),
        })
    })
}
