//! Eligible-instance discovery
//!
//! Scans each configured region for instances carrying the opt-in tag,
//! ingests their namespaced tags as policy overrides, and resolves each into
//! an `InstanceHandle` + `Policy` pair. Instances pinned explicitly in the
//! config (by id or name) are resolved the same way and merged in.
//!
//! A region that cannot be enumerated fails the whole run: there is nothing
//! meaningful to do without discovery. A single instance whose overrides do
//! not resolve is logged and skipped; the rest of the fleet proceeds.

use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

use crate::cloud::{is_truthy, CloudOps, InstanceHandle};
use crate::config::Config;
use crate::constants::tags;
use crate::errors::{DiscoveryError, Result, ShutterError};
use crate::policy::{self, Policy};

/// An instance paired with its fully resolved policy
#[derive(Debug, Clone)]
pub struct ResolvedInstance {
    pub handle: InstanceHandle,
    pub policy: Policy,
}

/// Lower-case all tag keys. Providers preserve whatever casing an operator
/// typed; folding once at ingestion is what makes override matching
/// case-insensitive everywhere downstream.
pub fn normalize_tags(raw: HashMap<String, String>) -> HashMap<String, String> {
    raw.into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect()
}

/// Whether the normalized tag map opts this instance in
pub fn is_enabled(normalized_tags: &HashMap<String, String>) -> bool {
    normalized_tags
        .get(tags::ENABLED)
        .map(|v| is_truthy(v))
        .unwrap_or(false)
}

/// Extract policy overrides from a normalized tag map: every tag under the
/// namespace except the enable marker, keyed by its bare field name.
pub fn overrides_from_tags(normalized_tags: &HashMap<String, String>) -> HashMap<String, String> {
    let prefix = format!("{}:", tags::NAMESPACE);

    normalized_tags
        .iter()
        .filter_map(|(k, v)| {
            let field = k.strip_prefix(&prefix)?;
            if field == "enabled" {
                return None;
            }
            Some((field.to_string(), v.clone()))
        })
        .collect()
}

/// Discover and resolve every eligible instance across the configured
/// regions, plus the pinned instances.
pub async fn discover(cloud: &dyn CloudOps, config: &Config) -> Result<Vec<ResolvedInstance>> {
    let mut resolved = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for region in &config.regions {
        let instances = cloud.list_instances(region).await.map_err(|e| {
            ShutterError::Discovery(DiscoveryError::ListFailed {
                region: region.clone(),
                reason: e.to_string(),
            })
        })?;

        debug!("Found {} instances in {}", instances.len(), region);

        for instance in instances {
            let normalized = normalize_tags(instance.tags);

            if !is_enabled(&normalized) {
                debug!(
                    "Instance {} ({}) not opted in, skipping",
                    instance.handle.id, instance.handle.name
                );
                continue;
            }

            let overrides = overrides_from_tags(&normalized);
            match policy::resolve(&config.defaults, &overrides) {
                Ok(policy) => {
                    seen.insert(instance.handle.id.clone());
                    resolved.push(ResolvedInstance {
                        handle: instance.handle,
                        policy,
                    });
                }
                Err(e) => {
                    error!(
                        "Skipping instance {} ({}): {}",
                        instance.handle.id, instance.handle.name, e
                    );
                }
            }
        }
    }

    for pinned in &config.instances {
        let found = if let Some(id) = &pinned.id {
            cloud.find_instance_by_id(&pinned.region, id).await?
        } else if let Some(name) = &pinned.name {
            cloud.find_instance_by_name(&pinned.region, name).await?
        } else {
            None
        };

        let instance = match found {
            Some(instance) => instance,
            None => {
                warn!(
                    "Pinned instance {} in {} not found, skipping",
                    pinned.id.as_deref().or(pinned.name.as_deref()).unwrap_or("?"),
                    pinned.region
                );
                continue;
            }
        };

        if seen.contains(&instance.handle.id) {
            debug!(
                "Pinned instance {} already discovered by tag, skipping duplicate",
                instance.handle.id
            );
            continue;
        }

        // Config overrides stack on top of whatever tags the instance carries
        let normalized = normalize_tags(instance.tags);
        let mut overrides = overrides_from_tags(&normalized);
        for (k, v) in &pinned.overrides {
            overrides.insert(k.to_ascii_lowercase(), v.clone());
        }

        match policy::resolve(&config.defaults, &overrides) {
            Ok(policy) => {
                seen.insert(instance.handle.id.clone());
                resolved.push(ResolvedInstance {
                    handle: instance.handle,
                    policy,
                });
            }
            Err(e) => {
                error!(
                    "Skipping pinned instance {} ({}): {}",
                    instance.handle.id, instance.handle.name, e
                );
            }
        }
    }

    info!("Resolved {} eligible instances", resolved.len());
    Ok(resolved)
}
