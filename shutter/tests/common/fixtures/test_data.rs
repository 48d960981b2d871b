//! Common seed data builders

use chrono::{Duration, Utc};
use std::collections::HashMap;

use shutter::cloud::{InstanceHandle, Snapshot, SnapshotStatus};
use shutter::constants::tags;
use shutter::discovery::ResolvedInstance;
use shutter::policy::{Frequency, OffsitePolicy, Policy};

pub const PRIMARY_REGION: &str = "us-east-1";
pub const OFFSITE_REGION: &str = "eu-west-1";
pub const ROOT_DEVICE: &str = "/dev/sda1";

pub fn handle(id: &str, name: &str) -> InstanceHandle {
    InstanceHandle {
        id: id.to_string(),
        name: name.to_string(),
        region: PRIMARY_REGION.to_string(),
    }
}

pub fn daily_policy(retention_count: u32) -> Policy {
    Policy {
        frequency: Frequency::Daily,
        retention_count,
        root_volume_selector: ROOT_DEVICE.to_string(),
        delete_old_snapshots: true,
        offsite: None,
    }
}

pub fn with_offsite(mut policy: Policy, frequency: Frequency, retention_count: u32) -> Policy {
    policy.offsite = Some(OffsitePolicy {
        region: OFFSITE_REGION.to_string(),
        frequency,
        retention_count,
    });
    policy
}

pub fn resolved(handle: InstanceHandle, policy: Policy) -> ResolvedInstance {
    ResolvedInstance { handle, policy }
}

/// A managed snapshot of `volume_id`, `age_days` old, tagged back to `source`
pub fn managed_snapshot(id: &str, volume_id: &str, age_days: i64, source: &str) -> Snapshot {
    let mut tag_map = HashMap::new();
    tag_map.insert(tags::MANAGED.to_string(), "true".to_string());
    tag_map.insert(tags::SOURCE_INSTANCE.to_string(), source.to_string());

    Snapshot {
        id: id.to_string(),
        volume_id: Some(volume_id.to_string()),
        created_at: Utc::now() - Duration::days(age_days),
        status: SnapshotStatus::Completed,
        description: None,
        tags: tag_map,
    }
}

/// An offsite copy (no volume attachment), tagged back to `source`
pub fn offsite_copy(id: &str, age_days: i64, source: &str) -> Snapshot {
    let mut snapshot = managed_snapshot(id, "unused", age_days, source);
    snapshot.volume_id = None;
    snapshot
}

/// A snapshot some other tool created on the same volume
pub fn unmanaged_snapshot(id: &str, volume_id: &str, age_days: i64) -> Snapshot {
    Snapshot {
        id: id.to_string(),
        volume_id: Some(volume_id.to_string()),
        created_at: Utc::now() - Duration::days(age_days),
        status: SnapshotStatus::Completed,
        description: None,
        tags: HashMap::new(),
    }
}

/// Tag map for an opted-in instance, with optional extra namespaced tags
pub fn enabled_tags(extra: &[(&str, &str)]) -> HashMap<String, String> {
    let mut tag_map = HashMap::new();
    tag_map.insert(tags::ENABLED.to_string(), "true".to_string());
    for (k, v) in extra {
        tag_map.insert(k.to_string(), v.to_string());
    }
    tag_map
}
