//! Provider boundary: the data model the core operates on and the
//! `CloudOps` capability it consumes
//!
//! Every cloud call is a fallible remote operation returning either a result
//! or a typed failure. The core never talks to a provider SDK directly; it
//! sees instances, volumes and snapshots through this trait, which keeps the
//! decision engine provider-agnostic and testable against an in-memory
//! implementation.

pub mod http;
pub mod session;

pub use http::HttpCloudClient;
pub use session::{RegionSession, RegionSessions};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::tags;
use crate::errors::Result;

/// Opaque reference to a compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHandle {
    pub id: String,
    pub name: String,
    pub region: String,
}

/// An instance as returned by discovery, with its raw tag map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredInstance {
    pub handle: InstanceHandle,
    pub tags: HashMap<String, String>,
}

/// A block volume attached to an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub device: String,
    pub size_gb: Option<u64>,
}

/// Snapshot lifecycle state as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Pending,
    Completed,
    Error,
}

impl SnapshotStatus {
    /// Providers report richer state machines than we care about; anything
    /// that is not terminal maps to Pending so a wait loop keeps polling
    /// under its timeout bound.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "available" => SnapshotStatus::Completed,
            "error" | "failed" => SnapshotStatus::Error,
            _ => SnapshotStatus::Pending,
        }
    }
}

/// A snapshot, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub volume_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: SnapshotStatus,
    pub description: Option<String>,
    pub tags: HashMap<String, String>,
}

impl Snapshot {
    /// Whether this snapshot carries our provenance marker. Snapshots
    /// without it are invisible to gating and pruning, even when they sit
    /// on the same volume.
    pub fn is_managed(&self) -> bool {
        self.tags
            .get(tags::MANAGED)
            .map(|v| is_truthy(v))
            .unwrap_or(false)
    }

    /// The instance id this snapshot was taken from, if tagged
    pub fn source_instance(&self) -> Option<&str> {
        self.tags.get(tags::SOURCE_INSTANCE).map(String::as_str)
    }
}

/// Case-insensitive truthiness used for tag values ("true"/"yes" only)
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes"
    )
}

/// Locate a volume by selector: device path match first, volume id as a
/// fallback so a selector like "vol-0abc" also works.
pub fn find_volume<'a>(volumes: &'a [Volume], selector: &str) -> Option<&'a Volume> {
    volumes
        .iter()
        .find(|v| v.device == selector)
        .or_else(|| volumes.iter().find(|v| v.id == selector))
}

/// Query-and-mutate capability over a cloud provider's compute API
#[async_trait]
pub trait CloudOps: Send + Sync {
    /// Enumerate all instances in a region with their tag maps
    async fn list_instances(&self, region: &str) -> Result<Vec<DiscoveredInstance>>;

    /// Look up one instance by its stable id
    async fn find_instance_by_id(
        &self,
        region: &str,
        id: &str,
    ) -> Result<Option<DiscoveredInstance>>;

    /// Look up one instance by its name tag
    async fn find_instance_by_name(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<DiscoveredInstance>>;

    /// Enumerate volumes attached to an instance
    async fn list_volumes(&self, instance: &InstanceHandle) -> Result<Vec<Volume>>;

    /// All snapshots of one volume, in provider order
    async fn list_snapshots_by_volume(
        &self,
        region: &str,
        volume_id: &str,
    ) -> Result<Vec<Snapshot>>;

    /// All snapshots in a region carrying the given tag, in provider order
    async fn list_snapshots_by_tag(
        &self,
        region: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Snapshot>>;

    /// Fetch a single snapshot's current state
    async fn get_snapshot(&self, region: &str, snapshot_id: &str) -> Result<Snapshot>;

    /// Create a snapshot of a volume with description and tags
    async fn create_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        description: &str,
        tags: &HashMap<String, String>,
    ) -> Result<Snapshot>;

    /// Copy a snapshot into another region, preserving description and tags
    async fn copy_snapshot(
        &self,
        source_region: &str,
        snapshot_id: &str,
        dest_region: &str,
        description: &str,
        tags: &HashMap<String, String>,
    ) -> Result<Snapshot>;

    /// Delete a snapshot
    async fn delete_snapshot(&self, region: &str, snapshot_id: &str) -> Result<()>;
}
