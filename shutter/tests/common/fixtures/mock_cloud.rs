//! In-memory cloud provider for exercising the decision engine without HTTP

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use shutter::cloud::{
    CloudOps, DiscoveredInstance, InstanceHandle, Snapshot, SnapshotStatus, Volume,
};
use shutter::errors::{OperationError, Result, ShutterError};

pub struct MockCloud {
    state: Mutex<MockState>,
    next_id: AtomicU64,
}

struct MockState {
    /// region -> instances
    instances: HashMap<String, Vec<DiscoveredInstance>>,
    /// instance id -> attached volumes
    volumes: HashMap<String, Vec<Volume>>,
    /// region -> snapshots
    snapshots: HashMap<String, Vec<Snapshot>>,
    /// regions whose instance listing fails
    failing_regions: HashSet<String>,
    /// snapshot ids that refuse deletion
    undeletable: HashSet<String>,
    /// status newly created snapshots report
    create_status: SnapshotStatus,
}

impl MockCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                instances: HashMap::new(),
                volumes: HashMap::new(),
                snapshots: HashMap::new(),
                failing_regions: HashSet::new(),
                undeletable: HashSet::new(),
                create_status: SnapshotStatus::Completed,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    fn request_failed(region: &str, operation: &str, reason: &str) -> ShutterError {
        ShutterError::Operation(OperationError::RequestFailed {
            region: region.to_string(),
            operation: operation.to_string(),
            reason: reason.to_string(),
        })
    }

    pub async fn seed_instance(
        &self,
        region: &str,
        id: &str,
        name: &str,
        tags: HashMap<String, String>,
    ) {
        let mut state = self.state.lock().await;
        state
            .instances
            .entry(region.to_string())
            .or_default()
            .push(DiscoveredInstance {
                handle: InstanceHandle {
                    id: id.to_string(),
                    name: name.to_string(),
                    region: region.to_string(),
                },
                tags,
            });
    }

    pub async fn seed_volume(&self, instance_id: &str, volume_id: &str, device: &str) {
        let mut state = self.state.lock().await;
        state
            .volumes
            .entry(instance_id.to_string())
            .or_default()
            .push(Volume {
                id: volume_id.to_string(),
                device: device.to_string(),
                size_gb: Some(100),
            });
    }

    pub async fn seed_snapshot(&self, region: &str, snapshot: Snapshot) {
        let mut state = self.state.lock().await;
        state
            .snapshots
            .entry(region.to_string())
            .or_default()
            .push(snapshot);
    }

    pub async fn snapshots_in(&self, region: &str) -> Vec<Snapshot> {
        let state = self.state.lock().await;
        state.snapshots.get(region).cloned().unwrap_or_default()
    }

    pub async fn fail_region(&self, region: &str) {
        let mut state = self.state.lock().await;
        state.failing_regions.insert(region.to_string());
    }

    pub async fn fail_delete(&self, snapshot_id: &str) {
        let mut state = self.state.lock().await;
        state.undeletable.insert(snapshot_id.to_string());
    }

    pub async fn set_create_status(&self, status: SnapshotStatus) {
        let mut state = self.state.lock().await;
        state.create_status = status;
    }

    fn fresh_id(&self) -> String {
        format!("snap-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl CloudOps for MockCloud {
    async fn list_instances(&self, region: &str) -> Result<Vec<DiscoveredInstance>> {
        let state = self.state.lock().await;
        if state.failing_regions.contains(region) {
            return Err(Self::request_failed(
                region,
                "list_instances",
                "region unavailable",
            ));
        }
        Ok(state.instances.get(region).cloned().unwrap_or_default())
    }

    async fn find_instance_by_id(
        &self,
        region: &str,
        id: &str,
    ) -> Result<Option<DiscoveredInstance>> {
        let state = self.state.lock().await;
        Ok(state
            .instances
            .get(region)
            .and_then(|list| list.iter().find(|i| i.handle.id == id).cloned()))
    }

    async fn find_instance_by_name(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<DiscoveredInstance>> {
        let state = self.state.lock().await;
        Ok(state
            .instances
            .get(region)
            .and_then(|list| list.iter().find(|i| i.handle.name == name).cloned()))
    }

    async fn list_volumes(&self, instance: &InstanceHandle) -> Result<Vec<Volume>> {
        let state = self.state.lock().await;
        Ok(state.volumes.get(&instance.id).cloned().unwrap_or_default())
    }

    async fn list_snapshots_by_volume(
        &self,
        region: &str,
        volume_id: &str,
    ) -> Result<Vec<Snapshot>> {
        let state = self.state.lock().await;
        Ok(state
            .snapshots
            .get(region)
            .map(|list| {
                list.iter()
                    .filter(|s| s.volume_id.as_deref() == Some(volume_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_snapshots_by_tag(
        &self,
        region: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Snapshot>> {
        let state = self.state.lock().await;
        Ok(state
            .snapshots
            .get(region)
            .map(|list| {
                list.iter()
                    .filter(|s| s.tags.get(key).map(String::as_str) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_snapshot(&self, region: &str, snapshot_id: &str) -> Result<Snapshot> {
        let state = self.state.lock().await;
        state
            .snapshots
            .get(region)
            .and_then(|list| list.iter().find(|s| s.id == snapshot_id).cloned())
            .ok_or_else(|| Self::request_failed(region, "get_snapshot", "snapshot not found"))
    }

    async fn create_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        description: &str,
        tags: &HashMap<String, String>,
    ) -> Result<Snapshot> {
        let id = self.fresh_id();
        let mut state = self.state.lock().await;

        let snapshot = Snapshot {
            id,
            volume_id: Some(volume_id.to_string()),
            created_at: Utc::now(),
            status: state.create_status,
            description: Some(description.to_string()),
            tags: tags.clone(),
        };

        state
            .snapshots
            .entry(region.to_string())
            .or_default()
            .push(snapshot.clone());

        Ok(snapshot)
    }

    async fn copy_snapshot(
        &self,
        source_region: &str,
        snapshot_id: &str,
        dest_region: &str,
        description: &str,
        tags: &HashMap<String, String>,
    ) -> Result<Snapshot> {
        let id = self.fresh_id();
        let mut state = self.state.lock().await;

        let source_exists = state
            .snapshots
            .get(source_region)
            .map(|list| list.iter().any(|s| s.id == snapshot_id))
            .unwrap_or(false);
        if !source_exists {
            return Err(Self::request_failed(
                source_region,
                "copy_snapshot",
                "source snapshot not found",
            ));
        }

        let copy = Snapshot {
            id,
            volume_id: None,
            created_at: Utc::now(),
            status: SnapshotStatus::Completed,
            description: Some(description.to_string()),
            tags: tags.clone(),
        };

        state
            .snapshots
            .entry(dest_region.to_string())
            .or_default()
            .push(copy.clone());

        Ok(copy)
    }

    async fn delete_snapshot(&self, region: &str, snapshot_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.undeletable.contains(snapshot_id) {
            return Err(Self::request_failed(
                region,
                "delete_snapshot",
                "snapshot is in use",
            ));
        }

        let list = state
            .snapshots
            .get_mut(region)
            .ok_or_else(|| Self::request_failed(region, "delete_snapshot", "snapshot not found"))?;

        let before = list.len();
        list.retain(|s| s.id != snapshot_id);
        if list.len() == before {
            return Err(Self::request_failed(
                region,
                "delete_snapshot",
                "snapshot not found",
            ));
        }

        Ok(())
    }
}
