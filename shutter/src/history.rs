//! Snapshot history read model
//!
//! An ordered view over one volume's (or one source instance's offsite)
//! snapshots: ascending by creation timestamp, optionally restricted to
//! snapshots this agent manages. Histories are derived, never cached: the
//! scheduler re-fetches at each decision point because creating a snapshot
//! changes what pruning must see within the same pass.

use crate::cloud::{CloudOps, Snapshot};
use crate::constants::tags;
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    snapshots: Vec<Snapshot>,
}

impl SnapshotHistory {
    /// Build a history from a raw provider listing. Sorting is ascending by
    /// creation time; the sort is stable, so equal timestamps (not expected
    /// from real providers) keep provider order; tie-break is unspecified.
    pub fn from_snapshots(mut snapshots: Vec<Snapshot>, managed_only: bool) -> Self {
        if managed_only {
            snapshots.retain(Snapshot::is_managed);
        }
        snapshots.sort_by_key(|s| s.created_at);
        Self { snapshots }
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Most recent snapshot: the last element of the ascending order
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn into_vec(self) -> Vec<Snapshot> {
        self.snapshots
    }
}

/// Managed history of one volume. An unknown volume or a volume with no
/// snapshots yields an empty history, not an error.
pub async fn for_volume(
    cloud: &dyn CloudOps,
    region: &str,
    volume_id: &str,
    managed_only: bool,
) -> Result<SnapshotHistory> {
    let snapshots = cloud.list_snapshots_by_volume(region, volume_id).await?;
    Ok(SnapshotHistory::from_snapshots(snapshots, managed_only))
}

/// Managed history of one instance's offsite copies in `region`, matched by
/// the source-instance back-reference tag (copies have no volume attachment).
pub async fn for_source_instance(
    cloud: &dyn CloudOps,
    region: &str,
    instance_id: &str,
) -> Result<SnapshotHistory> {
    let snapshots = cloud
        .list_snapshots_by_tag(region, tags::SOURCE_INSTANCE, instance_id)
        .await?;
    Ok(SnapshotHistory::from_snapshots(snapshots, true))
}
