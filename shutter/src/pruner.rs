//! Retention pruning
//!
//! Selects and deletes the oldest managed snapshots beyond the retention
//! count. Selection sorts defensively rather than trusting caller order, and
//! never selects the single most recent snapshot: even a retention count of
//! 0 against existing history leaves one snapshot standing. Deletion is
//! best-effort per snapshot; one failed delete does not stop the rest.

use tracing::{info, warn};

use crate::cloud::{CloudOps, Snapshot};
use crate::errors::Result;

/// The snapshots `prune` would delete: the oldest `min(excess, len - 1)`,
/// computed over managed snapshots only, in ascending creation order.
pub fn select_excess(mut snapshots: Vec<Snapshot>, retention_count: u32) -> Vec<Snapshot> {
    snapshots.retain(Snapshot::is_managed);
    snapshots.sort_by_key(|s| s.created_at);

    let excess = snapshots.len().saturating_sub(retention_count as usize);
    let deletable = excess.min(snapshots.len().saturating_sub(1));

    snapshots.truncate(deletable);
    snapshots
}

/// Delete the excess snapshots in `region`, returning how many were
/// actually deleted.
pub async fn prune(
    cloud: &dyn CloudOps,
    region: &str,
    snapshots: Vec<Snapshot>,
    retention_count: u32,
) -> Result<usize> {
    let total = snapshots.len();
    let victims = select_excess(snapshots, retention_count);

    if victims.is_empty() {
        info!(
            region = %region,
            "No snapshots to prune (have {}, keeping {})",
            total, retention_count
        );
        return Ok(0);
    }

    info!(
        region = %region,
        "Pruning {} of {} snapshots (keeping {} most recent)",
        victims.len(),
        total,
        retention_count
    );

    let mut deleted = 0;
    for snapshot in &victims {
        match cloud.delete_snapshot(region, &snapshot.id).await {
            Ok(()) => {
                info!(region = %region, "Deleted old snapshot {}", snapshot.id);
                deleted += 1;
            }
            Err(e) => {
                warn!(region = %region, "Failed to delete snapshot {}: {}", snapshot.id, e);
            }
        }
    }

    Ok(deleted)
}
