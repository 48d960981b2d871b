//! Per-instance snapshot scheduling
//!
//! For one resolved instance: fetch the managed root-volume history, decide
//! whether a snapshot is due, create it, and (only when a snapshot was
//! created this pass) run the offsite decision and replicate. Offsite
//! replication is strictly a function of "did we just create": it is never
//! polled independently, so offsite cadence can never be tighter than
//! primary cadence.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{info, warn};

use crate::cloud::{find_volume, CloudOps, Snapshot, SnapshotStatus, Volume};
use crate::constants::{api, tags};
use crate::discovery::ResolvedInstance;
use crate::errors::{OperationError, Result, ShutterError};
use crate::gate;
use crate::history;
use crate::policy::OffsitePolicy;

/// What one scheduling pass did for one instance
#[derive(Debug, Clone, Default)]
pub struct SchedulingOutcome {
    pub created: Option<Snapshot>,
    pub replicated: Option<Snapshot>,
}

pub struct SnapshotScheduler {
    cloud: Arc<dyn CloudOps>,
    jitter_minutes: i64,
    copy_wait_timeout: Duration,
    copy_poll_interval: Duration,
}

impl SnapshotScheduler {
    pub fn new(cloud: Arc<dyn CloudOps>, jitter_minutes: i64, copy_wait_timeout: Duration) -> Self {
        Self {
            cloud,
            jitter_minutes,
            copy_wait_timeout,
            copy_poll_interval: Duration::from_secs(api::COPY_POLL_INTERVAL_SECONDS),
        }
    }

    /// Run one scheduling pass for one instance.
    pub async fn run_one(&self, instance: &ResolvedInstance) -> Result<SchedulingOutcome> {
        let handle = &instance.handle;
        let policy = &instance.policy;

        let volumes = self.cloud.list_volumes(handle).await?;
        let root = find_volume(&volumes, &policy.root_volume_selector);

        let history = match root {
            Some(volume) => {
                history::for_volume(self.cloud.as_ref(), &handle.region, &volume.id, true).await?
            }
            None => history::SnapshotHistory::from_snapshots(Vec::new(), true),
        };

        let due = match history.latest() {
            Some(latest) => {
                gate::is_due(latest.created_at, policy.frequency, self.jitter_minutes)?
            }
            // No baseline yet: create one unless the instance is configured
            // to never hold snapshots at all.
            None => policy.retention_count > 0,
        };

        let mut outcome = SchedulingOutcome::default();

        if !due {
            info!(
                instance = %handle.id,
                "Snapshot not due for {} ({} history entries, frequency {})",
                handle.name,
                history.len(),
                policy.frequency
            );
            return Ok(outcome);
        }

        let root = root.ok_or_else(|| {
            ShutterError::Operation(OperationError::VolumeNotFound {
                instance: handle.id.clone(),
                selector: policy.root_volume_selector.clone(),
            })
        })?;

        let snapshot = self.create_snapshot(instance, root).await?;
        info!(
            instance = %handle.id,
            "Created snapshot {} of {} ({})",
            snapshot.id, root.device, handle.name
        );
        outcome.created = Some(snapshot.clone());

        if let Some(offsite) = &policy.offsite {
            outcome.replicated = self.replicate_offsite(instance, offsite, &snapshot).await?;
        }

        Ok(outcome)
    }

    async fn create_snapshot(
        &self,
        instance: &ResolvedInstance,
        volume: &Volume,
    ) -> Result<Snapshot> {
        let handle = &instance.handle;

        let description = format!(
            "{} snapshot of {} ({}) {}",
            tags::NAMESPACE,
            handle.name,
            handle.id,
            volume.device
        );

        let mut snapshot_tags = HashMap::new();
        snapshot_tags.insert(tags::MANAGED.to_string(), "true".to_string());
        snapshot_tags.insert(tags::SOURCE_INSTANCE.to_string(), handle.id.clone());
        snapshot_tags.insert("Name".to_string(), handle.name.clone());

        self.cloud
            .create_snapshot(&handle.region, &volume.id, &description, &snapshot_tags)
            .await
    }

    /// Offsite decision and copy. Returns Ok(None) when the offsite chain is
    /// not due; a copy failure is an operation error scoped to this instance
    /// and never rolls back the primary snapshot.
    async fn replicate_offsite(
        &self,
        instance: &ResolvedInstance,
        offsite: &OffsitePolicy,
        source: &Snapshot,
    ) -> Result<Option<Snapshot>> {
        let handle = &instance.handle;

        let offsite_history =
            history::for_source_instance(self.cloud.as_ref(), &offsite.region, &handle.id).await?;

        let due = match offsite_history.latest() {
            Some(latest) => {
                gate::is_due(latest.created_at, offsite.frequency, self.jitter_minutes)?
            }
            None => offsite.retention_count > 0,
        };

        if !due {
            info!(
                instance = %handle.id,
                "Offsite copy not due for {} in {} ({} copies, frequency {})",
                handle.name,
                offsite.region,
                offsite_history.len(),
                offsite.frequency
            );
            return Ok(None);
        }

        // The provider refuses to copy a snapshot that has not finished, so
        // wait for the source to settle before issuing the copy.
        self.wait_for_completion(&handle.region, &source.id).await?;

        let description = format!(
            "{} offsite copy of {} from {} ({})",
            tags::NAMESPACE,
            source.id,
            handle.region,
            handle.name
        );

        let mut copy_tags = source.tags.clone();
        copy_tags.insert(tags::SOURCE_REGION.to_string(), handle.region.clone());

        let copy = self
            .cloud
            .copy_snapshot(
                &handle.region,
                &source.id,
                &offsite.region,
                &description,
                &copy_tags,
            )
            .await?;

        info!(
            instance = %handle.id,
            "Replicated snapshot {} to {} as {}",
            source.id, offsite.region, copy.id
        );

        Ok(Some(copy))
    }

    async fn wait_for_completion(&self, region: &str, snapshot_id: &str) -> Result<Snapshot> {
        let deadline = Instant::now() + self.copy_wait_timeout;

        loop {
            let snapshot = self.cloud.get_snapshot(region, snapshot_id).await?;

            match snapshot.status {
                SnapshotStatus::Completed => return Ok(snapshot),
                SnapshotStatus::Error => {
                    return Err(ShutterError::Operation(OperationError::SnapshotErrored {
                        snapshot_id: snapshot_id.to_string(),
                    }));
                }
                SnapshotStatus::Pending => {}
            }

            if Instant::now() >= deadline {
                warn!(
                    "Gave up waiting on snapshot {} after {}s",
                    snapshot_id,
                    self.copy_wait_timeout.as_secs()
                );
                return Err(ShutterError::Operation(OperationError::Timeout {
                    snapshot_id: snapshot_id.to_string(),
                    waited_seconds: self.copy_wait_timeout.as_secs(),
                }));
            }

            sleep(self.copy_poll_interval).await;
        }
    }
}
