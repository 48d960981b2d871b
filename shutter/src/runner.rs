//! Run loop: one pass over the whole fleet
//!
//! Fans the scheduler out across all resolved instances with a bounded
//! concurrency limit. Instances are independent; one instance's failure is
//! caught and logged without blocking the rest. After each instance's
//! scheduling pass, pruning re-fetches history (a snapshot created moments
//! ago must be visible to the pruner) and trims the primary chain, then the
//! offsite chain when configured.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cloud::{find_volume, CloudOps};
use crate::discovery::ResolvedInstance;
use crate::errors::Result;
use crate::history;
use crate::pruner;
use crate::scheduler::SnapshotScheduler;

/// Totals for one full pass
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub instances: usize,
    pub created: usize,
    pub replicated: usize,
    pub pruned: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
struct InstanceStats {
    created: bool,
    replicated: bool,
    pruned: usize,
}

pub struct RunLoop {
    cloud: Arc<dyn CloudOps>,
    scheduler: Arc<SnapshotScheduler>,
    concurrency_limit: usize,
}

impl RunLoop {
    pub fn new(
        cloud: Arc<dyn CloudOps>,
        scheduler: Arc<SnapshotScheduler>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            cloud,
            scheduler,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    /// Process every instance once and report totals. Operation failures are
    /// absorbed here; only the caller's discovery/config stage can fail a run.
    pub async fn run(&self, instances: Vec<ResolvedInstance>) -> RunReport {
        let run_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));

        info!(
            run_id = %run_id,
            "Starting pass over {} instances (concurrency {})",
            instances.len(),
            self.concurrency_limit
        );

        let mut report = RunReport {
            instances: instances.len(),
            ..Default::default()
        };

        let mut tasks = Vec::new();
        for instance in instances {
            let semaphore = semaphore.clone();
            let cloud = self.cloud.clone();
            let scheduler = self.scheduler.clone();

            tasks.push(tokio::spawn(async move {
                // The semaphore lives for the whole pass; acquire cannot fail
                let _permit = semaphore.acquire_owned().await;
                let id = instance.handle.id.clone();
                let result = process_one(cloud.as_ref(), &scheduler, &instance).await;
                (id, result)
            }));
        }

        let results = join_all(tasks).await;
        for result in results {
            match result {
                Ok((_, Ok(stats))) => {
                    if stats.created {
                        report.created += 1;
                    }
                    if stats.replicated {
                        report.replicated += 1;
                    }
                    report.pruned += stats.pruned;
                }
                Ok((id, Err(e))) => {
                    error!(run_id = %run_id, "Instance {} failed: {}", id, e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!(run_id = %run_id, "Instance task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report.failed > 0 {
            warn!(
                run_id = %run_id,
                "Pass finished with failures: {} created, {} replicated, {} pruned, {} of {} instances failed",
                report.created, report.replicated, report.pruned, report.failed, report.instances
            );
        } else {
            info!(
                run_id = %run_id,
                "Pass finished: {} created, {} replicated, {} pruned across {} instances",
                report.created, report.replicated, report.pruned, report.instances
            );
        }

        report
    }
}

/// Scheduling then pruning for a single instance, strictly sequential:
/// each step depends on the previous step's observable effect.
async fn process_one(
    cloud: &dyn CloudOps,
    scheduler: &SnapshotScheduler,
    instance: &ResolvedInstance,
) -> Result<InstanceStats> {
    let handle = &instance.handle;
    let policy = &instance.policy;

    let outcome = scheduler.run_one(instance).await?;

    let mut stats = InstanceStats {
        created: outcome.created.is_some(),
        replicated: outcome.replicated.is_some(),
        pruned: 0,
    };

    if !policy.delete_old_snapshots {
        return Ok(stats);
    }

    // Primary chain: re-fetch so a snapshot created above is in view
    let volumes = cloud.list_volumes(handle).await?;
    if let Some(root) = find_volume(&volumes, &policy.root_volume_selector) {
        let primary =
            history::for_volume(cloud, &handle.region, &root.id, true).await?;
        stats.pruned += pruner::prune(
            cloud,
            &handle.region,
            primary.into_vec(),
            policy.retention_count,
        )
        .await?;
    }

    // Offsite chain
    if let Some(offsite) = &policy.offsite {
        let copies =
            history::for_source_instance(cloud, &offsite.region, &handle.id).await?;
        stats.pruned += pruner::prune(
            cloud,
            &offsite.region,
            copies.into_vec(),
            offsite.retention_count,
        )
        .await?;
    }

    Ok(stats)
}
