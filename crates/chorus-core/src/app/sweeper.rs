//! RetentionSweeper - evicts old jobs and their artifacts.
//!
//! # Flow
//! 1. Snapshot the registry
//! 2. For every record older than `max_age` (any status), mark it evicted and
//!    remove it from the registry, unless the id already points elsewhere
//! 3. Delete its artifact
//!
//! A failed artifact deletion is logged and counted; the record is still
//! evicted and the sweep moves on to the next job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ports::ArtifactStore;

/// `tokio::time::interval` rejects a zero period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);
use crate::registry::JobRegistry;

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub artifacts_deleted: usize,
    pub artifact_errors: usize,
}

pub struct RetentionSweeper {
    registry: Arc<JobRegistry>,
    store: Arc<dyn ArtifactStore>,
}

impl RetentionSweeper {
    pub fn new(registry: Arc<JobRegistry>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { registry, store }
    }

    /// Evict every job created more than `max_age` ago.
    pub async fn sweep(&self, max_age: Duration) -> SweepReport {
        let now = self.registry.clock().now();
        // Ages beyond chrono's range can never be exceeded.
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return SweepReport::default();
        };

        let mut report = SweepReport::default();
        for record in self.registry.list_all().await {
            let expired = max_age.is_zero() || now - record.created_at() > max_age;
            if !expired {
                continue;
            }

            // Stops a live worker and keeps it off the artifact path before
            // the id can be reused.
            record.mark_evicted(now);
            // Another sweep may have evicted this record already, and the id
            // may since belong to a new job.
            if !self.registry.delete_if_same(&record).await {
                continue;
            }
            report.evicted += 1;

            // The worker may not have recorded a location yet (or was
            // cancelled mid-write), so delete the deterministic path.
            let location = record
                .snapshot()
                .result_location
                .unwrap_or_else(|| self.store.location_for(record.id(), record.format()));
            match self.store.delete(&location).await {
                Ok(true) => report.artifacts_deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    report.artifact_errors += 1;
                    warn!(job_id = %record.id(), error = %e, "failed to delete artifact");
                }
            }
            debug!(job_id = %record.id(), status = %record.status(), "evicted job");
        }

        if report.evicted > 0 {
            info!(
                evicted = report.evicted,
                artifacts_deleted = report.artifacts_deleted,
                "cleaned up old tasks"
            );
        }
        report
    }

    /// Sweep every `interval` until `shutdown` flips to `true` or its sender
    /// is dropped. A zero `interval` is raised to one millisecond.
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        max_age: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.sweep(max_age).await;
                    }
                }
            }
            debug!("retention loop stopped");
        })
    }
}
