//! JobManager - registry + supervisor + sweeper behind one handle.
//!
//! Everything the front end needs that is not wire mapping lives here:
//! create-and-start, the cancel path, and on-demand sweeps.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::supervisor::Supervisor;
use super::sweeper::{RetentionSweeper, SweepReport};
use crate::domain::{JobError, JobId, JobRecord, SynthesisRequest};
use crate::observability::JobCounts;
use crate::registry::JobRegistry;

pub struct JobManager {
    registry: Arc<JobRegistry>,
    supervisor: Arc<Supervisor>,
    sweeper: Arc<RetentionSweeper>,
}

impl JobManager {
    pub fn new(
        registry: Arc<JobRegistry>,
        supervisor: Arc<Supervisor>,
        sweeper: Arc<RetentionSweeper>,
    ) -> Self {
        Self {
            registry,
            supervisor,
            sweeper,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn sweeper(&self) -> &Arc<RetentionSweeper> {
        &self.sweeper
    }

    /// Insert a `Pending` record and schedule its worker.
    ///
    /// Returns as soon as the worker is spawned; the job runs in the
    /// background.
    pub async fn create_and_start(
        &self,
        id: JobId,
        request: SynthesisRequest,
    ) -> Result<Arc<JobRecord>, JobError> {
        let record = self.registry.create(id, request).await?;
        // Dropping the handle detaches the worker.
        self.supervisor.start(Arc::clone(&record))?;
        info!(job_id = %record.id(), format = %record.format(), "task created");
        Ok(record)
    }

    pub async fn get(&self, id: &JobId) -> Result<Arc<JobRecord>, JobError> {
        self.registry.get(id).await
    }

    /// Request cancellation. Returns `false` for an unknown id.
    ///
    /// A `Pending` job is `Cancelled` when this returns; a `Running` job
    /// settles at its worker's next checkpoint.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let Ok(record) = self.registry.get(id).await else {
            debug!(job_id = %id, "cancel for unknown task");
            return false;
        };
        let status = record.request_cancel(self.registry.clock().now());
        info!(job_id = %id, status = %status, "cancel requested");
        true
    }

    /// Cancel every `Pending` or `Running` job. Returns how many were hit.
    pub async fn cancel_all(&self) -> usize {
        let now = self.registry.clock().now();
        let mut count = 0;
        for record in self.registry.list_all().await {
            if record.status().is_cancellable() {
                record.request_cancel(now);
                count += 1;
            }
        }
        info!(count, "cancelled all active tasks");
        count
    }

    pub async fn sweep(&self, max_age: Duration) -> SweepReport {
        self.sweeper.sweep(max_age).await
    }

    pub async fn counts(&self) -> JobCounts {
        self.registry.counts().await
    }
}
