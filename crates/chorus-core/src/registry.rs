//! In-memory job registry.
//!
//! Design:
//! - The map is the single source of truth for which jobs exist.
//! - One registry-wide lock serializes insert/delete; lookups take the read
//!   side. No method awaits anything while holding it, and nothing here ever
//!   waits on inference.
//! - Callers get `Arc<JobRecord>` handles; a record stays valid for whoever
//!   holds it even after eviction.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{JobError, JobId, JobRecord, JobStatus, SynthesisRequest};
use crate::observability::JobCounts;
use crate::ports::Clock;

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<JobRecord>>>,
    clock: Arc<dyn Clock>,
}

impl JobRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Insert a new `Pending` record. Fails if the id is taken.
    pub async fn create(&self, id: JobId, request: SynthesisRequest) -> Result<Arc<JobRecord>, JobError> {
        let mut jobs = self.jobs.write().await;
        match jobs.entry(id) {
            Entry::Occupied(e) => Err(JobError::AlreadyExists(e.key().clone())),
            Entry::Vacant(e) => {
                let record = Arc::new(JobRecord::new(e.key().clone(), request, self.clock.now()));
                e.insert(Arc::clone(&record));
                debug!(job_id = %record.id(), "job record created");
                Ok(record)
            }
        }
    }

    pub async fn get(&self, id: &JobId) -> Result<Arc<JobRecord>, JobError> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.clone()))
    }

    /// Remove a record. Returns the removed record, if there was one.
    pub async fn delete(&self, id: &JobId) -> Option<Arc<JobRecord>> {
        self.jobs.write().await.remove(id)
    }

    /// Remove `record` only if it is still the one registered under its id.
    ///
    /// Callers working from a `list_all` snapshot use this so they never
    /// remove a newer record that reused the id.
    pub async fn delete_if_same(&self, record: &Arc<JobRecord>) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get(record.id()) {
            Some(current) if Arc::ptr_eq(current, record) => {
                jobs.remove(record.id());
                true
            }
            _ => false,
        }
    }

    /// Point-in-time copy of every record handle.
    pub async fn list_all(&self) -> Vec<Arc<JobRecord>> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Get counts by status for observability.
    pub async fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for record in self.list_all().await {
            match record.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}
