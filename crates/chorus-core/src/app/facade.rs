//! TaskService - the contract a front end (HTTP or otherwise) talks to.
//!
//! # Responsibilities
//! - Validate inbound ids and request size
//! - Translate job state into wire-shaped views (`TaskCreated`, `TaskInfo`)
//! - Map every failure to an `ErrorClass` and status code as a pure function
//! - Own the retention schedule
//!
//! Transport concerns (routing, body parsing) stay outside the crate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::manager::JobManager;
use super::supervisor::Supervisor;
use super::sweeper::{RetentionSweeper, SweepReport};
use crate::config::ManagerConfig;
use crate::domain::{ArtifactError, JobError, JobId, JobSnapshot, JobStatus, SynthesisRequest};
use crate::impls::LocalArtifactStore;
use crate::observability::JobCounts;
use crate::ports::{ArtifactStore, AudioEncoder, Clock, Synthesizer, SystemClock};
use crate::registry::JobRegistry;

/// Coarse failure class of a façade call, independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    NotFound,
    Internal,
}

impl ErrorClass {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorClass::BadRequest => 400,
            ErrorClass::NotFound => 404,
            ErrorClass::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("task {0} not found")]
    UnknownId(String),

    #[error("text is too long, max length is {max}")]
    TextTooLong { len: usize, max: usize },

    #[error("task {id} is not completed, current status: {status}")]
    NotCompleted { id: JobId, status: JobStatus },

    #[error("result file for task {0} not found")]
    ResultMissing(JobId),

    #[error("failed to read result: {0}")]
    Artifact(ArtifactError),
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::Job(JobError::AlreadyExists(_) | JobError::InvalidId(_)) => {
                ErrorClass::BadRequest
            }
            ServiceError::Job(JobError::NotFound(_)) | ServiceError::UnknownId(_) => {
                ErrorClass::NotFound
            }
            ServiceError::Job(JobError::AlreadyStarted(_)) => ErrorClass::Internal,
            ServiceError::TextTooLong { .. } | ServiceError::NotCompleted { .. } => {
                ErrorClass::BadRequest
            }
            ServiceError::ResultMissing(_) => ErrorClass::NotFound,
            ServiceError::Artifact(_) => ErrorClass::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.class().status_code()
    }
}

/// Reply to a successful `create_task`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCreated {
    pub step_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

/// Wire view of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub step_id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present iff the job is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Present iff the job is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobSnapshot> for TaskInfo {
    fn from(snap: JobSnapshot) -> Self {
        let download_url = (snap.status == JobStatus::Completed && snap.result_location.is_some())
            .then(|| format!("/download_result?step_id={}", snap.id));
        let error = match snap.status {
            JobStatus::Failed => snap.error_message,
            _ => None,
        };
        Self {
            step_id: snap.id,
            status: snap.status,
            created_at: snap.created_at,
            started_at: snap.started_at,
            completed_at: snap.completed_at,
            download_url,
            error,
        }
    }
}

/// A finished artifact, ready to hand to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// Suggested attachment name.
    pub filename: String,
}

pub struct TaskService {
    config: ManagerConfig,
    manager: JobManager,
    store: Arc<dyn ArtifactStore>,
}

impl TaskService {
    pub fn builder(config: ManagerConfig) -> TaskServiceBuilder {
        TaskServiceBuilder::new(config)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    /// Register `step_id` and start synthesizing in the background.
    pub async fn create_task(
        &self,
        step_id: &str,
        request: SynthesisRequest,
    ) -> Result<TaskCreated, ServiceError> {
        let id = JobId::parse(step_id)?;
        let len = request.text_len();
        if self.config.text_too_long(len) {
            return Err(ServiceError::TextTooLong {
                len,
                max: self.config.max_text_length,
            });
        }

        let record = self.manager.create_and_start(id, request).await?;
        Ok(TaskCreated {
            step_id: record.id().clone(),
            status: record.status(),
            message: "Task created and started".to_string(),
        })
    }

    pub async fn get_task_info(&self, step_id: &str) -> Result<TaskInfo, ServiceError> {
        let id = Self::lookup_id(step_id)?;
        let record = self.manager.get(&id).await?;
        Ok(record.snapshot().into())
    }

    /// `false` when the id is unknown (or not even a valid id).
    pub async fn cancel_task(&self, step_id: &str) -> bool {
        match JobId::parse(step_id) {
            Ok(id) => self.manager.cancel(&id).await,
            Err(_) => false,
        }
    }

    pub async fn cancel_all_tasks(&self) -> usize {
        self.manager.cancel_all().await
    }

    pub async fn download_result(&self, step_id: &str) -> Result<Download, ServiceError> {
        let id = Self::lookup_id(step_id)?;
        let snap = self.manager.get(&id).await?.snapshot();
        if snap.status != JobStatus::Completed {
            return Err(ServiceError::NotCompleted {
                id,
                status: snap.status,
            });
        }
        let Some(location) = snap.result_location else {
            return Err(ServiceError::ResultMissing(id));
        };

        let bytes = self.store.read(&location).await.map_err(|e| match e {
            ArtifactError::NotFound(_) => ServiceError::ResultMissing(id.clone()),
            other => ServiceError::Artifact(other),
        })?;
        Ok(Download {
            bytes,
            content_type: snap.format.content_type(),
            filename: format!("audio_{}.{}", id, snap.format.extension()),
        })
    }

    /// One sweep with the configured retention.
    pub async fn sweep_expired(&self) -> SweepReport {
        self.manager.sweep(self.config.retention()).await
    }

    /// Background sweeps on the configured interval until `shutdown` fires.
    pub fn spawn_retention_loop(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        Arc::clone(self.manager.sweeper()).spawn_periodic(
            self.config.sweep_interval(),
            self.config.retention(),
            shutdown,
        )
    }

    pub async fn counts(&self) -> JobCounts {
        self.manager.counts().await
    }

    /// Lookups treat an id that could never have been created as unknown.
    fn lookup_id(step_id: &str) -> Result<JobId, ServiceError> {
        JobId::parse(step_id).map_err(|_| ServiceError::UnknownId(step_id.to_string()))
    }
}

/// Wires a `TaskService` from config plus the engine-side collaborators.
///
/// # Example
/// ```ignore
/// let service = TaskService::builder(config)
///     .synthesizer(Arc::new(MyEngine::load()?))
///     .encoder(Arc::new(PcmEncoder))
///     .build()
///     .await?;
/// ```
pub struct TaskServiceBuilder {
    config: ManagerConfig,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    encoder: Option<Arc<dyn AudioEncoder>>,
    store: Option<Arc<dyn ArtifactStore>>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no synthesizer configured")]
    MissingSynthesizer,

    #[error("no audio encoder configured")]
    MissingEncoder,

    #[error("could not prepare artifact storage: {0}")]
    Storage(#[from] ArtifactError),
}

impl TaskServiceBuilder {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            synthesizer: None,
            encoder: None,
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn AudioEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Defaults to a `LocalArtifactStore` under `config.work_dir`.
    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the wiring and create the working directory.
    pub async fn build(self) -> Result<TaskService, BuildError> {
        let synthesizer = self.synthesizer.ok_or(BuildError::MissingSynthesizer)?;
        let encoder = self.encoder.ok_or(BuildError::MissingEncoder)?;
        let store: Arc<dyn ArtifactStore> = match self.store {
            Some(store) => store,
            None => Arc::new(LocalArtifactStore::new(&self.config.work_dir)),
        };
        store.ensure_ready().await?;

        let registry = Arc::new(JobRegistry::new(Arc::clone(&self.clock)));
        let supervisor = Arc::new(Supervisor::new(
            synthesizer,
            encoder,
            Arc::clone(&store),
            self.clock,
        ));
        let sweeper = Arc::new(RetentionSweeper::new(Arc::clone(&registry), Arc::clone(&store)));
        Ok(TaskService {
            config: self.config,
            manager: JobManager::new(registry, supervisor, sweeper),
            store,
        })
    }
}
