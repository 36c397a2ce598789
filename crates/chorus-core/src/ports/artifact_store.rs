//! ArtifactStore port - where finished audio lives until eviction.
//!
//! # Design
//! - One artifact per job, named from the job id and format only, so the
//!   location can be recomputed without reading the record.
//! - `delete` of a missing artifact is not an error: eviction and
//!   cancellation rollback both race with each other and with the worker.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{ArtifactError, AudioFormat, JobId};

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Create whatever backing storage is needed. Called once at startup.
    async fn ensure_ready(&self) -> Result<(), ArtifactError>;

    /// Deterministic location for a job's artifact.
    fn location_for(&self, id: &JobId, format: AudioFormat) -> PathBuf;

    /// Write the artifact and return its location.
    async fn put(&self, id: &JobId, format: AudioFormat, bytes: &[u8]) -> Result<PathBuf, ArtifactError>;

    async fn read(&self, location: &Path) -> Result<Vec<u8>, ArtifactError>;

    /// Remove an artifact. `Ok(false)` if there was nothing to remove.
    async fn delete(&self, location: &Path) -> Result<bool, ArtifactError>;
}
