//! LocalArtifactStore - artifacts as plain files in one working directory.
//!
//! Layout: `<root>/<job id>.<format extension>`. Nothing else is written.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::{ArtifactError, AudioFormat, JobId};
use crate::ports::ArtifactStore;

#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn ensure_ready(&self) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ArtifactError::io(&self.root, e))
    }

    fn location_for(&self, id: &JobId, format: AudioFormat) -> PathBuf {
        self.root.join(format!("{}.{}", id, format.extension()))
    }

    async fn put(&self, id: &JobId, format: AudioFormat, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        let path = self.location_for(id, format);
        fs::write(&path, bytes)
            .await
            .map_err(|e| ArtifactError::io(&path, e))?;
        Ok(path)
    }

    async fn read(&self, location: &Path) -> Result<Vec<u8>, ArtifactError> {
        fs::read(location)
            .await
            .map_err(|e| ArtifactError::io(location, e))
    }

    async fn delete(&self, location: &Path) -> Result<bool, ArtifactError> {
        match fs::remove_file(location).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ArtifactError::io(location, e)),
        }
    }
}
