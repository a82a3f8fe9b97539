//! Deployment logs as plain files, one per deployment.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use nelson_core::{DeploymentId, NelsonConfig};

use crate::backend::DeploymentLog;
use crate::error::BackendResult;

/// Appends lines to `{dir}/{id}.log`.
#[derive(Debug, Clone)]
pub struct FileDeploymentLog {
    dir: PathBuf,
}

impl FileDeploymentLog {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The log configured under `[logging]`, if any.
    pub fn from_config(config: &NelsonConfig) -> std::io::Result<Option<Self>> {
        config
            .logging
            .as_ref()
            .map(|logging| Self::new(&logging.dir))
            .transpose()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: DeploymentId) -> PathBuf {
        self.dir.join(format!("{id}.log"))
    }
}

#[async_trait]
impl DeploymentLog for FileDeploymentLog {
    async fn append(&self, id: DeploymentId, line: &str) -> BackendResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(id))
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
