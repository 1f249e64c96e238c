//! Shared context for orchestration runs

use cutover_models::{InfraConfig, RequestConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::TaskError;
use crate::platform::Platform;
use crate::progress::LogSink;

/// Steady-state polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    pub interval: Duration,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Collaborators an orchestration run needs
#[derive(Clone)]
pub struct TaskContext {
    pub platform: Arc<dyn Platform>,
    pub log: Arc<dyn LogSink>,
    pub polling: PollingPolicy,
    /// Parent of the per-invocation working directories
    pub work_root: PathBuf,
}

impl TaskContext {
    pub fn new(platform: Arc<dyn Platform>, log: Arc<dyn LogSink>) -> Self {
        Self {
            platform,
            log,
            polling: PollingPolicy::default(),
            work_root: std::env::temp_dir().join("cutover"),
        }
    }

    pub fn with_polling(mut self, polling: PollingPolicy) -> Self {
        self.polling = polling;
        self
    }

    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub fn log(&self) -> &dyn LogSink {
        self.log.as_ref()
    }

    /// Build the request config for one invocation, together with the
    /// working directory it points at.
    pub async fn request_config(
        &self,
        infra: &InfraConfig,
        timeout_in_mins: u32,
    ) -> Result<(RequestConfig, WorkingDirectory), TaskError> {
        let workdir = WorkingDirectory::create(&self.work_root).await?;
        let config = RequestConfig::new(infra, timeout_in_mins, workdir.path().to_path_buf());
        Ok((config, workdir))
    }
}

/// Scratch directory removed when dropped
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    pub async fn create(root: &Path) -> Result<Self, TaskError> {
        let path = root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::debug!(path = %self.path.display(), "Failed to remove working directory: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_working_directory_is_removed_on_drop() {
        let root = std::env::temp_dir().join(format!("cutover-test-{}", Uuid::new_v4()));
        let workdir = WorkingDirectory::create(&root).await.unwrap();
        let path = workdir.path().to_path_buf();
        assert!(path.exists());

        drop(workdir);
        assert!(!path.exists());
        std::fs::remove_dir_all(&root).ok();
    }
}
