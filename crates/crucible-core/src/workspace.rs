//! Per-job workspace directories under the shared container mount
//!
//! Each job gets `<root>/<job_id>/` containing exactly one source file. The
//! root is bind-mounted into every sandbox container, so job ids double as
//! the working subpath for `docker exec`. Directories are removed
//! unconditionally when a job's pipeline exits, whatever the outcome.

use std::path::{Path, PathBuf};

use crate::errors::EngineError;

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Creates the shared root at startup.
    pub async fn ensure_root(&self) -> Result<(), EngineError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            EngineError::Workspace(format!(
                "failed to create workspace root {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    /// Writes the source file into a fresh job directory and returns its path.
    /// The directory is made world-writable so the unprivileged container user
    /// can drop compiled classes next to the source.
    pub async fn write_source(
        &self,
        job_id: &str,
        file_name: &str,
        code: &str,
    ) -> Result<PathBuf, EngineError> {
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EngineError::Workspace(format!("failed to create job dir: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o777))
                .await
                .map_err(|e| {
                    EngineError::Workspace(format!("failed to set job dir permissions: {}", e))
                })?;
        }

        let path = dir.join(file_name);
        tokio::fs::write(&path, code)
            .await
            .map_err(|e| EngineError::Workspace(format!("failed to write source file: {}", e)))?;
        Ok(path)
    }

    /// Removes a job's directory and contents. Idempotent: an absent
    /// directory is not an error, and removal failures are logged rather than
    /// raised because this runs on every exit path, including error unwinds.
    pub async fn remove(&self, job_id: &str) {
        let dir = self.job_dir(job_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => log::debug!("removed workspace {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove workspace {}: {}", dir.display(), e),
        }
    }
}
