//! Per-execution scratch directories.
//!
//! A [`ScratchWorkspace`] owns one uniquely named directory holding the
//! execution unit and, after the run, the side-channel result. The directory
//! is removed when the workspace is closed or dropped, whichever comes first,
//! so every exit path (early return, timeout, panic unwinding) cleans up.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::CoreError;

/// Prefix of every scratch directory name.
pub const WORKSPACE_PREFIX: &str = "jailrun-";

/// File name of the execution unit inside a workspace.
pub const UNIT_FILE_NAME: &str = "main.py";

/// File name of the side-channel result inside a workspace.
pub const RESULT_FILE_NAME: &str = "result.json";

/// Exclusively owned scratch directory for one execution.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: PathBuf,
    removed: bool,
}

impl ScratchWorkspace {
    /// Create a fresh `jailrun-<uuid>` directory under `root`.
    ///
    /// The root is canonicalized so the unit path handed to the sandbox is
    /// absolute regardless of the child's working directory. `create_dir`
    /// (not `create_dir_all`) is used for the leaf so that a name collision
    /// fails instead of silently sharing a directory.
    pub async fn allocate(root: &Path) -> Result<Self, CoreError> {
        let workspace_err = |source| CoreError::Workspace {
            path: root.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(root).await.map_err(workspace_err)?;
        let root = tokio::fs::canonicalize(root).await.map_err(workspace_err)?;

        let dir = root.join(format!("{WORKSPACE_PREFIX}{}", Uuid::new_v4()));
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|source| CoreError::Workspace {
                path: dir.clone(),
                source,
            })?;

        tracing::debug!(workspace = %dir.display(), "Allocated scratch workspace");
        Ok(Self {
            dir,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn unit_path(&self) -> PathBuf {
        self.dir.join(UNIT_FILE_NAME)
    }

    pub fn result_path(&self) -> PathBuf {
        self.dir.join(RESULT_FILE_NAME)
    }

    /// Write the execution unit into the workspace and return its path.
    pub async fn write_unit(&self, text: &str) -> Result<PathBuf, CoreError> {
        let path = self.unit_path();
        tokio::fs::write(&path, text)
            .await
            .map_err(|source| CoreError::Workspace {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Remove the directory now. Never fails; problems are logged.
    pub async fn close(mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    workspace = %self.dir.display(),
                    error = %e,
                    "Failed to remove scratch workspace"
                );
            }
        }
        self.removed = true;
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
