//! Per-request workspace allocation and cleanup
//!
//! Each inbound request gets an isolated temporary directory keyed by its
//! request identifier. The directory is created before the external tool is
//! spawned and removed on every exit path, including panics and dropped
//! futures, via the [`Workspace`] RAII guard.

use crate::error::{Error, Result};
use crate::types::RequestId;
use std::path::{Path, PathBuf};

/// Allocates isolated, uniquely named workspace directories
///
/// Workspaces are never reused or pooled; the directory name embeds the
/// request UUID, so no two concurrent requests can share a path.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create a manager rooted at the given base directory
    ///
    /// The root itself is created lazily on the first [`create`](Self::create).
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Allocate a fresh, empty workspace for one request
    ///
    /// Fails with [`Error::Resource`] if the filesystem cannot allocate the
    /// directory. A pre-existing path for a freshly generated UUID is treated
    /// the same way rather than silently reused.
    pub async fn create(&self) -> Result<Workspace> {
        let id = RequestId::new();
        let path = self.root.join(id.to_string());

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::Resource(format!(
                "failed to create workspace root {}: {e}",
                self.root.display()
            ))
        })?;

        tokio::fs::create_dir(&path).await.map_err(|e| {
            Error::Resource(format!(
                "failed to create workspace {}: {e}",
                path.display()
            ))
        })?;

        tracing::debug!(request_id = %id, path = %path.display(), "Workspace created");

        Ok(Workspace {
            id,
            path,
            removed: false,
        })
    }
}

/// An isolated, request-scoped temporary directory
///
/// Owns its directory tree for the lifetime of one request. Dropping the
/// guard removes the tree (best effort), so early returns, panics, and
/// cancelled futures all release the disk space without the caller doing
/// anything. Cleanup failures are logged, never propagated — they must not
/// mask the primary result.
#[derive(Debug)]
pub struct Workspace {
    id: RequestId,
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// The request identifier this workspace belongs to
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The workspace directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively remove the workspace directory
    ///
    /// Idempotent: safe to call on an already-removed or partially-removed
    /// workspace. Missing-path conditions are never errors.
    pub async fn destroy(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                tracing::debug!(
                    request_id = %self.id,
                    path = %self.path.display(),
                    "Workspace removed"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    request_id = %self.id,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove workspace"
                );
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        // Synchronous removal: Drop has no async context, and workspaces are
        // small enough that blocking briefly here is acceptable.
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {
                tracing::debug!(
                    request_id = %self.id,
                    path = %self.path.display(),
                    "Workspace removed"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    request_id = %self.id,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove workspace"
                );
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_allocates_empty_directory() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let workspace = manager.create().await.unwrap();

        assert!(workspace.path().is_dir());
        let mut entries = tokio::fs::read_dir(workspace.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_workspaces_never_share_a_path() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let a = manager.create().await.unwrap();
        let b = manager.create().await.unwrap();

        assert_ne!(a.path(), b.path());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_destroy_removes_tree() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let mut workspace = manager.create().await.unwrap();
        tokio::fs::write(workspace.path().join("audio.m4a"), b"data")
            .await
            .unwrap();

        let path = workspace.path().to_path_buf();
        workspace.destroy().await;

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let mut workspace = manager.create().await.unwrap();
        workspace.destroy().await;
        // Second call on an already-removed workspace must not panic or error.
        workspace.destroy().await;
    }

    #[tokio::test]
    async fn test_drop_removes_tree() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let workspace = manager.create().await.unwrap();
        let path = workspace.path().to_path_buf();
        tokio::fs::write(path.join("audio.m4a"), b"data")
            .await
            .unwrap();

        drop(workspace);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_destroy_tolerates_externally_removed_path() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf());

        let mut workspace = manager.create().await.unwrap();
        tokio::fs::remove_dir_all(workspace.path()).await.unwrap();

        // Path already gone: must be silent, not an error.
        workspace.destroy().await;
    }

    #[tokio::test]
    async fn test_create_fails_when_root_is_a_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("not-a-dir");
        tokio::fs::write(&file_path, b"occupied").await.unwrap();

        let manager = WorkspaceManager::new(file_path);
        let result = manager.create().await;

        assert!(matches!(result, Err(crate::Error::Resource(_))));
    }
}
