use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::models::PreviewId;
use crate::errors::PreviewError;

/// Allocates one directory per preview id under a common root.
///
/// Directories are never shared between ids. Two pipelines for the *same* id
/// serialize on [`WorkspaceManager::lock`] so a rebuild never interleaves
/// with a build still reading or writing the previous tree.
pub struct WorkspaceManager {
    root: PathBuf,
    locks: Mutex<HashMap<PreviewId, Arc<Mutex<()>>>>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &PreviewId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Acquire the exclusive per-id workspace lock.
    pub async fn lock(&self, id: &PreviewId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Forget the lock for `id` once nobody holds or waits on it. Call after
    /// dropping the guard returned by [`WorkspaceManager::lock`].
    pub async fn release(&self, id: &PreviewId) {
        let mut locks = self.locks.lock().await;
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Delete any existing directory for `id` and create a fresh empty one.
    pub async fn prepare(&self, id: &PreviewId) -> Result<PathBuf, PreviewError> {
        let path = self.path_for(id);
        if self.purge(id).await? {
            tracing::debug!(id = %id, path = %path.display(), "purged stale workspace");
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| PreviewError::Workspace {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Recursively delete the directory for `id`. Returns whether anything was removed.
    pub async fn purge(&self, id: &PreviewId) -> Result<bool, PreviewError> {
        let path = self.path_for(id);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(PreviewError::Workspace { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn id() -> PreviewId {
        PreviewId::derive("octocat", "hello-world", "main")
    }

    #[tokio::test]
    async fn test_prepare_creates_empty_dir() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().join("workspaces"));
        let path = manager.prepare(&id()).await.unwrap();
        assert!(path.is_dir());
        assert_eq!(path, root.path().join("workspaces/octocat_hello-world_main"));
        assert_eq!(fs::read_dir(&path).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_purges_stale_contents() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let path = manager.prepare(&id()).await.unwrap();
        fs::create_dir_all(path.join("nested/deep")).unwrap();
        fs::write(path.join("nested/deep/file.txt"), "stale").unwrap();

        let again = manager.prepare(&id()).await.unwrap();
        assert_eq!(again, path);
        assert!(again.is_dir());
        assert_eq!(fs::read_dir(&again).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_purge_missing_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        assert!(!manager.purge(&id()).await.unwrap());
        manager.prepare(&id()).await.unwrap();
        assert!(manager.purge(&id()).await.unwrap());
        assert!(!manager.path_for(&id()).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prepare_reports_permission_failure() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let locked = root.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

        // Root ignores directory permissions; nothing to assert in that case.
        if fs::write(locked.join("probe"), "x").is_ok() {
            return;
        }

        let manager = WorkspaceManager::new(&locked);
        let err = manager.prepare(&id()).await.unwrap_err();
        assert!(matches!(err, PreviewError::Workspace { .. }));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
    }

    #[tokio::test]
    async fn test_lock_serializes_same_id() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(WorkspaceManager::new(root.path()));
        let guard = manager.lock(&id()).await;

        let contender = Arc::clone(&manager);
        let waiter = tokio::spawn(async move {
            let _guard = contender.lock(&id()).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_release_forgets_idle_locks_only() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(WorkspaceManager::new(root.path()));
        let guard = manager.lock(&id()).await;

        let contender = Arc::clone(&manager);
        let waiter = tokio::spawn(async move {
            let guard = contender.lock(&id()).await;
            drop(guard);
            contender.release(&id()).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        manager.release(&id()).await;
        waiter.await.unwrap();
        assert_eq!(manager.tracked_locks().await, 0);

        let held = manager.lock(&id()).await;
        manager.release(&id()).await;
        assert_eq!(manager.tracked_locks().await, 1);
        drop(held);
        manager.release(&id()).await;
        assert_eq!(manager.tracked_locks().await, 0);
    }

    #[tokio::test]
    async fn test_lock_does_not_block_other_ids() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let _a = manager.lock(&id()).await;
        let other = PreviewId::derive("octocat", "spoon-knife", "main");
        let _b = tokio::time::timeout(Duration::from_secs(1), manager.lock(&other))
            .await
            .unwrap();
    }
}
