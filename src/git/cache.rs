//! Process-wide cache of opened repository handles.
//!
//! Opening a repository reads its config and refs from disk, so handles are
//! kept across requests, keyed by the directory they were opened from.
//! - Validation: every hit re-stats the git directory
//! - Invalidation: a missing git directory or a changed mtime evicts the entry
//!
//! Used by: `RepoLocator::locate()` in locator.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use crate::error::{AppError, Result};
use crate::git::repository::GitRepository;

struct CachedHandle {
    repo: Arc<GitRepository>,
    git_dir: PathBuf,
    /// Modification time of `git_dir` when the handle was opened
    modified: SystemTime,
    opened_at: Instant,
}

impl CachedHandle {
    /// Check if the handle still describes what is on disk
    fn is_valid(&self) -> bool {
        match std::fs::metadata(&self.git_dir).and_then(|m| m.modified()) {
            Ok(modified) => modified == self.modified,
            Err(_) => false,
        }
    }
}

#[derive(Default)]
pub struct HandleCache {
    entries: Mutex<HashMap<PathBuf, CachedHandle>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached handle for `dir`, if it is still valid. Stale entries are
    /// evicted.
    pub fn get(&self, dir: &Path) -> Result<Option<Arc<GitRepository>>> {
        let mut entries = self.lock()?;
        let Some(entry) = entries.get(dir) else {
            return Ok(None);
        };

        if entry.is_valid() {
            return Ok(Some(Arc::clone(&entry.repo)));
        }

        tracing::info!(
            "Evicting stale repository handle for {} (cached {:?} ago)",
            dir.display(),
            entry.opened_at.elapsed()
        );
        entries.remove(dir);
        Ok(None)
    }

    pub fn insert(&self, dir: PathBuf, repo: Arc<GitRepository>) -> Result<()> {
        let git_dir = repo.git_dir()?;
        let modified = std::fs::metadata(&git_dir)?.modified()?;
        tracing::info!("Caching repository handle for {}", dir.display());

        self.lock()?.insert(
            dir,
            CachedHandle {
                repo,
                git_dir,
                modified,
                opened_at: Instant::now(),
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<PathBuf, CachedHandle>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use tempfile::TempDir;

    #[test]
    fn test_hit_returns_same_handle() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        let cache = HandleCache::new();
        let repo = Arc::new(GitRepository::open(dir.path()).unwrap());

        assert!(cache.get(dir.path()).unwrap().is_none());
        cache.insert(dir.path().to_path_buf(), Arc::clone(&repo)).unwrap();

        let hit = cache.get(dir.path()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&hit, &repo));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_removed_repository_is_evicted() {
        let dir = TempDir::new().unwrap();
        let repo_dir = dir.path().join("proj");
        Repository::init(&repo_dir).unwrap();
        let cache = HandleCache::new();
        let repo = Arc::new(GitRepository::open(&repo_dir).unwrap());
        cache.insert(repo_dir.clone(), repo).unwrap();

        std::fs::remove_dir_all(&repo_dir).unwrap();
        assert!(cache.get(&repo_dir).unwrap().is_none());
        assert!(cache.is_empty());
    }
}
