//! Maps a request path onto the repository that serves it.
//!
//! Repositories live anywhere below a root directory and may be nested.
//! The scan walks the request path from the left and stops at the first
//! (outermost) directory that opens as a repository; the rest of the path
//! is handed to the repository's routes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::git::cache::HandleCache;
use crate::git::repository::GitRepository;

/// A repository found for a request path.
#[derive(Clone)]
pub struct Located {
    pub repo: Arc<GitRepository>,
    /// Display name, without a trailing `.git`
    pub name: String,
    /// Request-path prefix the repository is mounted at, e.g. `/proj`.
    /// Empty when the root directory itself is the repository.
    pub mount_prefix: String,
    /// Remaining segments joined by `/`, e.g. `tree/master/src`
    pub in_repo_path: String,
}

impl std::fmt::Debug for Located {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Located")
            .field("path", &self.repo.path)
            .field("name", &self.name)
            .field("mount_prefix", &self.mount_prefix)
            .field("in_repo_path", &self.in_repo_path)
            .finish()
    }
}

enum Candidate {
    Repository(Arc<GitRepository>),
    /// A directory that is not a repository; deeper candidates may be
    Directory,
    /// Nothing deeper can exist
    Missing,
}

/// Locator bound to a root directory, reusing handles across requests.
pub struct RepoLocator {
    root_dir: PathBuf,
    cache: Option<HandleCache>,
}

impl RepoLocator {
    pub fn new(root_dir: impl Into<PathBuf>, use_cache: bool) -> Self {
        Self {
            root_dir: root_dir.into(),
            cache: use_cache.then(HandleCache::new),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn locate(&self, request_path: &str) -> Result<Located> {
        locate_with(request_path, &self.root_dir, self.cache.as_ref())
    }
}

/// Finds the repository for `request_path` below `root_dir`, opening a
/// fresh handle.
pub fn locate(request_path: &str, root_dir: &Path) -> Result<Located> {
    locate_with(request_path, root_dir, None)
}

fn locate_with(request_path: &str, root_dir: &Path, cache: Option<&HandleCache>) -> Result<Located> {
    let segments: Vec<&str> = request_path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(AppError::RepoNotFound(request_path.to_string()));
    }

    let mut candidate = root_dir.to_path_buf();
    for matched in 0..=segments.len() {
        if matched > 0 {
            candidate.push(segments[matched - 1]);
        }

        match inspect(&candidate, cache)? {
            Candidate::Repository(repo) => {
                let name = match matched {
                    0 => root_dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| root_dir.display().to_string()),
                    _ => segments[matched - 1].to_string(),
                };
                let name = name.strip_suffix(".git").unwrap_or(&name).to_string();
                let mount_prefix = segments[..matched]
                    .iter()
                    .map(|s| format!("/{}", s))
                    .collect::<String>();

                tracing::debug!(
                    request_path,
                    repo = %candidate.display(),
                    mount_prefix = %mount_prefix,
                    "located repository"
                );

                return Ok(Located {
                    repo,
                    name,
                    mount_prefix,
                    in_repo_path: segments[matched..].join("/"),
                });
            }
            Candidate::Directory => continue,
            Candidate::Missing => break,
        }
    }

    Err(AppError::RepoNotFound(request_path.to_string()))
}

fn inspect(dir: &Path, cache: Option<&HandleCache>) -> Result<Candidate> {
    if let Some(cache) = cache {
        if let Some(repo) = cache.get(dir)? {
            return Ok(Candidate::Repository(repo));
        }
    }

    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(Candidate::Missing),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Candidate::Missing),
        Err(e) => return Err(e.into()),
    }

    let Some(repo) = GitRepository::try_open(dir)? else {
        return Ok(Candidate::Directory);
    };
    let repo = Arc::new(repo);
    if let Some(cache) = cache {
        cache.insert(dir.to_path_buf(), Arc::clone(&repo))?;
    }
    Ok(Candidate::Repository(repo))
}
