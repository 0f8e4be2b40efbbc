use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::git::history::{attribute, join_path, normalize, PathPattern};
use crate::git::repository::commit_to_info;
use crate::git::store::{Blob, Commit, EntryMode, ObjectStore, Tree, TreeEntry};
use crate::models::{self, Breadcrumb, CommitInfo, EntryType, ReadmeInfo};

/// Files above this size are never treated as text.
pub const MAX_TEXT_SIZE: usize = 1024 * 1024;
const BINARY_SNIFF_LEN: usize = 8000;

/// A directory at a commit, annotated with last commits.
#[derive(Debug)]
pub struct TreeListing {
    pub path: String,
    pub last_commit: Option<CommitInfo>,
    pub entries: Vec<models::TreeEntry>,
    pub readme: Option<ReadmeInfo>,
}

/// Looks up the entry at `path` below `root`. The empty path has no entry.
pub fn entry_at<S: ObjectStore + ?Sized>(
    store: &S,
    root: &Tree,
    path: &str,
) -> Result<Option<TreeEntry>> {
    let path = normalize(path);
    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    let mut current: Option<Arc<Tree>> = None;

    while let Some(name) = segments.next() {
        let tree = current.as_deref().unwrap_or(root);
        let Some(entry) = tree.get(name) else {
            return Ok(None);
        };
        if segments.peek().is_none() {
            return Ok(Some(entry.clone()));
        }
        if !entry.mode.is_directory() {
            return Ok(None);
        }
        current = Some(load_tree(store, entry.id)?);
    }

    Ok(None)
}

/// The tree of directory `dir` at `commit`.
pub fn resolve_dir<S: ObjectStore + ?Sized>(
    store: &S,
    commit: &Commit,
    dir: &str,
) -> Result<Arc<Tree>> {
    let root = load_tree(store, commit.tree)?;
    if normalize(dir).is_empty() {
        return Ok(root);
    }
    match entry_at(store, &root, dir)? {
        Some(entry) if entry.mode.is_directory() => load_tree(store, entry.id),
        _ => Err(AppError::DirectoryNotFound(dir.to_string())),
    }
}

/// Lists directory `dir` at `commit`, attributing the directory and every
/// entry to its last commit in one history walk.
pub fn tree_view<S: ObjectStore + ?Sized>(
    store: &S,
    commit: &Arc<Commit>,
    dir: &str,
    cancel: &CancellationToken,
) -> Result<TreeListing> {
    let dir = normalize(dir);
    let tree = resolve_dir(store, commit, &dir)?;

    let mut patterns = Vec::with_capacity(tree.entries.len() + 1);
    patterns.push(PathPattern::directory(&dir));
    patterns.extend(tree.entries.iter().map(|e| PathPattern::for_entry(&dir, e)));

    let mut last = attribute(store, commit, &patterns, cancel)?.into_iter();
    let last_commit = last.next().flatten().map(|c| commit_to_info(&c));

    let mut entries = Vec::with_capacity(tree.entries.len());
    for (entry, last_commit) in tree.entries.iter().zip(last) {
        let path = join_path(&dir, &entry.name);
        if last_commit.is_none() {
            tracing::warn!(commit = %commit.id, path = %path, "no commit in history touches entry");
        }
        entries.push(models::TreeEntry {
            name: entry.name.clone(),
            path,
            entry_type: entry_type(entry.mode),
            executable: entry.mode == EntryMode::Executable,
            last_commit: last_commit.map(|c| commit_to_info(&c)),
        });
    }

    // Directories first, then files, alphabetically
    entries.sort_by(|a, b| match (&a.entry_type, &b.entry_type) {
        (EntryType::Directory, EntryType::Directory) => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        (EntryType::Directory, _) => std::cmp::Ordering::Less,
        (_, EntryType::Directory) => std::cmp::Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });

    let readme = find_readme(store, &dir, &tree)?;

    Ok(TreeListing {
        path: dir,
        last_commit,
        entries,
        readme,
    })
}

/// First regular file named `README` (any case) once its last extension is
/// removed.
fn find_readme<S: ObjectStore + ?Sized>(
    store: &S,
    dir: &str,
    tree: &Tree,
) -> Result<Option<ReadmeInfo>> {
    let Some(entry) = tree.entries.iter().find(|e| {
        let stem = e.name.rsplit_once('.').map_or(e.name.as_str(), |(stem, _)| stem);
        e.mode.is_file() && stem.eq_ignore_ascii_case("README")
    }) else {
        return Ok(None);
    };

    let blob = store
        .find_blob(entry.id)?
        .ok_or_else(|| AppError::Store(format!("missing blob {}", entry.id)))?;

    Ok(Some(ReadmeInfo {
        name: entry.name.clone(),
        path: join_path(dir, &entry.name),
        content: text_content(&blob.data).map(str::to_string),
    }))
}

/// The file at `path` in `commit`. Directories and submodules are not files.
pub fn blob_at<S: ObjectStore + ?Sized>(store: &S, commit: &Commit, path: &str) -> Result<Blob> {
    let root = load_tree(store, commit.tree)?;
    match entry_at(store, &root, path)? {
        Some(entry) if !matches!(entry.mode, EntryMode::Directory | EntryMode::Submodule) => store
            .find_blob(entry.id)?
            .ok_or_else(|| AppError::Store(format!("missing blob {}", entry.id))),
        _ => Err(AppError::FileNotFound(path.to_string())),
    }
}

/// Git's heuristic: a NUL byte near the start means binary.
pub fn looks_binary(data: &[u8]) -> bool {
    data.len() > MAX_TEXT_SIZE || data.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// The content as text, or `None` if it is binary or not UTF-8.
pub fn text_content(data: &[u8]) -> Option<&str> {
    if looks_binary(data) {
        return None;
    }
    std::str::from_utf8(data).ok()
}

/// Breadcrumbs for every directory on `path`, outermost first.
pub fn path_breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let path = normalize(path);
    if path.is_empty() {
        return Vec::new();
    }
    let names: Vec<&str> = path.split('/').collect();
    (0..names.len())
        .map(|i| Breadcrumb {
            name: names[i].to_string(),
            path: names[..=i].join("/"),
        })
        .collect()
}

/// Splits `a/b/c.txt` into (`a/b`, `c.txt`).
pub fn split_parent(path: &str) -> (String, String) {
    let path = normalize(path);
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir.to_string(), name.to_string()),
        None => (String::new(), path),
    }
}

fn entry_type(mode: EntryMode) -> EntryType {
    match mode {
        EntryMode::Regular | EntryMode::Executable => EntryType::File,
        EntryMode::Directory => EntryType::Directory,
        EntryMode::Symlink => EntryType::Symlink,
        EntryMode::Submodule => EntryType::Submodule,
    }
}

fn load_tree<S: ObjectStore + ?Sized>(store: &S, id: git2::Oid) -> Result<Arc<Tree>> {
    store
        .find_tree(id)?
        .ok_or_else(|| AppError::Store(format!("missing tree {}", id)))
}
