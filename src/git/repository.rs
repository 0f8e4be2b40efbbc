use git2::{DiffOptions, ErrorCode, ObjectType, Oid, Repository};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{AppError, Result};
use crate::git::store::{
    Blob, Commit, EntryMode, ObjectStore, RefKind, Reference, Signature, Tag, Tree, TreeEntry,
    BRANCH_PREFIX, TAG_PREFIX,
};
use crate::models::{AuthorInfo, CommitDetail, CommitInfo};

/// A repository on disk, opened through libgit2.
///
/// libgit2 handles are `Send` but not `Sync`, so the handle sits behind a
/// mutex; reads of one repository are serialized.
pub struct GitRepository {
    pub repo: Mutex<Repository>,
    /// Directory the repository was opened from (work tree or bare root)
    pub path: PathBuf,
}

impl GitRepository {
    /// Opens `path` as a repository without searching parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let repo = Repository::open(&path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                AppError::RepoNotFound(path.display().to_string())
            } else {
                AppError::Git(e)
            }
        })?;

        Ok(Self {
            repo: Mutex::new(repo),
            path,
        })
    }

    /// Like `open`, but a directory that is not a repository is `Ok(None)`.
    pub fn try_open<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        match Self::open(path) {
            Ok(repo) => Ok(Some(repo)),
            Err(AppError::RepoNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The `.git` directory, or the repository itself when bare.
    pub fn git_dir(&self) -> Result<PathBuf> {
        self.with_repo(|repo| Ok(repo.path().to_path_buf()))
    }

    pub fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self.repo.lock().map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        f(&repo)
    }
}

/// `Ok(None)` for lookups that miss; everything else is a store failure.
fn optional<T>(result: std::result::Result<T, git2::Error>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(AppError::Git(e)),
    }
}

fn convert_signature(sig: &git2::Signature<'_>) -> Signature {
    Signature {
        name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
        time: sig.when().seconds(),
        offset_minutes: sig.when().offset_minutes(),
    }
}

fn convert_commit(commit: &git2::Commit<'_>) -> Commit {
    Commit {
        id: commit.id(),
        parents: commit.parent_ids().collect(),
        tree: commit.tree_id(),
        message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        author: convert_signature(&commit.author()),
        committer: convert_signature(&commit.committer()),
    }
}

fn convert_reference(repo: &Repository, name: &str, target: Oid) -> Result<Option<Reference>> {
    let kind = if name.starts_with(BRANCH_PREFIX) {
        RefKind::Branch
    } else if name.starts_with(TAG_PREFIX) {
        let kind = optional(repo.find_object(target, None))?.and_then(|o| o.kind());
        if kind == Some(ObjectType::Tag) {
            RefKind::AnnotatedTag
        } else {
            RefKind::LightweightTag
        }
    } else {
        return Ok(None);
    };

    Ok(Some(Reference {
        name: name.to_string(),
        kind,
        target,
    }))
}

impl ObjectStore for GitRepository {
    fn find_commit(&self, id: Oid) -> Result<Option<Arc<Commit>>> {
        self.with_repo(|repo| {
            let object = optional(repo.find_object(id, None))?;
            Ok(object
                .and_then(|o| o.into_commit().ok())
                .map(|c| Arc::new(convert_commit(&c))))
        })
    }

    fn find_tree(&self, id: Oid) -> Result<Option<Arc<Tree>>> {
        self.with_repo(|repo| {
            let Some(tree) = optional(repo.find_object(id, None))?.and_then(|o| o.into_tree().ok())
            else {
                return Ok(None);
            };

            let entries = tree
                .iter()
                .filter_map(|entry| {
                    let mode = EntryMode::from_raw(entry.filemode())?;
                    let name = String::from_utf8_lossy(entry.name_bytes()).into_owned();
                    Some(TreeEntry::new(name, mode, entry.id()))
                })
                .collect();

            Ok(Some(Arc::new(Tree { id, entries })))
        })
    }

    fn find_blob(&self, id: Oid) -> Result<Option<Blob>> {
        self.with_repo(|repo| {
            let blob = optional(repo.find_object(id, None))?.and_then(|o| o.into_blob().ok());
            Ok(blob.map(|b| Blob {
                id,
                data: b.content().to_vec(),
            }))
        })
    }

    fn find_tag(&self, id: Oid) -> Result<Option<Arc<Tag>>> {
        self.with_repo(|repo| {
            let tag = optional(repo.find_object(id, None))?.and_then(|o| o.into_tag().ok());
            Ok(tag.map(|t| {
                Arc::new(Tag {
                    id,
                    name: String::from_utf8_lossy(t.name_bytes()).into_owned(),
                    target: t.target_id(),
                    message: t
                        .message_bytes()
                        .map(|m| String::from_utf8_lossy(m).into_owned())
                        .unwrap_or_default(),
                    tagger: t.tagger().map(|s| convert_signature(&s)),
                })
            }))
        })
    }

    fn find_reference(&self, name: &str) -> Result<Option<Reference>> {
        if !git2::Reference::is_valid_name(name) {
            return Ok(None);
        }

        self.with_repo(|repo| {
            let reference = match repo.find_reference(name) {
                Ok(r) => r,
                Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            let Some(target) = reference.resolve()?.target() else {
                return Ok(None);
            };
            convert_reference(repo, name, target)
        })
    }

    fn references(&self, prefix: &str) -> Result<Vec<Reference>> {
        self.with_repo(|repo| {
            let mut refs = Vec::new();
            for reference in repo.references_glob(&format!("{}*", prefix))? {
                let reference = reference?;
                let Some(name) = reference.name().map(str::to_string) else {
                    continue;
                };
                let Some(target) = reference.resolve()?.target() else {
                    continue;
                };
                if let Some(r) = convert_reference(repo, &name, target)? {
                    refs.push(r);
                }
            }
            refs.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(refs)
        })
    }

    fn diff_trees(&self, old: Option<Oid>, new: Oid) -> Result<Vec<String>> {
        self.with_repo(|repo| {
            let old_tree = match old {
                Some(id) => Some(repo.find_tree(id)?),
                None => None,
            };
            let new_tree = repo.find_tree(new)?;

            let mut opts = DiffOptions::new();
            opts.ignore_submodules(false);

            let diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut opts))?;

            let mut changes = Vec::with_capacity(diff.deltas().len());
            for delta in diff.deltas() {
                let old_path = delta.old_file().path();
                let new_path = delta.new_file().path();
                if let Some(p) = new_path {
                    changes.push(p.to_string_lossy().into_owned());
                }
                if let Some(p) = old_path.filter(|p| Some(*p) != new_path) {
                    changes.push(p.to_string_lossy().into_owned());
                }
            }
            Ok(changes)
        })
    }
}

pub fn commit_to_info(commit: &Commit) -> CommitInfo {
    let timestamp = commit.committer.time;
    let (summary, _) = split_commit_message(&commit.message);
    CommitInfo {
        oid: commit.id.to_string(),
        message: summary,
        author: commit.author.name.clone(),
        timestamp,
        relative_time: format_relative_time(timestamp),
    }
}

pub fn commit_to_detail(commit: &Commit) -> CommitDetail {
    let (summary, description) = split_commit_message(&commit.message);
    CommitDetail {
        oid: commit.id.to_string(),
        summary,
        description,
        author: AuthorInfo {
            name: commit.author.name.clone(),
            email: commit.author.email.clone(),
        },
        committer: AuthorInfo {
            name: commit.committer.name.clone(),
            email: commit.committer.email.clone(),
        },
        timestamp: commit.committer.time,
        date: format_date(commit.committer.time, commit.committer.offset_minutes),
        relative_time: format_relative_time(commit.committer.time),
        parents: commit.parents.iter().map(|p| p.to_string()).collect(),
    }
}

const PGP_SIGNATURE_END: &str = "-----END PGP SIGNATURE-----";

/// Drops an embedded PGP signature block and surrounding whitespace.
pub fn cleanup_commit_message(message: &str) -> &str {
    let message = message.trim();
    match message.find(PGP_SIGNATURE_END) {
        Some(i) => message[i + PGP_SIGNATURE_END.len()..].trim(),
        None => message,
    }
}

/// Splits a message into its first line and the (trimmed) rest.
pub fn split_commit_message(message: &str) -> (String, String) {
    let message = cleanup_commit_message(message);
    match message.split_once('\n') {
        Some((summary, description)) => (summary.trim().to_string(), description.trim().to_string()),
        None => (message.trim().to_string(), String::new()),
    }
}

/// RFC 3339 timestamp in the committer's own offset.
pub fn format_date(timestamp: i64, offset_minutes: i32) -> String {
    let Some(utc) = chrono::DateTime::from_timestamp(timestamp, 0) else {
        return String::new();
    };
    match chrono::FixedOffset::east_opt(offset_minutes * 60) {
        Some(offset) => utc.with_timezone(&offset).to_rfc3339(),
        None => utc.to_rfc3339(),
    }
}

pub fn format_relative_time(timestamp: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let diff = now - timestamp;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        let mins = diff / 60;
        format!("{} minute{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if diff < 86400 {
        let hours = diff / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if diff < 2592000 {
        let days = diff / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else if diff < 31536000 {
        let months = diff / 2592000;
        format!("{} month{} ago", months, if months == 1 { "" } else { "s" })
    } else {
        let years = diff / 31536000;
        format!("{} year{} ago", years, if years == 1 { "" } else { "s" })
    }
}
