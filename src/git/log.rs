//! Commit log, single-commit changes and ref listings.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::git::history::Ancestors;
use crate::git::repository::{cleanup_commit_message, commit_to_info};
use crate::git::revision::peel_to_commit;
use crate::git::store::{Commit, ObjectStore, RefKind, BRANCH_PREFIX, TAG_PREFIX};
use crate::models::{AuthorInfo, BranchInfo, TagInfo};

/// One page of ancestry, newest first.
#[derive(Debug)]
pub struct LogPage {
    pub commits: Vec<Arc<Commit>>,
    pub has_more: bool,
}

/// Walks the ancestry of `start`, skipping `offset` commits and returning at
/// most `limit`. One extra commit is read to decide `has_more`.
pub fn commit_log<S: ObjectStore + ?Sized>(
    store: &S,
    start: Arc<Commit>,
    offset: usize,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<LogPage> {
    let mut commits = Vec::with_capacity(limit.min(64));
    let mut has_more = false;

    for (i, commit) in Ancestors::new(store, start).with_cancel(cancel).enumerate() {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let commit = commit?;
        if i < offset {
            continue;
        }
        if commits.len() == limit {
            has_more = true;
            break;
        }
        commits.push(commit);
    }

    Ok(LogPage { commits, has_more })
}

/// Paths changed by `commit` relative to its first parent, or every path
/// for a root commit.
pub fn commit_changes<S: ObjectStore + ?Sized>(store: &S, commit: &Commit) -> Result<Vec<String>> {
    let parent_tree = match commit.parents.first() {
        Some(&parent_id) => {
            let parent = store.find_commit(parent_id)?.ok_or_else(|| {
                AppError::Store(format!("commit {} has missing parent {}", commit.id, parent_id))
            })?;
            Some(parent.tree)
        }
        None => None,
    };

    let mut paths = store.diff_trees(parent_tree, commit.tree)?;
    paths.sort();
    Ok(paths)
}

pub fn list_branches<S: ObjectStore + ?Sized>(
    store: &S,
    default_branch: &str,
) -> Result<Vec<BranchInfo>> {
    let mut branches = Vec::new();
    for reference in store.references(BRANCH_PREFIX)? {
        let last_commit = peel_to_commit(store, reference.target)?;
        let name = reference.short_name().to_string();
        branches.push(BranchInfo {
            is_default: name == default_branch,
            name,
            last_commit: last_commit.map(|c| commit_to_info(&c)),
        });
    }

    // Default branch first, the rest by name
    branches.sort_by(|a, b| b.is_default.cmp(&a.is_default).then_with(|| a.name.cmp(&b.name)));

    Ok(branches)
}

pub fn list_tags<S: ObjectStore + ?Sized>(store: &S) -> Result<Vec<TagInfo>> {
    let mut tags = Vec::new();
    for reference in store.references(TAG_PREFIX)? {
        let annotated = match reference.kind {
            RefKind::AnnotatedTag => store.find_tag(reference.target)?,
            _ => None,
        };
        let commit = peel_to_commit(store, reference.target)?;

        tags.push(TagInfo {
            name: reference.short_name().to_string(),
            annotated: annotated.is_some(),
            message: annotated
                .as_ref()
                .map(|t| cleanup_commit_message(&t.message).to_string()),
            tagger: annotated.as_ref().and_then(|t| t.tagger.as_ref()).map(|s| AuthorInfo {
                name: s.name.clone(),
                email: s.email.clone(),
            }),
            commit: commit.map(|c| commit_to_info(&c)),
        });
    }

    Ok(tags)
}
