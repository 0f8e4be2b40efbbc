//! Revision string to commit resolution.
//!
//! A revision is tried as a full commit id, then as a branch, then as a tag.
//! The first strategy that yields a commit wins; a string nothing matches is
//! `RevisionNotFound`, never a store error.

use git2::Oid;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::git::store::{Commit, ObjectStore, RefKind, BRANCH_PREFIX, TAG_PREFIX};

/// Longest chain of tag objects followed before giving up.
pub const MAX_TAG_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionStrategy {
    DirectHash,
    BranchRef,
    TagRef,
}

/// Hash lookup is unambiguous and cheapest; a branch shadows a tag of the
/// same name.
pub const RESOLUTION_ORDER: [RevisionStrategy; 3] = [
    RevisionStrategy::DirectHash,
    RevisionStrategy::BranchRef,
    RevisionStrategy::TagRef,
];

impl RevisionStrategy {
    /// `Ok(None)` is a miss; the next strategy should be tried.
    pub fn try_resolve<S: ObjectStore + ?Sized>(
        self,
        store: &S,
        revision: &str,
    ) -> Result<Option<Arc<Commit>>> {
        match self {
            RevisionStrategy::DirectHash => match parse_full_hash(revision) {
                Some(id) => store.find_commit(id),
                None => Ok(None),
            },
            RevisionStrategy::BranchRef => {
                match store.find_reference(&format!("{}{}", BRANCH_PREFIX, revision))? {
                    Some(reference) => peel_to_commit(store, reference.target),
                    None => Ok(None),
                }
            }
            RevisionStrategy::TagRef => {
                match store.find_reference(&format!("{}{}", TAG_PREFIX, revision))? {
                    Some(reference) if reference.kind == RefKind::AnnotatedTag => {
                        match store.find_tag(reference.target)? {
                            Some(tag) => peel_to_commit(store, tag.target),
                            None => Ok(None),
                        }
                    }
                    Some(reference) => peel_to_commit(store, reference.target),
                    None => Ok(None),
                }
            }
        }
    }
}

/// Resolves a revision string (commit id, branch or tag name) to a commit.
pub fn resolve<S: ObjectStore + ?Sized>(store: &S, revision: &str) -> Result<Arc<Commit>> {
    if revision.is_empty() {
        return Err(AppError::RevisionNotFound(String::new()));
    }

    for strategy in RESOLUTION_ORDER {
        if let Some(commit) = strategy.try_resolve(store, revision)? {
            tracing::debug!(revision, ?strategy, commit = %commit.id, "resolved revision");
            return Ok(commit);
        }
    }

    Err(AppError::RevisionNotFound(revision.to_string()))
}

/// Only a complete 40-digit hex id is treated as a hash. `Oid::from_str`
/// would zero-pad shorter input into an unrelated id.
fn parse_full_hash(revision: &str) -> Option<Oid> {
    if revision.len() != 40 || !revision.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Oid::from_str(revision).ok()
}

/// Follows tag objects until a commit is reached. Anything else (a tree, a
/// blob, a dangling id, an overly long chain) is a miss.
pub fn peel_to_commit<S: ObjectStore + ?Sized>(store: &S, mut id: Oid) -> Result<Option<Arc<Commit>>> {
    for _ in 0..=MAX_TAG_DEPTH {
        if let Some(commit) = store.find_commit(id)? {
            return Ok(Some(commit));
        }
        match store.find_tag(id)? {
            Some(tag) => id = tag.target,
            None => return Ok(None),
        }
    }
    tracing::warn!(%id, "tag chain longer than {} hops", MAX_TAG_DEPTH);
    Ok(None)
}
