use axum::{extract::Query, http::Uri};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::git::locator::Located;
use crate::git::log::{commit_changes, commit_log};
use crate::git::repository::commit_to_detail;
use crate::git::revision::{resolve, RevisionStrategy};
use crate::models::{CommitListResponse, CommitResponse};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

impl PageQuery {
    /// Parses `?limit=&offset=`; a malformed query string means defaults.
    pub fn from_uri(uri: &Uri) -> Self {
        Query::<PageQuery>::try_from_uri(uri)
            .map(|Query(query)| query)
            .unwrap_or_default()
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// GET `{mount}/commits/{rev}?limit=&offset=`
pub fn list(
    located: &Located,
    revision: &str,
    query: &PageQuery,
    cancel: &CancellationToken,
) -> Result<CommitListResponse> {
    let store = located.repo.as_ref();
    let start = resolve(store, revision)?;
    let limit = query.limit();
    let page = commit_log(store, start, query.offset, limit, cancel)?;

    Ok(CommitListResponse {
        repo: located.name.clone(),
        revision: revision.to_string(),
        commits: page.commits.iter().map(|c| commit_to_detail(c)).collect(),
        offset: query.offset,
        limit,
        has_more: page.has_more,
    })
}

/// GET `{mount}/commit/{hash}`. Only a full commit id is accepted.
pub fn show(located: &Located, hash: &str) -> Result<CommitResponse> {
    let store = located.repo.as_ref();
    let commit = RevisionStrategy::DirectHash
        .try_resolve(store, hash)?
        .ok_or_else(|| AppError::CommitNotFound(hash.to_string()))?;
    let changes = commit_changes(store, &commit)?;

    Ok(CommitResponse {
        repo: located.name.clone(),
        commit: commit_to_detail(&commit),
        changes,
    })
}
