//! Parsing of the in-repository part of a request path.

use percent_encoding::percent_decode_str;

use crate::error::{AppError, Result};

/// Percent-decodes a request path segment by segment, dropping empty
/// segments. A segment that is not UTF-8 once decoded, or that decodes to
/// something containing `/` or NUL, names nothing and is `RouteNotFound`.
pub fn decode_request_path(raw: &str) -> Result<String> {
    let mut decoded = String::with_capacity(raw.len());
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        let segment = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| AppError::RouteNotFound(raw.to_string()))?;
        if segment.contains(['/', '\0']) {
            return Err(AppError::RouteNotFound(raw.to_string()));
        }
        decoded.push('/');
        decoded.push_str(&segment);
    }
    Ok(decoded)
}

/// A route below a repository's mount prefix. `None` revisions fall back to
/// the configured default branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoRoute {
    Tree { revision: Option<String>, path: String },
    Blob { revision: String, path: String },
    Raw { revision: String, path: String },
    Branches,
    Tags,
    Commits { revision: Option<String> },
    Commit { hash: String },
}

impl RepoRoute {
    /// `in_repo_path` is the request path with the mount prefix removed,
    /// e.g. `tree/master/src`. The revision is always one segment.
    pub fn parse(in_repo_path: &str) -> Result<Self> {
        let segments: Vec<&str> = in_repo_path.split('/').filter(|s| !s.is_empty()).collect();
        let not_found = || AppError::RouteNotFound(in_repo_path.to_string());

        let route = match segments.as_slice() {
            [] | ["tree"] => RepoRoute::Tree {
                revision: None,
                path: String::new(),
            },
            ["tree", revision, rest @ ..] => RepoRoute::Tree {
                revision: Some(revision.to_string()),
                path: rest.join("/"),
            },
            ["blob", revision, rest @ ..] if !rest.is_empty() => RepoRoute::Blob {
                revision: revision.to_string(),
                path: rest.join("/"),
            },
            ["raw", revision, rest @ ..] if !rest.is_empty() => RepoRoute::Raw {
                revision: revision.to_string(),
                path: rest.join("/"),
            },
            ["branches"] => RepoRoute::Branches,
            ["tags"] => RepoRoute::Tags,
            ["commits"] => RepoRoute::Commits { revision: None },
            ["commits", revision] => RepoRoute::Commits {
                revision: Some(revision.to_string()),
            },
            ["commit", hash] => RepoRoute::Commit {
                hash: hash.to_string(),
            },
            _ => return Err(not_found()),
        };

        Ok(route)
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RepoRoute::Tree { .. } => "tree",
            RepoRoute::Blob { .. } => "blob",
            RepoRoute::Raw { .. } => "raw",
            RepoRoute::Branches => "branches",
            RepoRoute::Tags => "tags",
            RepoRoute::Commits { .. } => "commits",
            RepoRoute::Commit { .. } => "commit",
        }
    }
}
