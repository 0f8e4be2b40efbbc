//! HTTP layer - maps request paths to repositories and views.
//!
//! Repositories are mounted at arbitrary (possibly nested) prefixes below the
//! root directory, so there is no static route table. A single fallback
//! handler locates the repository, parses the rest of the path as a
//! `RepoRoute`, and dispatches to the feature modules:
//! - `tree`: Directory listing with last commits
//! - `blob`: Single-file view and raw bytes
//! - `branches`: Branch and tag listings
//! - `commits`: Commit log and single-commit view
//!
//! All git work runs on the blocking pool, bounded by the history timeout.

pub mod blob;
pub mod branches;
pub mod commits;
pub mod path;
pub mod tree;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{AppError, Result};
use crate::git::RepoLocator;
use crate::models::{BlobResponse, BranchInfo, CommitListResponse, CommitResponse, TagInfo, TreeResponse};
use blob::RawBlob;
use commits::PageQuery;
use path::RepoRoute;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub locator: Arc<RepoLocator>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let locator = RepoLocator::new(config.root.clone(), !config.no_cache);
        Self {
            config: Arc::new(config),
            locator: Arc::new(locator),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new().fallback(browse).with_state(state)
}

/// Everything a route can answer with.
enum Page {
    Tree(TreeResponse),
    Blob(BlobResponse),
    Raw(RawBlob),
    Branches(Vec<BranchInfo>),
    Tags(Vec<TagInfo>),
    Commits(CommitListResponse),
    Commit(CommitResponse),
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        match self {
            Page::Tree(tree) => Json(tree).into_response(),
            Page::Blob(blob) => Json(blob).into_response(),
            Page::Raw(raw) => ([(header::CONTENT_TYPE, raw.content_type)], raw.data).into_response(),
            Page::Branches(branches) => Json(branches).into_response(),
            Page::Tags(tags) => Json(tags).into_response(),
            Page::Commits(commits) => Json(commits).into_response(),
            Page::Commit(commit) => Json(commit).into_response(),
        }
    }
}

async fn browse(State(state): State<AppState>, method: Method, uri: Uri) -> Result<Page> {
    // HEAD is answered like GET; the router strips the body
    if method != Method::GET && method != Method::HEAD {
        return Err(AppError::MethodNotAllowed(method.to_string()));
    }

    let request_path = path::decode_request_path(uri.path())?;
    let query = PageQuery::from_uri(&uri);
    let config = Arc::clone(&state.config);
    let locator = Arc::clone(&state.locator);

    run_blocking(&state.config, move |cancel| {
        let located = locator.locate(&request_path)?;
        let route = RepoRoute::parse(&located.in_repo_path)?;
        tracing::debug!(repo = %located.name, route = route.kind(), "dispatching");

        let default_branch = config.default_branch.as_str();
        let page = match route {
            RepoRoute::Tree { revision, path } => {
                let revision = revision.as_deref().unwrap_or(default_branch);
                Page::Tree(tree::tree(&located, revision, &path, cancel)?)
            }
            RepoRoute::Blob { revision, path } => Page::Blob(blob::blob(&located, &revision, &path)?),
            RepoRoute::Raw { revision, path } => Page::Raw(blob::raw(&located, &revision, &path)?),
            RepoRoute::Branches => Page::Branches(branches::branches(&located, default_branch)?),
            RepoRoute::Tags => Page::Tags(branches::tags(&located)?),
            RepoRoute::Commits { revision } => {
                let revision = revision.as_deref().unwrap_or(default_branch);
                Page::Commits(commits::list(&located, revision, &query, cancel)?)
            }
            RepoRoute::Commit { hash } => Page::Commit(commits::show(&located, &hash)?),
        };
        Ok(page)
    })
    .await
}

/// Runs `f` on the blocking pool. The token passed to `f` is cancelled when
/// the history timeout expires or the request is dropped.
async fn run_blocking<T, F>(config: &ServerConfig, f: F) -> Result<T>
where
    F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let token = cancel.clone();
    let task = tokio::task::spawn_blocking(move || f(&token));

    match tokio::time::timeout(config.history_timeout(), task).await {
        Ok(joined) => joined.map_err(|e| AppError::Internal(format!("Blocking task failed: {}", e)))?,
        Err(_) => {
            tracing::warn!(timeout = ?config.history_timeout(), "request exceeded history timeout");
            cancel.cancel();
            Err(AppError::Cancelled)
        }
    }
}
