//! Application error types and HTTP response mapping.
//!
//! Defines `AppError` enum for all error conditions and implements Axum's
//! `IntoResponse` to automatically convert errors to appropriate HTTP responses
//! with JSON error bodies.
//!
//! Error mappings:
//! - `RepoNotFound`, `RevisionNotFound`, `DirectoryNotFound`, `FileNotFound`,
//!   `CommitNotFound`, `RouteNotFound` → 404
//! - `MethodNotAllowed` → 405
//! - `Cancelled` → 503
//! - `Git`, `Io`, `Store`, `Internal` → 500 (details are logged, not returned)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("History walk cancelled")]
    Cancelled,

    #[error("Object store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for the user-facing "something is absent" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::RepoNotFound(_)
                | AppError::RevisionNotFound(_)
                | AppError::DirectoryNotFound(_)
                | AppError::FileNotFound(_)
                | AppError::CommitNotFound(_)
                | AppError::RouteNotFound(_)
        )
    }

    /// True for object-store and filesystem failures.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            AppError::Git(_) | AppError::Io(_) | AppError::Store(_) | AppError::Internal(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::RepoNotFound(_) => (StatusCode::NOT_FOUND, "No such repository"),
            AppError::RevisionNotFound(_) => (StatusCode::NOT_FOUND, "No such revision"),
            AppError::DirectoryNotFound(_) => (StatusCode::NOT_FOUND, "No such directory"),
            AppError::FileNotFound(_) => (StatusCode::NOT_FOUND, "No such file"),
            AppError::CommitNotFound(_) => (StatusCode::NOT_FOUND, "No such commit"),
            AppError::RouteNotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            AppError::MethodNotAllowed(_) => {
                (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
            }
            AppError::Cancelled => {
                tracing::warn!("history walk cancelled before completion");
                (StatusCode::SERVICE_UNAVAILABLE, "Request took too long")
            }
            AppError::Git(_) | AppError::Io(_) | AppError::Store(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
