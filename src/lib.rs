//! Git Browser - a read-only JSON API over a directory of git repositories.
//!
//! The core is usable without the HTTP layer:
//! - `git::revision::resolve`: revision string to commit
//! - `git::history::attribute`: last commit for many paths in one walk
//! - `git::locator::locate`: request path to (possibly nested) repository

pub mod config;
pub mod error;
pub mod git;
pub mod models;
pub mod routes;

pub use config::ServerConfig;
pub use error::{AppError, Result};
pub use routes::{create_router, AppState};
