//! Single-file view DTO.

use serde::{Deserialize, Serialize};

use super::Breadcrumb;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobResponse {
    pub repo: String,
    pub revision: String,
    pub path: String,
    pub name: String,
    pub extension: String,
    /// Parent directories, outermost first
    pub breadcrumbs: Vec<Breadcrumb>,
    pub size: u64,
    pub is_binary: bool,
    /// Text content; `None` for binary files
    pub content: Option<String>,
}
