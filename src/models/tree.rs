//! Tree and reference DTOs.
//!
//! - `TreeResponse`: Directory listing at a revision, with last commits
//! - `TreeEntry`: Single file/directory in a listing
//! - `CommitInfo`: Basic commit info (last commit in tree entries)
//! - `Breadcrumb`: One parent directory of the viewed path
//! - `ReadmeInfo`: README found in the listed directory
//! - `BranchInfo`, `TagInfo`: Reference listings

use serde::{Deserialize, Serialize};

use super::AuthorInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResponse {
    pub repo: String,
    pub revision: String,
    /// Commit the revision resolved to
    pub commit: String,
    pub path: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Last commit touching anything below `path`
    pub last_commit: Option<CommitInfo>,
    pub entries: Vec<TreeEntry>,
    pub readme: Option<ReadmeInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    pub entry_type: EntryType,
    pub executable: bool,
    pub last_commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    Submodule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub oid: String,
    pub message: String,
    pub author: String,
    pub timestamp: i64,
    pub relative_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadmeInfo {
    pub name: String,
    pub path: String,
    /// Raw text; `None` when the file is not valid UTF-8
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub is_default: bool,
    pub last_commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub annotated: bool,
    pub message: Option<String>,
    pub tagger: Option<AuthorInfo>,
    /// Commit the tag peels to; `None` for tags of trees or blobs
    pub commit: Option<CommitInfo>,
}
