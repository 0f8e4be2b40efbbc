use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub oid: String,
    pub summary: String,
    pub description: String,
    pub author: AuthorInfo,
    pub committer: AuthorInfo,
    pub timestamp: i64,
    /// RFC 3339, in the committer's offset
    pub date: String,
    pub relative_time: String,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitListResponse {
    pub repo: String,
    pub revision: String,
    pub commits: Vec<CommitDetail>,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

/// A single commit with the paths it changed against its first parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub repo: String,
    pub commit: CommitDetail,
    pub changes: Vec<String>,
}
