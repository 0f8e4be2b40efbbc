//! Data transfer objects (DTOs) for API responses.
//!
//! These structs are serialized to JSON for the presentation layer.
//! - `tree`: TreeResponse, TreeEntry, CommitInfo, Breadcrumb, BranchInfo, TagInfo
//! - `commit`: CommitDetail, CommitListResponse, CommitResponse, AuthorInfo
//! - `blob`: BlobResponse for single-file views

pub mod blob;
pub mod commit;
pub mod tree;

pub use blob::*;
pub use commit::*;
pub use tree::*;
