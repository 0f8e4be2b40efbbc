//! Reference listing endpoints.
//!
//! - GET `{mount}/branches`
//!   Every local branch with its tip commit; the configured default branch
//!   is flagged and listed first.
//!
//! - GET `{mount}/tags`
//!   Every tag with the commit it points at. Annotated tags also carry their
//!   message and tagger.

use crate::error::Result;
use crate::git::locator::Located;
use crate::git::log::{list_branches, list_tags};
use crate::models::{BranchInfo, TagInfo};

pub fn branches(located: &Located, default_branch: &str) -> Result<Vec<BranchInfo>> {
    list_branches(located.repo.as_ref(), default_branch)
}

pub fn tags(located: &Located) -> Result<Vec<TagInfo>> {
    list_tags(located.repo.as_ref())
}
