use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::git::locator::Located;
use crate::git::revision::resolve;
use crate::git::tree::{path_breadcrumbs, split_parent, tree_view};
use crate::models::TreeResponse;

/// GET `{mount}/tree/{rev}/{path...}` (and `{mount}/` for the default branch)
pub fn tree(
    located: &Located,
    revision: &str,
    path: &str,
    cancel: &CancellationToken,
) -> Result<TreeResponse> {
    let store = located.repo.as_ref();
    let commit = resolve(store, revision)?;
    let listing = tree_view(store, &commit, path, cancel)?;
    let (parent, _) = split_parent(&listing.path);

    Ok(TreeResponse {
        repo: located.name.clone(),
        revision: revision.to_string(),
        commit: commit.id.to_string(),
        breadcrumbs: path_breadcrumbs(&parent),
        path: listing.path,
        last_commit: listing.last_commit,
        entries: listing.entries,
        readme: listing.readme,
    })
}
