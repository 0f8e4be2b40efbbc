//! File endpoints.
//!
//! - GET `{mount}/blob/{rev}/{path...}`
//!   File metadata plus text content (omitted for binary files).
//!
//! - GET `{mount}/raw/{rev}/{path...}`
//!   The bytes as stored. Text is served as `text/plain; charset=utf-8`,
//!   anything else with the type guessed from the file name.

use crate::error::Result;
use crate::git::locator::Located;
use crate::git::revision::resolve;
use crate::git::tree::{blob_at, path_breadcrumbs, split_parent, text_content};
use crate::models::BlobResponse;

pub struct RawBlob {
    pub content_type: String,
    pub data: Vec<u8>,
}

pub fn blob(located: &Located, revision: &str, path: &str) -> Result<BlobResponse> {
    let store = located.repo.as_ref();
    let commit = resolve(store, revision)?;
    let blob = blob_at(store, &commit, path)?;
    let (parent, name) = split_parent(path);
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default();
    let content = text_content(&blob.data).map(str::to_string);

    Ok(BlobResponse {
        repo: located.name.clone(),
        revision: revision.to_string(),
        path: if parent.is_empty() { name.clone() } else { format!("{}/{}", parent, name) },
        breadcrumbs: path_breadcrumbs(&parent),
        name,
        extension,
        size: blob.data.len() as u64,
        is_binary: content.is_none(),
        content,
    })
}

pub fn raw(located: &Located, revision: &str, path: &str) -> Result<RawBlob> {
    let store = located.repo.as_ref();
    let commit = resolve(store, revision)?;
    let blob = blob_at(store, &commit, path)?;

    let content_type = if text_content(&blob.data).is_some() {
        "text/plain; charset=utf-8".to_string()
    } else {
        mime_guess::from_path(path).first_or_octet_stream().to_string()
    };

    Ok(RawBlob {
        content_type,
        data: blob.data,
    })
}
