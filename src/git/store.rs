//! Read-only object store abstraction.
//!
//! Every query in this crate runs against the `ObjectStore` trait so the same
//! resolver, history walk and views work on a libgit2 repository
//! (`GitRepository`) and on the in-process arena (`MemoryStore`).
//!
//! Objects are immutable and handed out as `Arc`s; callers never copy trees.

use git2::Oid;
use std::sync::Arc;

use crate::error::Result;

/// Author or committer identity with its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch
    pub time: i64,
    pub offset_minutes: i32,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, time: i64) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time,
            offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: Oid,
    /// First parent is the mainline ancestor
    pub parents: Vec<Oid>,
    pub tree: Oid,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
}

impl Commit {
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    Regular,
    Executable,
    Symlink,
    Directory,
    Submodule,
}

impl EntryMode {
    /// Maps a raw git file mode. Unknown modes yield `None`.
    pub fn from_raw(mode: i32) -> Option<Self> {
        match mode {
            0o100644 | 0o100664 => Some(EntryMode::Regular),
            0o100755 => Some(EntryMode::Executable),
            0o120000 => Some(EntryMode::Symlink),
            0o040000 => Some(EntryMode::Directory),
            0o160000 => Some(EntryMode::Submodule),
            _ => None,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            EntryMode::Regular => 0o100644,
            EntryMode::Executable => 0o100755,
            EntryMode::Symlink => 0o120000,
            EntryMode::Directory => 0o040000,
            EntryMode::Submodule => 0o160000,
        }
    }

    pub fn is_directory(self) -> bool {
        self == EntryMode::Directory
    }

    /// Regular or executable file content.
    pub fn is_file(self) -> bool {
        matches!(self, EntryMode::Regular | EntryMode::Executable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub mode: EntryMode,
    pub id: Oid,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, mode: EntryMode, id: Oid) -> Self {
        Self {
            name: name.into(),
            mode,
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub id: Oid,
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub id: Oid,
    pub data: Vec<u8>,
}

/// An annotated tag object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: Oid,
    pub name: String,
    /// Usually a commit, possibly another tag object
    pub target: Oid,
    pub message: String,
    pub tagger: Option<Signature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    LightweightTag,
    /// The target is a tag object, not the commit itself
    AnnotatedTag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Full name, e.g. `refs/heads/master`
    pub name: String,
    pub kind: RefKind,
    pub target: Oid,
}

impl Reference {
    /// Name with the `refs/heads/` or `refs/tags/` namespace removed.
    pub fn short_name(&self) -> &str {
        self.name
            .strip_prefix(BRANCH_PREFIX)
            .or_else(|| self.name.strip_prefix(TAG_PREFIX))
            .unwrap_or(&self.name)
    }
}

pub const BRANCH_PREFIX: &str = "refs/heads/";
pub const TAG_PREFIX: &str = "refs/tags/";

/// Read-only access to a content-addressed commit/tree/blob graph.
///
/// Lookups return `Ok(None)` when the id is absent or names an object of a
/// different type. `Err` is reserved for failures of the store itself.
pub trait ObjectStore: Send + Sync {
    fn find_commit(&self, id: Oid) -> Result<Option<Arc<Commit>>>;

    fn find_tree(&self, id: Oid) -> Result<Option<Arc<Tree>>>;

    fn find_blob(&self, id: Oid) -> Result<Option<Blob>>;

    fn find_tag(&self, id: Oid) -> Result<Option<Arc<Tag>>>;

    /// Looks up a reference by full name. Invalid names are `Ok(None)`.
    fn find_reference(&self, name: &str) -> Result<Option<Reference>>;

    /// All references whose full name starts with `prefix`, sorted by name.
    fn references(&self, prefix: &str) -> Result<Vec<Reference>>;

    /// Paths (files, symlinks and submodules, never directories) that
    /// differ between `old` and `new`. `old = None` is the empty tree, so
    /// every path of `new` is reported.
    fn diff_trees(&self, old: Option<Oid>, new: Oid) -> Result<Vec<String>>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    fn find_commit(&self, id: Oid) -> Result<Option<Arc<Commit>>> {
        (**self).find_commit(id)
    }

    fn find_tree(&self, id: Oid) -> Result<Option<Arc<Tree>>> {
        (**self).find_tree(id)
    }

    fn find_blob(&self, id: Oid) -> Result<Option<Blob>> {
        (**self).find_blob(id)
    }

    fn find_tag(&self, id: Oid) -> Result<Option<Arc<Tag>>> {
        (**self).find_tag(id)
    }

    fn find_reference(&self, name: &str) -> Result<Option<Reference>> {
        (**self).find_reference(name)
    }

    fn references(&self, prefix: &str) -> Result<Vec<Reference>> {
        (**self).references(prefix)
    }

    fn diff_trees(&self, old: Option<Oid>, new: Oid) -> Result<Vec<String>> {
        (**self).diff_trees(old, new)
    }
}
