//! In-process object store.
//!
//! An arena of immutable objects keyed by content id. Ids are computed with
//! `Oid::hash_object` over git's canonical encoding, so identical content
//! always shares one node and identical subtrees across commits are the
//! same `Arc`. The store is seeded through the `insert_*` methods and then
//! only read, typically behind an `Arc`.

use git2::{ObjectType, Oid};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::git::diff;
use crate::git::store::{
    Blob, Commit, EntryMode, ObjectStore, RefKind, Reference, Signature, Tag, Tree, TreeEntry,
    BRANCH_PREFIX, TAG_PREFIX,
};

#[derive(Debug, Clone)]
enum Object {
    Commit(Arc<Commit>),
    Tree(Arc<Tree>),
    Blob(Arc<Vec<u8>>),
    Tag(Arc<Tag>),
}

impl Object {
    fn kind(&self) -> ObjectType {
        match self {
            Object::Commit(_) => ObjectType::Commit,
            Object::Tree(_) => ObjectType::Tree,
            Object::Blob(_) => ObjectType::Blob,
            Object::Tag(_) => ObjectType::Tag,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: HashMap<Oid, Object>,
    refs: BTreeMap<String, Oid>,
}

/// Nested directory layout used by `insert_files`.
enum Node {
    File(Oid),
    Dir(BTreeMap<String, Node>),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn insert_blob(&mut self, data: impl Into<Vec<u8>>) -> Result<Oid> {
        let data = data.into();
        let id = Oid::hash_object(ObjectType::Blob, &data)?;
        self.objects
            .entry(id)
            .or_insert_with(|| Object::Blob(Arc::new(data)));
        Ok(id)
    }

    /// Stores a tree. Entry names must be unique; children are not required
    /// to exist yet.
    pub fn insert_tree(&mut self, mut entries: Vec<TreeEntry>) -> Result<Oid> {
        // git orders directories as if their name ended with '/'
        entries.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        for pair in entries.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(AppError::Store(format!(
                    "duplicate tree entry {:?}",
                    pair[0].name
                )));
            }
        }

        let mut raw = Vec::new();
        for entry in &entries {
            raw.extend_from_slice(format!("{:o} {}\0", entry.mode.raw(), entry.name).as_bytes());
            raw.extend_from_slice(entry.id.as_bytes());
        }
        let id = Oid::hash_object(ObjectType::Tree, &raw)?;
        self.objects
            .entry(id)
            .or_insert_with(|| Object::Tree(Arc::new(Tree { id, entries })));
        Ok(id)
    }

    /// Builds the nested trees for a flat list of `(path, content)` files and
    /// returns the root tree id.
    pub fn insert_files<P, C>(&mut self, files: &[(P, C)]) -> Result<Oid>
    where
        P: AsRef<str>,
        C: AsRef<[u8]>,
    {
        let mut root = BTreeMap::new();
        for (path, content) in files {
            let blob = self.insert_blob(content.as_ref())?;
            let segments: Vec<&str> = path
                .as_ref()
                .split('/')
                .filter(|s| !s.is_empty())
                .collect();
            let Some((file, dirs)) = segments.split_last() else {
                return Err(AppError::Store("empty file path".to_string()));
            };

            let mut level = &mut root;
            for dir in dirs {
                let node = level
                    .entry(dir.to_string())
                    .or_insert_with(|| Node::Dir(BTreeMap::new()));
                level = match node {
                    Node::Dir(children) => children,
                    Node::File(_) => {
                        return Err(AppError::Store(format!(
                            "{} is both a file and a directory",
                            dir
                        )));
                    }
                };
            }
            if level.insert(file.to_string(), Node::File(blob)).is_some() {
                return Err(AppError::Store(format!("duplicate path {}", path.as_ref())));
            }
        }
        self.write_dir(root)
    }

    fn write_dir(&mut self, children: BTreeMap<String, Node>) -> Result<Oid> {
        let mut entries = Vec::with_capacity(children.len());
        for (name, node) in children {
            let entry = match node {
                Node::File(id) => TreeEntry::new(name, EntryMode::Regular, id),
                Node::Dir(sub) => TreeEntry::new(name, EntryMode::Directory, self.write_dir(sub)?),
            };
            entries.push(entry);
        }
        self.insert_tree(entries)
    }

    pub fn insert_commit(
        &mut self,
        tree: Oid,
        parents: &[Oid],
        message: &str,
        author: Signature,
        committer: Signature,
    ) -> Result<Oid> {
        let mut raw = format!("tree {}\n", tree);
        for parent in parents {
            raw.push_str(&format!("parent {}\n", parent));
        }
        raw.push_str(&format!("author {}\n", encode_signature(&author)));
        raw.push_str(&format!("committer {}\n\n", encode_signature(&committer)));
        raw.push_str(message);

        let id = Oid::hash_object(ObjectType::Commit, raw.as_bytes())?;
        self.objects.entry(id).or_insert_with(|| {
            Object::Commit(Arc::new(Commit {
                id,
                parents: parents.to_vec(),
                tree,
                message: message.to_string(),
                author,
                committer,
            }))
        });
        Ok(id)
    }

    /// Stores an annotated tag object. The target must already be present.
    pub fn insert_tag(
        &mut self,
        name: &str,
        target: Oid,
        message: &str,
        tagger: Option<Signature>,
    ) -> Result<Oid> {
        let kind = self
            .objects
            .get(&target)
            .map(Object::kind)
            .ok_or_else(|| AppError::Store(format!("tag target {} is missing", target)))?;

        let mut raw = format!("object {}\ntype {}\ntag {}\n", target, kind.str(), name);
        if let Some(tagger) = &tagger {
            raw.push_str(&format!("tagger {}\n", encode_signature(tagger)));
        }
        raw.push('\n');
        raw.push_str(message);

        let id = Oid::hash_object(ObjectType::Tag, raw.as_bytes())?;
        self.objects.entry(id).or_insert_with(|| {
            Object::Tag(Arc::new(Tag {
                id,
                name: name.to_string(),
                target,
                message: message.to_string(),
                tagger,
            }))
        });
        Ok(id)
    }

    /// Points a full reference name (`refs/heads/...`, `refs/tags/...`) at
    /// an object.
    pub fn set_ref(&mut self, name: &str, target: Oid) {
        self.refs.insert(name.to_string(), target);
    }

    fn reference(&self, name: &str, target: Oid) -> Option<Reference> {
        let kind = if name.starts_with(BRANCH_PREFIX) {
            RefKind::Branch
        } else if name.starts_with(TAG_PREFIX) {
            match self.objects.get(&target) {
                Some(Object::Tag(_)) => RefKind::AnnotatedTag,
                _ => RefKind::LightweightTag,
            }
        } else {
            return None;
        };

        Some(Reference {
            name: name.to_string(),
            kind,
            target,
        })
    }
}

fn sort_key(entry: &TreeEntry) -> String {
    if entry.mode.is_directory() {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    }
}

fn encode_signature(sig: &Signature) -> String {
    let sign = if sig.offset_minutes < 0 { '-' } else { '+' };
    let offset = sig.offset_minutes.abs();
    format!(
        "{} <{}> {} {}{:02}{:02}",
        sig.name,
        sig.email,
        sig.time,
        sign,
        offset / 60,
        offset % 60
    )
}

impl ObjectStore for MemoryStore {
    fn find_commit(&self, id: Oid) -> Result<Option<Arc<Commit>>> {
        Ok(match self.objects.get(&id) {
            Some(Object::Commit(commit)) => Some(Arc::clone(commit)),
            _ => None,
        })
    }

    fn find_tree(&self, id: Oid) -> Result<Option<Arc<Tree>>> {
        Ok(match self.objects.get(&id) {
            Some(Object::Tree(tree)) => Some(Arc::clone(tree)),
            _ => None,
        })
    }

    fn find_blob(&self, id: Oid) -> Result<Option<Blob>> {
        Ok(match self.objects.get(&id) {
            Some(Object::Blob(data)) => Some(Blob {
                id,
                data: data.as_ref().clone(),
            }),
            _ => None,
        })
    }

    fn find_tag(&self, id: Oid) -> Result<Option<Arc<Tag>>> {
        Ok(match self.objects.get(&id) {
            Some(Object::Tag(tag)) => Some(Arc::clone(tag)),
            _ => None,
        })
    }

    fn find_reference(&self, name: &str) -> Result<Option<Reference>> {
        Ok(self
            .refs
            .get(name)
            .and_then(|target| self.reference(name, *target)))
    }

    fn references(&self, prefix: &str) -> Result<Vec<Reference>> {
        Ok(self
            .refs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .filter_map(|(name, target)| self.reference(name, *target))
            .collect())
    }

    fn diff_trees(&self, old: Option<Oid>, new: Oid) -> Result<Vec<String>> {
        diff::changed_paths(self, old, new)
    }
}
