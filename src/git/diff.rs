//! Change detection between two trees.
//!
//! Walks both trees side by side and only descends into directories whose
//! ids differ, so subtrees shared between commits cost a single id
//! comparison. Reports leaf paths (files, symlinks, submodules).

use git2::Oid;
use std::collections::BTreeSet;

use crate::error::{AppError, Result};
use crate::git::store::{ObjectStore, Tree, TreeEntry};

/// Changed leaf paths between `old` (or the empty tree) and `new`.
pub fn changed_paths<S: ObjectStore + ?Sized>(
    store: &S,
    old: Option<Oid>,
    new: Oid,
) -> Result<Vec<String>> {
    if old == Some(new) {
        return Ok(Vec::new());
    }

    let new_tree = load_tree(store, new)?;
    let old_tree = match old {
        Some(id) => Some(load_tree(store, id)?),
        None => None,
    };

    let mut changes = Vec::new();
    diff_level(
        store,
        old_tree.as_deref(),
        Some(&new_tree),
        "",
        &mut changes,
    )?;
    Ok(changes)
}

fn diff_level<S: ObjectStore + ?Sized>(
    store: &S,
    old: Option<&Tree>,
    new: Option<&Tree>,
    prefix: &str,
    changes: &mut Vec<String>,
) -> Result<()> {
    let names: BTreeSet<&str> = old
        .into_iter()
        .chain(new)
        .flat_map(|t| t.entries.iter().map(|e| e.name.as_str()))
        .collect();

    for name in names {
        let before = old.and_then(|t| t.get(name));
        let after = new.and_then(|t| t.get(name));
        let path = join(prefix, name);

        match (before, after) {
            (Some(b), Some(a)) if b.id == a.id && b.mode == a.mode => {}
            (Some(b), Some(a)) if b.mode.is_directory() && a.mode.is_directory() => {
                let b = load_tree(store, b.id)?;
                let a = load_tree(store, a.id)?;
                diff_level(store, Some(&b), Some(&a), &path, changes)?;
            }
            (Some(b), Some(a)) if !b.mode.is_directory() && !a.mode.is_directory() => {
                changes.push(path);
            }
            (before, after) => {
                // Added, removed, or a file turned into a directory (or back)
                for entry in before.into_iter().chain(after) {
                    leaves(store, entry, &path, changes)?;
                }
            }
        }
    }

    Ok(())
}

/// Every leaf path at or below `entry`.
fn leaves<S: ObjectStore + ?Sized>(
    store: &S,
    entry: &TreeEntry,
    path: &str,
    out: &mut Vec<String>,
) -> Result<()> {
    if !entry.mode.is_directory() {
        out.push(path.to_string());
        return Ok(());
    }

    let tree = load_tree(store, entry.id)?;
    for child in &tree.entries {
        leaves(store, child, &join(path, &child.name), out)?;
    }
    Ok(())
}

fn load_tree<S: ObjectStore + ?Sized>(store: &S, id: Oid) -> Result<std::sync::Arc<Tree>> {
    store
        .find_tree(id)?
        .ok_or_else(|| AppError::Store(format!("missing tree {}", id)))
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
