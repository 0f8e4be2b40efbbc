//! Last-commit attribution for many paths in a single history walk.
//!
//! `attribute` walks the ancestry of a start commit once in topological
//! order, diffing every commit against each of its parents, and resolves
//! each pattern at the first commit whose change set touches it. The walk stops as soon as every
//! pattern is resolved, so listing a directory of N entries costs one walk
//! instead of N.
//!
//! Used by: tree listings (last commit per entry), commit log.

use git2::Oid;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::git::store::{Commit, ObjectStore, TreeEntry};

/// A path or directory prefix tested against changed paths.
///
/// - `""` matches everything (the whole tree)
/// - `"dir/"` matches every path below `dir`, but not `"dirx"`
/// - anything else matches exactly one path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern(String);

impl PathPattern {
    pub fn whole_tree() -> Self {
        PathPattern(String::new())
    }

    pub fn file(path: &str) -> Self {
        PathPattern(normalize(path))
    }

    /// A directory prefix. The empty path is the whole tree.
    pub fn directory(path: &str) -> Self {
        let mut p = normalize(path);
        if !p.is_empty() {
            p.push('/');
        }
        PathPattern(p)
    }

    /// Pattern for an entry listed inside directory `dir`.
    pub fn for_entry(dir: &str, entry: &TreeEntry) -> Self {
        let path = join_path(dir, &entry.name);
        if entry.mode.is_directory() {
            Self::directory(&path)
        } else {
            Self::file(&path)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_prefix(&self) -> bool {
        self.0.is_empty() || self.0.ends_with('/')
    }

    pub fn matches(&self, changed: &str) -> bool {
        if self.is_prefix() {
            changed.starts_with(&self.0)
        } else {
            changed == self.0
        }
    }
}

/// Drops empty and `.` segments: `"/a//./b/"` becomes `"a/b"`.
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

pub fn join_path(dir: &str, name: &str) -> String {
    let dir = normalize(dir);
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

struct Pending {
    time: i64,
    seq: u64,
    commit: Arc<Commit>,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Max-heap over ready commits: newest committer time first, then
    // earliest discovered
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Lazy walk over every commit reachable from a start commit.
///
/// Each commit is yielded exactly once and never before any of its
/// descendants that are reachable from the start, whatever the timestamps
/// say. Among commits whose descendants have all been yielded, the newest
/// committer time goes first.
///
/// The first call to `next` counts, for every reachable commit, how many
/// reachable children it has; a commit becomes ready when that count drops
/// to zero. The counters cover the whole reachable history (one entry per
/// commit, released as commits are yielded), so memory is O(reachable
/// commits) even when the caller stops early. The iterator is fused after
/// the first error.
pub struct Ancestors<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    /// Held until the child counts have been computed
    start: Option<Arc<Commit>>,
    cancel: Option<CancellationToken>,
    children: HashMap<Oid, usize>,
    ready: BinaryHeap<Pending>,
    seq: u64,
    failed: bool,
}

impl<'s, S: ObjectStore + ?Sized> Ancestors<'s, S> {
    pub fn new(store: &'s S, start: Arc<Commit>) -> Self {
        Self {
            store,
            start: Some(start),
            cancel: None,
            children: HashMap::new(),
            ready: BinaryHeap::new(),
            seq: 0,
            failed: false,
        }
    }

    /// Stops the walk with `AppError::Cancelled` once `cancel` fires,
    /// including while child counts are being computed.
    pub fn with_cancel(mut self, cancel: &CancellationToken) -> Self {
        self.cancel = Some(cancel.clone());
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(cancel) if cancel.is_cancelled() => Err(AppError::Cancelled),
            _ => Ok(()),
        }
    }

    fn load_parent(&self, commit: &Commit, parent: Oid) -> Result<Arc<Commit>> {
        self.store.find_commit(parent)?.ok_or_else(|| {
            AppError::Store(format!("commit {} has missing parent {}", commit.id, parent))
        })
    }

    fn push(&mut self, commit: Arc<Commit>) {
        self.seq += 1;
        self.ready.push(Pending {
            time: commit.committer.time,
            seq: self.seq,
            commit,
        });
    }

    /// Counts reachable children of every commit reachable from `start`.
    fn count_children(&mut self, start: &Arc<Commit>) -> Result<()> {
        self.children.insert(start.id, 0);
        let mut stack = vec![Arc::clone(start)];

        while let Some(commit) = stack.pop() {
            self.check_cancelled()?;
            for &parent in &commit.parents {
                match self.children.entry(parent) {
                    Entry::Occupied(mut count) => *count.get_mut() += 1,
                    Entry::Vacant(slot) => {
                        slot.insert(1);
                        stack.push(self.load_parent(&commit, parent)?);
                    }
                }
            }
        }
        Ok(())
    }

    /// Marks `commit` as yielded; parents with no remaining children
    /// become ready.
    fn release_parents(&mut self, commit: &Commit) -> Result<()> {
        for &parent in &commit.parents {
            let Some(count) = self.children.get_mut(&parent) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                self.children.remove(&parent);
                let parent = self.load_parent(commit, parent)?;
                self.push(parent);
            }
        }
        Ok(())
    }

    fn fail(&mut self, e: AppError) -> Option<Result<Arc<Commit>>> {
        self.failed = true;
        self.ready.clear();
        self.children.clear();
        Some(Err(e))
    }
}

impl<S: ObjectStore + ?Sized> Iterator for Ancestors<'_, S> {
    type Item = Result<Arc<Commit>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(start) = self.start.take() {
            if let Err(e) = self.count_children(&start) {
                return self.fail(e);
            }
            self.children.remove(&start.id);
            self.push(start);
        }

        let Pending { commit, .. } = self.ready.pop()?;
        if let Err(e) = self.release_parents(&commit) {
            return self.fail(e);
        }
        Some(Ok(commit))
    }
}

/// Finds the most recent commit touching each pattern, walking history from
/// `start` once.
///
/// Returns one slot per pattern, in order. A slot stays `None` only when no
/// reachable commit ever touched the pattern (the path is absent from the
/// whole history); callers must not guess a replacement. A path counts as
/// changed in a merge if it differs from *any* parent.
///
/// Fails with `AppError::Cancelled` when `cancel` fires between commits, and
/// with the store's error if any lookup or diff fails. Partial results are
/// never returned.
pub fn attribute<S: ObjectStore + ?Sized>(
    store: &S,
    start: &Arc<Commit>,
    patterns: &[PathPattern],
    cancel: &CancellationToken,
) -> Result<Vec<Option<Arc<Commit>>>> {
    let mut last: Vec<Option<Arc<Commit>>> = vec![None; patterns.len()];
    let mut remaining = patterns.len();
    if remaining == 0 {
        return Ok(last);
    }

    let mut visited = 0usize;
    'walk: for commit in Ancestors::new(store, Arc::clone(start)).with_cancel(cancel) {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let commit = commit?;
        visited += 1;

        for changes in change_sets(store, &commit) {
            for path in changes? {
                for (slot, pattern) in last.iter_mut().zip(patterns) {
                    if slot.is_none() && pattern.matches(&path) {
                        *slot = Some(Arc::clone(&commit));
                        remaining -= 1;
                        if remaining == 0 {
                            break 'walk;
                        }
                    }
                }
            }
        }
    }

    tracing::debug!(
        start = %start.id,
        patterns = patterns.len(),
        unresolved = remaining,
        visited,
        "attribution walk finished"
    );

    Ok(last)
}

/// Lazily diffs `commit` against each parent (or the empty tree for a root
/// commit). A parent with an identical tree contributes nothing.
fn change_sets<'a, S: ObjectStore + ?Sized>(
    store: &'a S,
    commit: &'a Commit,
) -> Box<dyn Iterator<Item = Result<Vec<String>>> + 'a> {
    if commit.is_root() {
        return Box::new(std::iter::once_with(move || {
            store.diff_trees(None, commit.tree)
        }));
    }

    Box::new(commit.parents.iter().map(move |&parent_id| {
        let parent = store.find_commit(parent_id)?.ok_or_else(|| {
            AppError::Store(format!("commit {} has missing parent {}", commit.id, parent_id))
        })?;
        if parent.tree == commit.tree {
            return Ok(Vec::new());
        }
        store.diff_trees(Some(parent.tree), commit.tree)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::memory::MemoryStore;
    use crate::git::store::{Blob, Reference, Signature, Tag, Tree};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn sig(time: i64) -> Signature {
        Signature::new("Grace", "grace@example.com", time)
    }

    fn commit(store: &mut MemoryStore, files: &[(&str, &str)], parents: &[Oid], time: i64) -> Oid {
        let tree = store.insert_files(files).unwrap();
        store
            .insert_commit(tree, parents, &format!("commit at {}", time), sig(time), sig(time))
            .unwrap()
    }

    fn ids(results: &[Option<Arc<Commit>>]) -> Vec<Option<Oid>> {
        results.iter().map(|c| c.as_ref().map(|c| c.id)).collect()
    }

    /// Wraps a store and counts `diff_trees` calls.
    struct CountingStore {
        inner: MemoryStore,
        diffs: AtomicUsize,
    }

    impl ObjectStore for CountingStore {
        fn find_commit(&self, id: Oid) -> Result<Option<Arc<Commit>>> {
            self.inner.find_commit(id)
        }
        fn find_tree(&self, id: Oid) -> Result<Option<Arc<Tree>>> {
            self.inner.find_tree(id)
        }
        fn find_blob(&self, id: Oid) -> Result<Option<Blob>> {
            self.inner.find_blob(id)
        }
        fn find_tag(&self, id: Oid) -> Result<Option<Arc<Tag>>> {
            self.inner.find_tag(id)
        }
        fn find_reference(&self, name: &str) -> Result<Option<Reference>> {
            self.inner.find_reference(name)
        }
        fn references(&self, prefix: &str) -> Result<Vec<Reference>> {
            self.inner.references(prefix)
        }
        fn diff_trees(&self, old: Option<Oid>, new: Oid) -> Result<Vec<String>> {
            self.diffs.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.diff_trees(old, new)
        }
    }

    #[test]
    fn test_pattern_matching() {
        assert!(PathPattern::whole_tree().matches("anything/at/all"));
        assert!(PathPattern::directory("abc").matches("abc/x.txt"));
        assert!(!PathPattern::directory("abc").matches("abcd.txt"));
        assert!(PathPattern::file("abc").matches("abc"));
        assert!(!PathPattern::file("abc").matches("abc.txt"));
        assert!(!PathPattern::file("abc").matches("abc/x"));
        assert_eq!(PathPattern::directory("/a//./b/").as_str(), "a/b/");
        assert_eq!(PathPattern::directory("/"), PathPattern::whole_tree());
    }

    #[test]
    fn test_root_commit_owns_the_whole_tree() {
        let mut store = MemoryStore::new();
        let root = commit(&mut store, &[("a.txt", "a"), ("d/b.txt", "b")], &[], 1);
        let root = store.find_commit(root).unwrap().unwrap();

        let result = attribute(
            &store,
            &root,
            &[PathPattern::whole_tree()],
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(ids(&result), vec![Some(root.id)]);
    }

    #[test]
    fn test_last_touch_per_pattern() {
        let mut store = MemoryStore::new();
        let c1 = commit(&mut store, &[("dir/a.txt", "a1")], &[], 1);
        let c2 = commit(&mut store, &[("dir/a.txt", "a1"), ("dir/b.txt", "b")], &[c1], 2);
        let c3 = commit(&mut store, &[("dir/a.txt", "a2"), ("dir/b.txt", "b")], &[c2], 3);
        let head = store.find_commit(c3).unwrap().unwrap();

        let patterns = [
            PathPattern::file("dir/a.txt"),
            PathPattern::directory("dir"),
            PathPattern::file("dir/b.txt"),
        ];
        let result = attribute(&store, &head, &patterns, &CancellationToken::new()).unwrap();
        assert_eq!(ids(&result), vec![Some(c3), Some(c3), Some(c2)]);
    }

    #[test]
    fn test_prefix_does_not_match_sibling_with_common_prefix() {
        let mut store = MemoryStore::new();
        let c1 = commit(&mut store, &[("abc/x", "1"), ("abcd.txt", "1")], &[], 1);
        let c2 = commit(&mut store, &[("abc/x", "1"), ("abcd.txt", "2")], &[c1], 2);
        let head = store.find_commit(c2).unwrap().unwrap();

        let result = attribute(
            &store,
            &head,
            &[PathPattern::directory("abc"), PathPattern::file("abcd.txt")],
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(ids(&result), vec![Some(c1), Some(c2)]);
    }

    #[test]
    fn test_deleted_paths_count_as_changes_to_their_directory() {
        let mut store = MemoryStore::new();
        let c1 = commit(&mut store, &[("dir/a", "1"), ("dir/b", "1"), ("top", "t")], &[], 1);
        let c2 = commit(&mut store, &[("dir/a", "1"), ("top", "t")], &[c1], 2);
        let head = store.find_commit(c2).unwrap().unwrap();

        let result = attribute(
            &store,
            &head,
            &[PathPattern::directory("dir"), PathPattern::file("dir/a")],
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(ids(&result), vec![Some(c2), Some(c1)]);
    }

    #[test]
    fn test_nested_pattern_is_never_newer_than_enclosing_one() {
        let mut store = MemoryStore::new();
        let mut parent = commit(&mut store, &[("src/a/x", "0"), ("src/b", "0"), ("z", "0")], &[], 1);
        // (src/a/x, src/b, z) contents after each commit
        let edits = [("1", "0", "0"), ("1", "1", "0"), ("1", "1", "1"), ("2", "1", "1")];
        for (time, &(x, b, z)) in edits.iter().enumerate() {
            parent = commit(
                &mut store,
                &[("src/a/x", x), ("src/b", b), ("z", z)],
                &[parent],
                time as i64 + 2,
            );
        }
        let head = store.find_commit(parent).unwrap().unwrap();

        let patterns = [
            PathPattern::directory("src"),
            PathPattern::directory("src/a"),
            PathPattern::file("src/a/x"),
            PathPattern::file("src/b"),
        ];
        let result = attribute(&store, &head, &patterns, &CancellationToken::new()).unwrap();
        let time = |i: usize| result[i].as_ref().unwrap().committer.time;

        assert!(time(0) >= time(1));
        assert!(time(1) >= time(2));
        assert!(time(0) >= time(3));
    }

    #[test]
    fn test_merge_is_credited_when_any_parent_differs() {
        let mut store = MemoryStore::new();
        let base = commit(&mut store, &[("main.txt", "0"), ("side.txt", "0")], &[], 1);
        let side = commit(&mut store, &[("main.txt", "0"), ("side.txt", "1")], &[base], 2);
        let main = commit(&mut store, &[("main.txt", "1"), ("side.txt", "0")], &[base], 3);
        let merge = commit(&mut store, &[("main.txt", "1"), ("side.txt", "1")], &[main, side], 4);
        let head = store.find_commit(merge).unwrap().unwrap();

        let result = attribute(
            &store,
            &head,
            &[PathPattern::file("main.txt"), PathPattern::file("side.txt")],
            &CancellationToken::new(),
        )
        .unwrap();
        // Both paths differ from one of the merge's parents
        assert_eq!(ids(&result), vec![Some(merge), Some(merge)]);
    }

    #[test]
    fn test_absent_path_stays_unresolved() {
        let mut store = MemoryStore::new();
        let c1 = commit(&mut store, &[("a", "1")], &[], 1);
        let c2 = commit(&mut store, &[("a", "2")], &[c1], 2);
        let head = store.find_commit(c2).unwrap().unwrap();

        let result = attribute(
            &store,
            &head,
            &[PathPattern::file("a"), PathPattern::file("never-existed")],
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(ids(&result), vec![Some(c2), None]);
    }

    #[test]
    fn test_no_patterns_does_not_walk() {
        let mut store = MemoryStore::new();
        let c1 = commit(&mut store, &[("a", "1")], &[], 1);
        let head = store.find_commit(c1).unwrap().unwrap();
        let counting = CountingStore {
            inner: store,
            diffs: AtomicUsize::new(0),
        };

        let result = attribute(&counting, &head, &[], &CancellationToken::new()).unwrap();
        assert!(result.is_empty());
        assert_eq!(counting.diffs.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_single_walk_over_long_linear_history() {
        const COMMITS: usize = 10_000;

        let mut store = MemoryStore::new();
        let mut parent = commit(&mut store, &[("keep.txt", "root"), ("counter", "0")], &[], 0);
        for i in 1..COMMITS {
            let counter = i.to_string();
            parent = commit(
                &mut store,
                &[("keep.txt", "root"), ("counter", counter.as_str())],
                &[parent],
                i as i64,
            );
        }
        let head = store.find_commit(parent).unwrap().unwrap();
        let root_id = Ancestors::new(&store, Arc::clone(&head))
            .last()
            .unwrap()
            .unwrap()
            .id;

        let counting = CountingStore {
            inner: store,
            diffs: AtomicUsize::new(0),
        };

        let one = attribute(
            &counting,
            &head,
            &[PathPattern::file("keep.txt")],
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(ids(&one), vec![Some(root_id)]);
        // One diff per non-root commit against its single parent, plus the root
        assert_eq!(counting.diffs.load(AtomicOrdering::SeqCst), COMMITS);

        counting.diffs.store(0, AtomicOrdering::SeqCst);
        let many = attribute(
            &counting,
            &head,
            &[
                PathPattern::file("keep.txt"),
                PathPattern::file("missing"),
                PathPattern::directory("nested"),
            ],
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(ids(&many), vec![Some(root_id), None, None]);
        assert_eq!(counting.diffs.load(AtomicOrdering::SeqCst), COMMITS);
    }

    #[test]
    fn test_walk_stops_once_everything_is_resolved() {
        let mut store = MemoryStore::new();
        let mut parent = commit(&mut store, &[("f", "0")], &[], 0);
        for i in 1..50 {
            let content = i.to_string();
            parent = commit(&mut store, &[("f", content.as_str())], &[parent], i);
        }
        let head = store.find_commit(parent).unwrap().unwrap();
        let counting = CountingStore {
            inner: store,
            diffs: AtomicUsize::new(0),
        };

        let result = attribute(
            &counting,
            &head,
            &[PathPattern::file("f"), PathPattern::whole_tree()],
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(ids(&result), vec![Some(head.id), Some(head.id)]);
        assert_eq!(counting.diffs.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_walk_returns_no_results() {
        let mut store = MemoryStore::new();
        let c1 = commit(&mut store, &[("a", "1")], &[], 1);
        let head = store.find_commit(c1).unwrap().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = attribute(&store, &head, &[PathPattern::file("a")], &cancel).unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }

    #[test]
    fn test_ancestors_visit_each_commit_once() {
        let mut store = MemoryStore::new();
        let base = commit(&mut store, &[("a", "0")], &[], 1);
        let left = commit(&mut store, &[("a", "1")], &[base], 2);
        let right = commit(&mut store, &[("a", "2")], &[base], 3);
        let merge = commit(&mut store, &[("a", "3")], &[left, right], 4);
        let head = store.find_commit(merge).unwrap().unwrap();

        let order: Vec<Oid> = Ancestors::new(&store, head)
            .map(|c| c.unwrap().id)
            .collect();
        assert_eq!(order, vec![merge, right, left, base]);
    }

    #[test]
    fn test_ancestor_waits_for_descendants_despite_clock_skew() {
        let mut store = MemoryStore::new();
        let base = commit(&mut store, &[("f", "0")], &[], 1);
        // Committed with a clock far ahead of everything after it
        let ahead = commit(&mut store, &[("f", "1")], &[base], 100);
        let middle = commit(&mut store, &[("f", "2")], &[ahead], 5);
        let back = commit(&mut store, &[("f", "1")], &[middle], 6);
        // Same tree as both parents, so the merge itself changes nothing
        let merge = commit(&mut store, &[("f", "1")], &[back, ahead], 10);
        let head = store.find_commit(merge).unwrap().unwrap();

        let order: Vec<Oid> = Ancestors::new(&store, Arc::clone(&head))
            .map(|c| c.unwrap().id)
            .collect();
        assert_eq!(order, vec![merge, back, middle, ahead, base]);

        let result = attribute(&store, &head, &[PathPattern::file("f")], &CancellationToken::new()).unwrap();
        assert_eq!(ids(&result), vec![Some(back)]);
    }

    #[test]
    fn test_cancelled_walk_stops_while_counting() {
        let mut store = MemoryStore::new();
        let c1 = commit(&mut store, &[("a", "1")], &[], 1);
        let c2 = commit(&mut store, &[("a", "2")], &[c1], 2);
        let head = store.find_commit(c2).unwrap().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut walk = Ancestors::new(&store, head).with_cancel(&cancel);
        assert!(matches!(walk.next(), Some(Err(AppError::Cancelled))));
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_missing_parent_is_a_store_error() {
        let mut store = MemoryStore::new();
        let tree = store.insert_files(&[("a", "1")]).unwrap();
        let ghost = Oid::hash_object(git2::ObjectType::Commit, b"ghost").unwrap();
        let orphan = store.insert_commit(tree, &[ghost], "orphan", sig(1), sig(1)).unwrap();
        let head = store.find_commit(orphan).unwrap().unwrap();

        let err = attribute(
            &store,
            &head,
            &[PathPattern::file("never")],
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(err.is_store_error());
    }
}
