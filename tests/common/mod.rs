//! On-disk repository fixtures for the HTTP tests.

use std::path::Path;

use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use tempfile::TempDir;

pub fn signature(time: i64) -> Signature<'static> {
    Signature::new("Test User", "test@example.com", &Time::new(time, 0)).unwrap()
}

pub fn init_repo(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("master");
    Repository::init_opts(path, &opts).unwrap()
}

/// Writes `files` into the work tree and commits them on HEAD at `time`.
pub fn commit(repo: &Repository, files: &[(&str, &[u8])], message: &str, time: i64) -> Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full = workdir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = signature(time);
    let parents: Vec<git2::Commit> = repo
        .head()
        .ok()
        .and_then(|h| h.peel_to_commit().ok())
        .into_iter()
        .collect();
    let parents: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// A repository whose `master` has `commits` commits; only the root changes
/// the tree, so attributing its files walks the whole history.
pub fn long_history(repo_dir: &Path, commits: i64) -> Oid {
    let repo = init_repo(repo_dir);
    let mut head = commit(&repo, &[("keep.txt", b"root\n".as_slice())], "root", 1);
    let tree = repo.find_commit(head).unwrap().tree().unwrap();
    for time in 2..=commits {
        let parent = repo.find_commit(head).unwrap();
        let sig = signature(time);
        head = repo
            .commit(None, &sig, &sig, "no change", &tree, &[&parent])
            .unwrap();
    }
    repo.reference("refs/heads/master", head, true, "long history")
        .unwrap();
    head
}

/// Deletes a loose object from the repository at `repo_dir`.
pub fn remove_object(repo_dir: &Path, id: Oid) {
    let hex = id.to_string();
    let path = repo_dir.join(".git/objects").join(&hex[..2]).join(&hex[2..]);
    std::fs::remove_file(path).unwrap();
}

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00];

/// A root directory holding:
/// - `proj/`: three commits on `master`, branch `dev`, tags `v1` (annotated)
///   and `light`
/// - `group/nested/`: a repository below a plain directory, with file names
///   that need percent-encoding
/// - `plain/`: a directory that is not a repository
pub struct Fixture {
    pub root: TempDir,
    pub c1: Oid,
    pub c2: Oid,
    pub c3: Oid,
}

impl Fixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();

        let repo = init_repo(&root.path().join("proj"));
        let c1 = commit(
            &repo,
            &[
                ("README.md", b"# Proj\n".as_slice()),
                ("src/main.rs", b"fn main() {}\n".as_slice()),
                ("docs/guide.md", b"Read me first\n".as_slice()),
            ],
            "Initial import\n\nSets up the project.",
            100,
        );
        let c2 = commit(&repo, &[("src/lib.rs", b"pub fn lib() {}\n".as_slice())], "Add library", 200);
        let c3 = commit(
            &repo,
            &[
                ("src/main.rs", b"fn main() { println!(\"hi\"); }\n".as_slice()),
                ("logo.png", PNG_BYTES),
            ],
            "Print a greeting",
            300,
        );

        repo.branch("dev", &repo.find_commit(c2).unwrap(), false).unwrap();
        let first = repo.find_object(c1, None).unwrap();
        repo.tag("v1", &first, &signature(400), "Release 1\n", false).unwrap();
        let second = repo.find_object(c2, None).unwrap();
        repo.tag_lightweight("light", &second, false).unwrap();

        let nested = init_repo(&root.path().join("group/nested"));
        commit(
            &nested,
            &[
                ("hello.txt", b"hello\n".as_slice()),
                ("hello world.txt", b"spaced out\n".as_slice()),
                ("caf\u{e9}.txt", b"menu\n".as_slice()),
            ],
            "Hello",
            100,
        );

        std::fs::create_dir_all(root.path().join("plain")).unwrap();

        Self { root, c1, c2, c3 }
    }
}
