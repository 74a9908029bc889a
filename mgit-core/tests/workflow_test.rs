//! End-to-end workflows against a repository on disk

use std::fs;

use mgit_core::{Commit, Error, ObjectId, Repository, Tree};
use tempfile::TempDir;

#[test]
fn test_commit_then_edit_then_restage() {
    let tmp = TempDir::new().unwrap();
    let repo = Repository::init(tmp.path()).unwrap();

    fs::write(tmp.path().join("a.txt"), "hello").unwrap();
    repo.add(&["a.txt"]).unwrap();
    let head = repo.commit_at("first", "alice", 1_700_000_000_000).unwrap();

    // master points at the hash of exactly the commit we expect to have built
    let tree: Tree = [("a.txt".to_string(), ObjectId::from_data(b"hello"))]
        .into_iter()
        .collect();
    let expected = Commit::new(tree.id(), None, "alice", "first", 1_700_000_000_000).unwrap();
    assert_eq!(head, expected.id());
    assert_eq!(repo.refs().branch_head("master").unwrap(), Some(head));
    assert!(repo.status().unwrap().is_clean());

    fs::write(tmp.path().join("a.txt"), "hello world").unwrap();
    let status = repo.status().unwrap();
    assert_eq!(status.modified_not_staged.iter().collect::<Vec<_>>(), vec!["a.txt"]);
    assert!(!status.has_staged_changes());
    assert!(status.untracked.is_empty());
    assert!(status.deleted_not_staged.is_empty());

    repo.add(&["a.txt"]).unwrap();
    let status = repo.status().unwrap();
    assert_eq!(status.staged_modified.iter().collect::<Vec<_>>(), vec!["a.txt"]);
    assert!(!status.has_unstaged_changes());
}

#[test]
fn test_index_survives_commit() {
    let tmp = TempDir::new().unwrap();
    let repo = Repository::init(tmp.path()).unwrap();

    fs::write(tmp.path().join("a.txt"), "one").unwrap();
    repo.add(&["a.txt"]).unwrap();
    let first = repo.commit("first", "alice").unwrap();

    let index = repo.index().read().unwrap();
    assert_eq!(index.get("a.txt"), Some(&ObjectId::from_data(b"one")));

    // a second commit without new adds snapshots the same staged tree
    let second = repo.commit("again", "alice").unwrap();
    let a = repo.objects().read_commit(&first).unwrap();
    let b = repo.objects().read_commit(&second).unwrap();
    assert_eq!(a.tree, b.tree);
    assert_eq!(b.parent, Some(first));
}

#[test]
fn test_rejected_commit_leaves_store_untouched() {
    let tmp = TempDir::new().unwrap();
    let repo = Repository::init(tmp.path()).unwrap();
    fs::write(tmp.path().join("a.txt"), "hello").unwrap();
    repo.add(&["a.txt"]).unwrap();
    let objects_before = repo.objects().list().unwrap().len();

    assert!(matches!(repo.commit(" ", "alice"), Err(Error::CommitValidation(_))));
    assert!(matches!(repo.commit("msg", "\t"), Err(Error::CommitValidation(_))));

    assert_eq!(repo.objects().list().unwrap().len(), objects_before);
    assert_eq!(repo.refs().branch_head("master").unwrap(), None);
}

#[test]
fn test_reopen_sees_history() {
    let tmp = TempDir::new().unwrap();
    let head = {
        let repo = Repository::init(tmp.path()).unwrap();
        fs::write(tmp.path().join("a.txt"), "persist").unwrap();
        repo.add(&["a.txt"]).unwrap();
        repo.commit("persisted", "alice").unwrap()
    };

    let repo = Repository::open(tmp.path()).unwrap();
    let log = repo.log().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, head);
    assert_eq!(log[0].message, "persisted");
    assert!(repo.status().unwrap().is_clean());
}

#[test]
fn test_stored_objects_hash_to_their_names() {
    let tmp = TempDir::new().unwrap();
    let repo = Repository::init(tmp.path()).unwrap();
    fs::create_dir_all(tmp.path().join("src")).unwrap();
    fs::write(tmp.path().join("src/main.rs"), "fn main() {}\n").unwrap();
    fs::write(tmp.path().join("README"), "readme").unwrap();
    repo.add(&["src/main.rs", "README"]).unwrap();
    repo.commit("multi\nline\n\nmessage", "alice").unwrap();

    for id in repo.objects().list().unwrap() {
        let data = repo.objects().read(&id).unwrap();
        assert_eq!(ObjectId::from_data(&data), id);
    }
    assert_eq!(repo.log().unwrap()[0].message, "multi\nline\n\nmessage");
}
