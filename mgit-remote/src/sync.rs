//! Push, pull and clone, written once against [`RemoteTransport`]
//!
//! Every multi-step operation moves objects first and touches a ref last,
//! so a failure part-way leaves at most orphaned objects behind.

use bytes::Bytes;
use std::path::Path;

use mgit_core::{Commit, ObjectId, RefUpdate, Repository, Tree, is_ancestor, validate_branch_name};

use crate::error::{Result, SyncError};
use crate::fs::FsTransport;
use crate::protocol::RefUpdateRequest;
use crate::transport::RemoteTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed {
        head: ObjectId,
        objects_uploaded: usize,
    },
    AlreadyUpToDate,
    /// The local branch has no commits to push
    LocalNoCommits,
    /// The remote head is not an ancestor of the local head
    RemoteRejectedNonFastForward,
    /// The remote head moved between listing refs and updating; pull first
    RefUpdateRejected { current: Option<ObjectId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Pulled {
        head: ObjectId,
        objects_fetched: usize,
    },
    AlreadyUpToDate,
    RemoteNoCommits,
    /// Local commits are not contained in the remote history
    NotFastForward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    Cloned {
        /// Branch HEAD points at in the new repository
        branch: String,
        head: Option<ObjectId>,
        objects_fetched: usize,
    },
    RemoteNotFound,
    TargetExistsNotEmpty,
    RemoteNoCommits,
}

/// A local repository paired with one remote
pub struct SyncProtocol<'a> {
    local: &'a Repository,
    remote: &'a dyn RemoteTransport,
    max_object_size: u64,
}

impl<'a> SyncProtocol<'a> {
    pub fn new(local: &'a Repository, remote: &'a dyn RemoteTransport) -> Result<Self> {
        let config = local.sync_config()?;
        Ok(Self {
            local,
            remote,
            max_object_size: config.max_object_size,
        })
    }

    /// Publish the local `branch` head to the remote.
    ///
    /// Uploads every local object the remote lacks, then asks the remote to
    /// move `branch` from the head we saw to ours.
    pub async fn push(&self, branch: &str) -> Result<PushOutcome> {
        validate_branch_name(branch)?;
        let Some(local_head) = self.local.refs().branch_head(branch)? else {
            return Ok(PushOutcome::LocalNoCommits);
        };

        let refs = self.remote.list_refs().await?;
        let remote_head = refs.branch_head(branch);
        if remote_head == Some(local_head) {
            return Ok(PushOutcome::AlreadyUpToDate);
        }
        if let Some(remote_head) = remote_head {
            if !is_ancestor(self.local.objects(), &remote_head, &local_head)? {
                tracing::info!(
                    "Push of {} to {} rejected: remote head {} is not an ancestor",
                    branch,
                    self.remote.endpoint(),
                    remote_head
                );
                return Ok(PushOutcome::RemoteRejectedNonFastForward);
            }
        }

        let remote_objects = self.remote.list_objects().await?;
        let mut objects_uploaded = 0;
        for id in self.local.objects().list()? {
            if remote_objects.contains(&id) {
                continue;
            }
            let data = self.local.objects().read(&id)?;
            self.check_size(&id, &data)?;
            self.remote.put_object(&id, data).await?;
            objects_uploaded += 1;
        }

        let update = RefUpdateRequest {
            branch: branch.to_string(),
            old: remote_head,
            new: local_head,
        };
        match self.remote.update_ref(&update).await? {
            RefUpdate::Updated => {
                tracing::info!(
                    "Pushed {} to {} ({} objects uploaded)",
                    local_head,
                    self.remote.endpoint(),
                    objects_uploaded
                );
                Ok(PushOutcome::Pushed {
                    head: local_head,
                    objects_uploaded,
                })
            }
            RefUpdate::Conflict { current } => {
                tracing::warn!(
                    "Remote {} moved {} concurrently; push rejected",
                    self.remote.endpoint(),
                    branch
                );
                Ok(PushOutcome::RefUpdateRejected { current })
            }
        }
    }

    /// Fast-forward the local `branch` to the remote head.
    ///
    /// Missing history is fetched and stored before the ancestry check, so
    /// the check runs on local objects only. A rejected pull leaves the
    /// fetched objects behind but never moves the ref.
    pub async fn pull(&self, branch: &str) -> Result<PullOutcome> {
        validate_branch_name(branch)?;
        let refs = self.remote.list_refs().await?;
        let Some(remote_head) = refs.branch_head(branch) else {
            return Ok(PullOutcome::RemoteNoCommits);
        };
        let local_head = self.local.refs().branch_head(branch)?;
        if local_head == Some(remote_head) {
            return Ok(PullOutcome::AlreadyUpToDate);
        }

        let objects_fetched = self.fetch_history(remote_head).await?;

        if let Some(local_head) = local_head {
            if !is_ancestor(self.local.objects(), &local_head, &remote_head)? {
                tracing::info!("Pull of {} is not a fast-forward", branch);
                return Ok(PullOutcome::NotFastForward);
            }
        }

        self.local.refs().update_branch_head(branch, remote_head)?;
        tracing::info!(
            "Pulled {} from {} ({} objects fetched)",
            remote_head,
            self.remote.endpoint(),
            objects_fetched
        );
        Ok(PullOutcome::Pulled {
            head: remote_head,
            objects_fetched,
        })
    }

    /// Fetch the commits reachable from `head` that are not stored locally,
    /// along with their trees and blobs.
    ///
    /// Stops at the first commit already present. Blobs are stored before
    /// their tree, and commits last, oldest first, so a stored commit
    /// always has its whole history beneath it.
    async fn fetch_history(&self, head: ObjectId) -> Result<usize> {
        let store = self.local.objects();
        let mut fetched = 0;
        let mut pending: Vec<Bytes> = Vec::new();

        let mut cursor = Some(head);
        while let Some(id) = cursor {
            if store.contains(&id) {
                break;
            }
            let data = self.fetch_verified(&id).await?;
            let commit = Commit::parse(&data)?;
            fetched += self.fetch_tree(&commit.tree).await?;
            cursor = commit.parent;
            pending.push(data);
        }

        for data in pending.iter().rev() {
            store.write(data)?;
            fetched += 1;
        }
        Ok(fetched)
    }

    async fn fetch_tree(&self, tree_id: &ObjectId) -> Result<usize> {
        let store = self.local.objects();
        let mut fetched = 0;
        let (tree, tree_data) = if store.contains(tree_id) {
            (store.read_tree(tree_id)?, None)
        } else {
            let data = self.fetch_verified(tree_id).await?;
            (Tree::parse(&data)?, Some(data))
        };

        for blob in tree.entries().values() {
            if store.contains(blob) {
                continue;
            }
            let data = self.fetch_verified(blob).await?;
            store.write(&data)?;
            fetched += 1;
        }
        if let Some(data) = tree_data {
            store.write(&data)?;
            fetched += 1;
        }
        Ok(fetched)
    }

    /// Download one object and check that it hashes to `id`
    async fn fetch_verified(&self, id: &ObjectId) -> Result<Bytes> {
        let data = self.remote.get_object(id).await?;
        self.check_size(id, &data)?;
        verify(id, &data)?;
        Ok(data)
    }

    fn check_size(&self, id: &ObjectId, data: &[u8]) -> Result<()> {
        let size = data.len() as u64;
        if size > self.max_object_size {
            return Err(SyncError::ObjectTooLarge {
                id: *id,
                size,
                limit: self.max_object_size,
            });
        }
        Ok(())
    }
}

fn verify(id: &ObjectId, data: &[u8]) -> Result<()> {
    let actual = ObjectId::from_data(data);
    if actual != *id {
        return Err(SyncError::IntegrityMismatch {
            expected: *id,
            actual,
        });
    }
    Ok(())
}

/// Clone any remote into `target`, which must be absent or empty.
///
/// Copies every remote object, then every branch ref, then HEAD. The
/// index starts empty and no working files are written.
pub async fn clone_repository(remote: &dyn RemoteTransport, target: &Path) -> Result<CloneOutcome> {
    if !is_empty_dir(target)? {
        return Ok(CloneOutcome::TargetExistsNotEmpty);
    }
    let refs = remote.list_refs().await?;
    let Some(branch) = refs.head.clone() else {
        return Ok(CloneOutcome::RemoteNoCommits);
    };
    if let Err(e) = validate_branch_name(&branch) {
        return Err(SyncError::protocol(format!(
            "remote HEAD names an invalid branch: {}",
            e
        )));
    }

    let repo = Repository::init_empty(target)?;
    let max_object_size = repo.sync_config()?.max_object_size;

    let mut objects_fetched = 0;
    let mut ids: Vec<_> = remote.list_objects().await?.into_iter().collect();
    ids.sort();
    for id in ids {
        let data = remote.get_object(&id).await?;
        if data.len() as u64 > max_object_size {
            return Err(SyncError::ObjectTooLarge {
                id,
                size: data.len() as u64,
                limit: max_object_size,
            });
        }
        verify(&id, &data)?;
        repo.objects().write(&data)?;
        objects_fetched += 1;
    }

    for (name, head) in &refs.branches {
        if let Err(e) = validate_branch_name(name) {
            tracing::warn!("Skipping remote branch {:?}: {}", name, e);
            continue;
        }
        match head {
            Some(id) => repo.refs().update_branch_head(name, *id)?,
            None => repo.refs().create_branch(name, None)?,
        }
    }
    repo.refs().set_current_branch(&branch)?;

    tracing::info!(
        "Cloned {} into {:?} ({} objects)",
        remote.endpoint(),
        target,
        objects_fetched
    );
    Ok(CloneOutcome::Cloned {
        head: refs.branch_head(&branch),
        branch,
        objects_fetched,
    })
}

/// Clone the repository at `remote_root` into `target`
pub async fn clone_filesystem(remote_root: &Path, target: &Path) -> Result<CloneOutcome> {
    if !remote_root.exists() {
        return Ok(CloneOutcome::RemoteNotFound);
    }
    if !is_empty_dir(target)? {
        return Ok(CloneOutcome::TargetExistsNotEmpty);
    }
    if !Repository::is_repository(remote_root) {
        return Ok(CloneOutcome::RemoteNoCommits);
    }
    let remote = FsTransport::attach(remote_root)?;
    clone_repository(&remote, target).await
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    mgit_core::is_dir_empty(path).map_err(|e| mgit_core::Error::from(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str) -> ObjectId {
        fs::write(repo.root().join(name), content).unwrap();
        repo.add(&[name]).unwrap();
        repo.commit(&format!("write {}", name), "alice").unwrap()
    }

    #[tokio::test]
    async fn test_push_without_commits() {
        let tmp = TempDir::new().unwrap();
        let local = Repository::init(tmp.path().join("local")).unwrap();
        let remote = FsTransport::open(tmp.path().join("remote")).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();
        assert_eq!(sync.push("master").await.unwrap(), PushOutcome::LocalNoCommits);
    }

    #[tokio::test]
    async fn test_push_then_up_to_date() {
        let tmp = TempDir::new().unwrap();
        let local = Repository::init(tmp.path().join("local")).unwrap();
        let head = commit_file(&local, "a.txt", "hello");
        let remote = FsTransport::open(tmp.path().join("remote")).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();

        // blob + tree + commit
        assert_eq!(
            sync.push("master").await.unwrap(),
            PushOutcome::Pushed {
                head,
                objects_uploaded: 3
            }
        );
        assert_eq!(
            remote.repository().refs().branch_head("master").unwrap(),
            Some(head)
        );
        assert_eq!(sync.push("master").await.unwrap(), PushOutcome::AlreadyUpToDate);
    }

    #[tokio::test]
    async fn test_push_uploads_nothing_remote_already_has() {
        let tmp = TempDir::new().unwrap();
        let local = Repository::init(tmp.path().join("local")).unwrap();
        let head = commit_file(&local, "a.txt", "hello");
        let remote = FsTransport::open(tmp.path().join("remote")).unwrap();

        // remote holds every object but its ref is still empty
        for id in local.objects().list().unwrap() {
            let data = local.objects().read(&id).unwrap();
            remote.repository().objects().write(&data).unwrap();
        }

        let sync = SyncProtocol::new(&local, &remote).unwrap();
        assert_eq!(
            sync.push("master").await.unwrap(),
            PushOutcome::Pushed {
                head,
                objects_uploaded: 0
            }
        );
    }

    #[tokio::test]
    async fn test_push_diverged_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let remote_repo = Repository::init(tmp.path().join("remote")).unwrap();
        let theirs = commit_file(&remote_repo, "r.txt", "remote");
        let local = Repository::init(tmp.path().join("local")).unwrap();
        commit_file(&local, "l.txt", "local");

        let remote = FsTransport::attach(tmp.path().join("remote")).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();
        assert_eq!(
            sync.push("master").await.unwrap(),
            PushOutcome::RemoteRejectedNonFastForward
        );
        assert_eq!(
            remote.repository().refs().branch_head("master").unwrap(),
            Some(theirs)
        );
    }

    #[tokio::test]
    async fn test_pull_fetches_missing_history() {
        let tmp = TempDir::new().unwrap();
        let remote_repo = Repository::init(tmp.path().join("remote")).unwrap();
        commit_file(&remote_repo, "a.txt", "one");
        let head = commit_file(&remote_repo, "b.txt", "two");

        let local = Repository::init(tmp.path().join("local")).unwrap();
        let remote = FsTransport::attach(tmp.path().join("remote")).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();

        // 2 blobs, 2 trees, 2 commits
        assert_eq!(
            sync.pull("master").await.unwrap(),
            PullOutcome::Pulled {
                head,
                objects_fetched: 6
            }
        );
        assert_eq!(local.refs().branch_head("master").unwrap(), Some(head));
        assert_eq!(local.log().unwrap().len(), 2);
        assert_eq!(sync.pull("master").await.unwrap(), PullOutcome::AlreadyUpToDate);
    }

    #[tokio::test]
    async fn test_pull_incremental_stops_at_known_commit() {
        let tmp = TempDir::new().unwrap();
        let remote_repo = Repository::init(tmp.path().join("remote")).unwrap();
        commit_file(&remote_repo, "a.txt", "one");
        let remote = FsTransport::attach(tmp.path().join("remote")).unwrap();
        let local = Repository::init(tmp.path().join("local")).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();
        sync.pull("master").await.unwrap();

        // index still stages a.txt, so the new tree holds a.txt and b.txt
        let head = commit_file(&remote_repo, "b.txt", "two");
        assert_eq!(
            sync.pull("master").await.unwrap(),
            PullOutcome::Pulled {
                head,
                objects_fetched: 3
            }
        );
    }

    #[tokio::test]
    async fn test_pull_diverged_leaves_ref() {
        let tmp = TempDir::new().unwrap();
        let remote_repo = Repository::init(tmp.path().join("remote")).unwrap();
        commit_file(&remote_repo, "r.txt", "remote");
        let local = Repository::init(tmp.path().join("local")).unwrap();
        let ours = commit_file(&local, "l.txt", "local");

        let remote = FsTransport::attach(tmp.path().join("remote")).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();
        assert_eq!(sync.pull("master").await.unwrap(), PullOutcome::NotFastForward);
        assert_eq!(local.refs().branch_head("master").unwrap(), Some(ours));
    }

    #[tokio::test]
    async fn test_pull_empty_remote() {
        let tmp = TempDir::new().unwrap();
        let local = Repository::init(tmp.path().join("local")).unwrap();
        let remote = FsTransport::open(tmp.path().join("remote")).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();
        assert_eq!(sync.pull("master").await.unwrap(), PullOutcome::RemoteNoCommits);
    }

    #[tokio::test]
    async fn test_clone_filesystem_preconditions() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");

        assert_eq!(
            clone_filesystem(&tmp.path().join("absent"), &target).await.unwrap(),
            CloneOutcome::RemoteNotFound
        );

        let plain = tmp.path().join("plain");
        fs::create_dir_all(&plain).unwrap();
        assert_eq!(
            clone_filesystem(&plain, &target).await.unwrap(),
            CloneOutcome::RemoteNoCommits
        );

        let remote = tmp.path().join("remote");
        Repository::init(&remote).unwrap();
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("occupied"), "x").unwrap();
        assert_eq!(
            clone_filesystem(&remote, &target).await.unwrap(),
            CloneOutcome::TargetExistsNotEmpty
        );
    }

    #[tokio::test]
    async fn test_clone_copies_refs_and_head() {
        let tmp = TempDir::new().unwrap();
        let remote_root = tmp.path().join("remote");
        let remote_repo = Repository::init(&remote_root).unwrap();
        let head = commit_file(&remote_repo, "a.txt", "hello");
        remote_repo.create_branch("dev").unwrap();
        remote_repo.refs().create_branch("empty", None).unwrap();
        remote_repo.refs().set_current_branch("dev").unwrap();

        let target = tmp.path().join("clone");
        let outcome = clone_filesystem(&remote_root, &target).await.unwrap();
        assert_eq!(
            outcome,
            CloneOutcome::Cloned {
                branch: "dev".into(),
                head: Some(head),
                objects_fetched: 3
            }
        );

        let clone = Repository::open(&target).unwrap();
        assert_eq!(clone.refs().current_branch().unwrap(), "dev");
        assert_eq!(
            clone.branches().unwrap(),
            vec!["dev".to_string(), "empty".to_string(), "master".to_string()]
        );
        assert_eq!(clone.refs().branch_head("empty").unwrap(), None);
        assert_eq!(clone.objects().list().unwrap(), remote_repo.objects().list().unwrap());
        assert!(clone.index().read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_integrity_mismatch_is_detected() {
        let tmp = TempDir::new().unwrap();
        let remote_root = tmp.path().join("remote");
        let remote_repo = Repository::init(&remote_root).unwrap();
        let head = commit_file(&remote_repo, "a.txt", "hello");

        // corrupt the blob on disk under its old name
        let blob = ObjectId::from_data(b"hello");
        fs::write(remote_repo.objects().object_path(&blob), "tampered").unwrap();

        let local = Repository::init(tmp.path().join("local")).unwrap();
        let remote = FsTransport::attach(&remote_root).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();
        let err = sync.pull("master").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::IntegrityMismatch { expected, .. } if expected == blob
        ));
        assert_eq!(local.refs().branch_head("master").unwrap(), None);
        assert!(!local.objects().contains(&head));
    }

    #[tokio::test]
    async fn test_oversized_object_is_refused() {
        let tmp = TempDir::new().unwrap();
        let local = Repository::init(tmp.path().join("local")).unwrap();
        commit_file(&local, "big.bin", &"x".repeat(64));
        mgit_core::SyncConfig {
            max_object_size: 16,
            ..Default::default()
        }
        .save(local.repo_dir())
        .unwrap();

        let remote = FsTransport::open(tmp.path().join("remote")).unwrap();
        let sync = SyncProtocol::new(&local, &remote).unwrap();
        assert!(matches!(
            sync.push("master").await,
            Err(SyncError::ObjectTooLarge { limit: 16, .. })
        ));
        assert_eq!(remote.repository().refs().branch_head("master").unwrap(), None);
    }
}
