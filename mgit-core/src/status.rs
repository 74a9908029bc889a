//! Three-way status: HEAD tree vs index vs working tree

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::object::ObjectId;
use crate::repository::Repository;

/// Path → content id for one side of the comparison
pub type Snapshot = BTreeMap<String, ObjectId>;

/// Classified paths, each set sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// In the index, not in HEAD
    pub staged_added: BTreeSet<String>,
    /// In both, staged content differs from HEAD
    pub staged_modified: BTreeSet<String>,
    /// In HEAD, removed from the index
    pub staged_deleted: BTreeSet<String>,
    /// Working file differs from the staged content
    pub modified_not_staged: BTreeSet<String>,
    /// Staged but missing from the working tree
    pub deleted_not_staged: BTreeSet<String>,
    /// In the working tree, not in the index
    pub untracked: BTreeSet<String>,
}

impl StatusReport {
    /// Compare the three snapshots. Pure; touches no storage.
    pub fn compare(head: &Snapshot, index: &Snapshot, working: &Snapshot) -> Self {
        let mut report = Self::default();

        for (path, staged) in index {
            match head.get(path) {
                None => {
                    report.staged_added.insert(path.clone());
                }
                Some(committed) if committed != staged => {
                    report.staged_modified.insert(path.clone());
                }
                Some(_) => {}
            }
            match working.get(path) {
                None => {
                    report.deleted_not_staged.insert(path.clone());
                }
                Some(current) if current != staged => {
                    report.modified_not_staged.insert(path.clone());
                }
                Some(_) => {}
            }
        }

        report.staged_deleted = head
            .keys()
            .filter(|path| !index.contains_key(*path))
            .cloned()
            .collect();
        report.untracked = working
            .keys()
            .filter(|path| !index.contains_key(*path))
            .cloned()
            .collect();

        report
    }

    pub fn has_staged_changes(&self) -> bool {
        !(self.staged_added.is_empty()
            && self.staged_modified.is_empty()
            && self.staged_deleted.is_empty())
    }

    pub fn has_unstaged_changes(&self) -> bool {
        !(self.modified_not_staged.is_empty() && self.deleted_not_staged.is_empty())
    }

    /// No staged, unstaged or untracked paths
    pub fn is_clean(&self) -> bool {
        !self.has_staged_changes() && !self.has_unstaged_changes() && self.untracked.is_empty()
    }
}

impl Repository {
    /// Status against a fresh scan of the working tree
    pub fn status(&self) -> Result<StatusReport> {
        let working = self.scan_working_tree()?;
        self.status_with(&working)
    }

    /// Status against a caller-supplied working-tree snapshot.
    ///
    /// Only the HEAD commit and its tree are read from the object store.
    pub fn status_with(&self, working: &Snapshot) -> Result<StatusReport> {
        let index = self.index().read()?;
        let head = self.head_snapshot()?;
        Ok(StatusReport::compare(&head, index.entries(), working))
    }

    fn head_snapshot(&self) -> Result<Snapshot> {
        let (_, head) = self.current_head()?;
        let Some(head) = head else {
            return Ok(Snapshot::new());
        };
        let commit = self.objects().read_commit(&head)?;
        Ok(self.objects().read_tree(&commit.tree)?.entries().clone())
    }
}
