//! Fast-forward merge and ancestry walk

use crate::error::Result;
use crate::object::ObjectId;
use crate::refs::validate_branch_name;
use crate::repository::Repository;
use crate::storage::ObjectStore;

/// Result of merging a branch into the current one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    AlreadyUpToDate,
    /// Current branch now points at `head`
    FastForward { head: ObjectId },
    /// Target is not a valid branch name, is absent or has no commits
    BranchNotFound,
    /// Histories diverged; nothing was changed
    NotFastForward,
}

/// True if `ancestor` is `descendant` or lies on its parent chain.
///
/// Reads one commit per step. History is acyclic by construction, so the
/// walk ends at a root commit.
pub fn is_ancestor(store: &ObjectStore, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool> {
    let mut cursor = Some(*descendant);
    while let Some(id) = cursor {
        if id == *ancestor {
            return Ok(true);
        }
        cursor = store.read_commit(&id)?.parent;
    }
    Ok(false)
}

impl Repository {
    /// Fast-forward the current branch to `target`'s head when possible
    pub fn merge(&self, target: &str) -> Result<MergeOutcome> {
        if validate_branch_name(target).is_err() || !self.refs().branch_exists(target) {
            return Ok(MergeOutcome::BranchNotFound);
        }
        let Some(target_head) = self.refs().branch_head(target)? else {
            return Ok(MergeOutcome::BranchNotFound);
        };

        let (branch, current) = self.current_head()?;
        let advance = match current {
            None => true,
            Some(current) if current == target_head => {
                return Ok(MergeOutcome::AlreadyUpToDate);
            }
            Some(current) => is_ancestor(self.objects(), &current, &target_head)?,
        };
        if !advance {
            tracing::info!("Merge of {} into {} is not a fast-forward", target, branch);
            return Ok(MergeOutcome::NotFastForward);
        }

        self.refs().update_branch_head(&branch, target_head)?;
        tracing::info!("Fast-forwarded {} to {}", branch, target_head);
        Ok(MergeOutcome::FastForward { head: target_head })
    }
}
