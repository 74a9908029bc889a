//! Commit creation from the staging index

use chrono::Utc;

use crate::error::{Error, Result};
use crate::object::{Commit, ObjectId};
use crate::repository::Repository;

impl Repository {
    /// Record the staged index as a new commit on the current branch
    pub fn commit(&self, message: &str, author: &str) -> Result<ObjectId> {
        self.commit_at(message, author, Utc::now().timestamp_millis())
    }

    /// Commit with an explicit timestamp (Unix milliseconds).
    ///
    /// Nothing is written unless message and author are valid and the index
    /// is non-empty. Objects are stored before the branch ref moves. The
    /// index is kept, so the next status compares against the new commit.
    pub fn commit_at(&self, message: &str, author: &str, timestamp_millis: i64) -> Result<ObjectId> {
        Commit::validate(message, author)?;

        let index = self.index().read()?;
        if index.is_empty() {
            return Err(Error::NothingToCommit);
        }

        let (branch, parent) = self.current_head()?;
        let tree_id = self.objects().write_tree(&index.to_tree())?;
        let commit = Commit::new(tree_id, parent, author, message, timestamp_millis)?;
        let commit_id = self.objects().write_commit(&commit)?;
        self.refs().update_branch_head(&branch, commit_id)?;

        tracing::info!(
            "Committed {} on {} ({} entries)",
            commit_id,
            branch,
            index.len()
        );
        Ok(commit_id)
    }
}
