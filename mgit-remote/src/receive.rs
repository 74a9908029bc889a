//! Accepting objects and ref updates into a repository that acts as a
//! remote. Shared by the filesystem transport and the HTTP server.

use mgit_core::{ObjectId, RefUpdate, Repository, validate_branch_name};

use crate::protocol::RefUpdateRequest;

#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("Object claimed {expected} but hashes to {actual}")]
    HashMismatch { expected: ObjectId, actual: ObjectId },

    #[error("New head {0} is not a stored commit")]
    UnknownCommit(ObjectId),

    #[error(transparent)]
    InvalidBranch(mgit_core::Error),

    #[error(transparent)]
    Store(#[from] mgit_core::Error),
}

/// Store `data` under `id` after checking that it hashes to `id`
pub fn receive_object(repo: &Repository, id: &ObjectId, data: &[u8]) -> Result<(), ReceiveError> {
    let actual = ObjectId::from_data(data);
    if actual != *id {
        tracing::warn!("Rejected object {}: content hashes to {}", id, actual);
        return Err(ReceiveError::HashMismatch {
            expected: *id,
            actual,
        });
    }
    repo.objects().write(data)?;
    Ok(())
}

/// Apply a compare-and-swap ref update once `new` is known to be a commit
pub fn receive_ref_update(
    repo: &Repository,
    update: &RefUpdateRequest,
) -> Result<RefUpdate, ReceiveError> {
    validate_branch_name(&update.branch).map_err(ReceiveError::InvalidBranch)?;

    match repo.objects().read_commit(&update.new) {
        Ok(_) => {}
        Err(e @ mgit_core::Error::Io(_)) => return Err(e.into()),
        Err(_) => return Err(ReceiveError::UnknownCommit(update.new)),
    }

    let outcome = repo
        .refs()
        .compare_and_swap(&update.branch, update.old, update.new)?;
    if outcome == RefUpdate::Updated {
        tracing::info!("Accepted update of {} to {}", update.branch, update.new);
    }
    Ok(outcome)
}
