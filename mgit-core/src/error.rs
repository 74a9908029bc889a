//! Error types for mgit core operations

use std::path::PathBuf;

use crate::object::{ObjectId, ObjectKind};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the object store, ref store, index and engines
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Malformed {kind} object: {reason}")]
    MalformedObject { kind: ObjectKind, reason: String },

    #[error("Invalid object id: {0:?}")]
    InvalidObjectId(String),

    #[error("HEAD is missing")]
    HeadMissing,

    #[error("Malformed HEAD: {0:?}")]
    MalformedHead(String),

    #[error("Malformed ref {name}: {content:?}")]
    MalformedRef { name: String, content: String },

    #[error("Ref {0} is locked by another writer")]
    RefLocked(String),

    #[error("Branch already exists: {0}")]
    BranchAlreadyExists(String),

    #[error("Invalid branch name {name:?}: {reason}")]
    InvalidBranchName { name: String, reason: &'static str },

    #[error("Commit rejected: {0}")]
    CommitValidation(&'static str),

    #[error("Nothing to commit")]
    NothingToCommit,

    #[error("No paths given")]
    EmptyPaths,

    #[error("Malformed index at line {line}: {content:?}")]
    MalformedIndex { line: usize, content: String },

    #[error("Not an mgit repository: {0:?}")]
    NotARepository(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the recoverable "object absent" case that sync uses as a fetch trigger
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound(_))
    }

    pub(crate) fn malformed(kind: ObjectKind, reason: impl Into<String>) -> Self {
        Error::MalformedObject {
            kind,
            reason: reason.into(),
        }
    }
}
