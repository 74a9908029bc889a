//! mgit Core Library
//!
//! Core functionality for mgit including:
//! - Object model (blob, flat tree, linear commit) and its text codec
//! - Sharded content-addressed object store
//! - Branch refs, symbolic HEAD and compare-and-swap updates
//! - Staging index
//! - Commit, status and fast-forward merge over a repository root
//! - Sync configuration shared with the remote transports

pub mod config;
pub mod error;
pub mod index;
pub mod object;
pub mod refs;
pub mod repository;
pub mod storage;

mod commit;
mod fsutil;
mod merge;
mod status;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use fsutil::is_dir_empty;
pub use index::{Index, IndexFile};
pub use merge::{MergeOutcome, is_ancestor};
pub use object::{Commit, OBJECT_ID_HEX_LEN, ObjectId, ObjectKind, Tree};
pub use refs::{RefStore, RefUpdate, validate_branch_name};
pub use repository::{
    AddSummary, CheckoutOutcome, DEFAULT_BRANCH, LogEntry, REPO_DIR, Repository,
};
pub use status::{Snapshot, StatusReport};
