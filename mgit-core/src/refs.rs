//! Branch refs and the symbolic HEAD
//!
//! Layout:
//! ```text
//! HEAD                 `ref: refs/heads/<branch>\n`
//! refs/heads/<branch>  commit id, or empty for a branch with no commits
//! ```
//! Ref files are replaced via write-temp-then-rename, so a reader never
//! sees a half-written pointer.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use crate::error::{Error, Result};
use crate::fsutil;
use crate::object::ObjectId;

const HEAD_FILE: &str = "HEAD";
const HEAD_REF_PREFIX: &str = "ref: refs/heads/";
const LOCK_SUFFIX: &str = ".lock";

/// How long a compare-and-swap waits for another holder of the lock file
const LOCK_TIMEOUT: Duration = Duration::from_secs(2);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);
/// A lock file untouched for this long is left over from a crashed writer
const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

/// Result of a compare-and-swap ref update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefUpdate {
    /// The stored head matched the expected value and now holds the new one
    Updated,
    /// The stored head moved underneath the caller; nothing was written
    Conflict { current: Option<ObjectId> },
}

/// Reject blank names, whitespace and path separators.
///
/// Names that would collide with store internals (leading `.`, a `.lock`
/// suffix) are rejected too.
pub fn validate_branch_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "name is blank"
    } else if name.chars().any(char::is_whitespace) {
        "name contains whitespace"
    } else if name.contains('/') || name.contains('\\') {
        "name contains a path separator"
    } else if name.starts_with('.') || name.ends_with(LOCK_SUFFIX) {
        "name is reserved"
    } else {
        return Ok(());
    };
    Err(Error::InvalidBranchName {
        name: name.to_string(),
        reason,
    })
}

/// Ref store rooted at a repository's hidden directory
#[derive(Debug)]
pub struct RefStore {
    repo_dir: PathBuf,
    /// Serialises compare-and-swap within this process; the lock file
    /// covers other processes.
    cas_lock: Mutex<()>,
}

impl RefStore {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            cas_lock: Mutex::new(()),
        }
    }

    fn head_path(&self) -> PathBuf {
        self.repo_dir.join(HEAD_FILE)
    }

    fn heads_dir(&self) -> PathBuf {
        self.repo_dir.join("refs").join("heads")
    }

    fn branch_path(&self, name: &str) -> PathBuf {
        self.heads_dir().join(name)
    }

    /// Resolve HEAD's symbolic target
    pub fn current_branch(&self) -> Result<String> {
        let content = match fs::read_to_string(self.head_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::HeadMissing),
            Err(e) => return Err(e.into()),
        };
        match content.trim().strip_prefix(HEAD_REF_PREFIX) {
            Some(branch) if !branch.is_empty() => Ok(branch.to_string()),
            _ => Err(Error::MalformedHead(content)),
        }
    }

    /// Point HEAD at `name`. No existence check.
    pub fn set_current_branch(&self, name: &str) -> Result<()> {
        let content = format!("{}{}\n", HEAD_REF_PREFIX, name);
        fsutil::write_atomic(&self.head_path(), content.as_bytes())?;
        Ok(())
    }

    /// Whether a ref file exists for `name`
    pub fn branch_exists(&self, name: &str) -> bool {
        self.branch_path(name).is_file()
    }

    /// Head commit of a branch.
    ///
    /// `None` covers both an existing branch with zero commits and an absent
    /// branch; [`RefStore::list_branches`] tells them apart.
    pub fn branch_head(&self, name: &str) -> Result<Option<ObjectId>> {
        let content = match fs::read_to_string(self.branch_path(name)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        ObjectId::from_hex(trimmed)
            .map(Some)
            .map_err(|_| Error::MalformedRef {
                name: name.to_string(),
                content,
            })
    }

    /// Unconditional local overwrite of a branch head
    pub fn update_branch_head(&self, name: &str, id: ObjectId) -> Result<()> {
        fsutil::write_atomic(&self.branch_path(name), id.to_hex().as_bytes())?;
        tracing::info!("Branch {} -> {}", name, id);
        Ok(())
    }

    /// Create a branch at `base` (empty when `None`)
    pub fn create_branch(&self, name: &str, base: Option<ObjectId>) -> Result<()> {
        let heads = self.heads_dir();
        fs::create_dir_all(&heads)?;
        let content = base.map(|id| id.to_hex()).unwrap_or_default();
        if !fsutil::write_new(&heads, &self.branch_path(name), content.as_bytes())? {
            return Err(Error::BranchAlreadyExists(name.to_string()));
        }
        tracing::info!("Created branch {} at {}", name, content);
        Ok(())
    }

    /// Branch names, sorted
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.heads_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name.ends_with(LOCK_SUFFIX) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Set `name` to `new` only if it still holds `expected`.
    ///
    /// Atomic with respect to other compare-and-swap callers on the same
    /// repository, in this process or another.
    pub fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<RefUpdate> {
        let _guard = self.cas_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = RefLock::acquire(&self.heads_dir(), name)?;

        let current = self.branch_head(name)?;
        if current != expected {
            tracing::warn!(
                "Rejected update of {}: expected {:?}, found {:?}",
                name,
                expected.map(|id| id.to_hex()),
                current.map(|id| id.to_hex())
            );
            return Ok(RefUpdate::Conflict { current });
        }
        self.update_branch_head(name, new)?;
        Ok(RefUpdate::Updated)
    }
}

/// Exclusive `<branch>.lock` file, removed on drop
struct RefLock {
    path: PathBuf,
}

impl RefLock {
    /// Create the lock file, polling until `LOCK_TIMEOUT` while another
    /// writer holds it. A lock older than `STALE_LOCK_AGE` is removed.
    fn acquire(heads_dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(heads_dir)?;
        let path = heads_dir.join(format!("{}{}", name, LOCK_SUFFIX));
        let start = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            if is_stale(&path) {
                tracing::warn!("Removing stale ref lock {:?}", path);
                match fs::remove_file(&path) {
                    Ok(()) => continue,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            if start.elapsed() >= LOCK_TIMEOUT {
                return Err(Error::RefLocked(name.to_string()));
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }
}

fn is_stale(path: &Path) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age >= STALE_LOCK_AGE)
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove ref lock {:?}: {}", self.path, e);
        }
    }
}
