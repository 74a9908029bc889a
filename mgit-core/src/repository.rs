//! Repository facade: layout, init/open, staging, branches and history
//!
//! Layout on disk:
//! ```text
//! {root}/
//!   .mgit/
//!     HEAD                          `ref: refs/heads/<branch>`
//!     refs/heads/<branch>           commit id or empty
//!     objects/{hash[0..2]}/{hash[2..]}
//!     index                         `<hash> <path>` per staged entry
//!     sync-config.json              optional transport settings
//! ```
//! The root is always passed in explicitly; nothing here consults the
//! process working directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::index::IndexFile;
use crate::object::ObjectId;
use crate::refs::{self, RefStore};
use crate::storage::ObjectStore;

/// Name of the hidden repository directory
pub const REPO_DIR: &str = ".mgit";

/// Branch HEAD points at in a fresh repository
pub const DEFAULT_BRANCH: &str = "master";

/// Paths staged and skipped by [`Repository::add`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddSummary {
    pub staged: Vec<String>,
    pub skipped: Vec<String>,
}

/// Result of switching branches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Switched,
    BranchNotFound,
    WorkingTreeNotClean,
}

/// One commit in [`Repository::log`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: ObjectId,
    pub author: String,
    pub message: String,
    pub timestamp_millis: Option<i64>,
}

/// A working copy and its `.mgit` directory
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    repo_dir: PathBuf,
    objects: ObjectStore,
    refs: RefStore,
    index: IndexFile,
}

impl Repository {
    fn at(root: &Path) -> Self {
        let repo_dir = root.join(REPO_DIR);
        Self {
            root: root.to_path_buf(),
            objects: ObjectStore::new(repo_dir.join("objects")),
            refs: RefStore::new(&repo_dir),
            index: IndexFile::new(repo_dir.join("index")),
            repo_dir,
        }
    }

    /// Initialize a repository at `root`. Safe to call on an existing one.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let repo = Self::init_empty(root)?;
        if !repo.repo_dir.join("HEAD").exists() {
            repo.refs.set_current_branch(DEFAULT_BRANCH)?;
            tracing::info!("Initialized repository at {:?}", repo.root);
        }
        if !repo.refs.branch_exists(DEFAULT_BRANCH) {
            repo.refs.create_branch(DEFAULT_BRANCH, None)?;
        }
        Ok(repo)
    }

    /// Create the directory layout and an empty index, without HEAD or
    /// branches. Used as the landing site for a clone.
    pub fn init_empty(root: impl AsRef<Path>) -> Result<Self> {
        let repo = Self::at(root.as_ref());
        fs::create_dir_all(repo.objects.dir())?;
        fs::create_dir_all(repo.repo_dir.join("refs").join("heads"))?;
        if !repo.index.path().exists() {
            repo.index.write(&Default::default())?;
        }
        Ok(repo)
    }

    /// Open an existing repository
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let repo = Self::at(root.as_ref());
        if !repo.repo_dir.is_dir() {
            return Err(Error::NotARepository(repo.root));
        }
        Ok(repo)
    }

    /// True when `root` holds an initialized repository (one with a HEAD)
    pub fn is_repository(root: impl AsRef<Path>) -> bool {
        root.as_ref().join(REPO_DIR).join("HEAD").is_file()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The hidden `.mgit` directory
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    pub fn index(&self) -> &IndexFile {
        &self.index
    }

    pub fn sync_config(&self) -> Result<SyncConfig> {
        SyncConfig::load(&self.repo_dir)
    }

    /// Current branch name and its head
    pub fn current_head(&self) -> Result<(String, Option<ObjectId>)> {
        let branch = self.refs.current_branch()?;
        let head = self.refs.branch_head(&branch)?;
        Ok((branch, head))
    }

    // ==================== Staging ====================

    /// Stage files by root-relative path.
    ///
    /// Missing, directory, unreadable or out-of-tree paths are skipped and
    /// reported, not treated as errors. Object writes are not skippable.
    pub fn add<S: AsRef<str>>(&self, paths: &[S]) -> Result<AddSummary> {
        if paths.is_empty() {
            return Err(Error::EmptyPaths);
        }
        let mut index = self.index.read()?;
        let mut summary = AddSummary::default();

        for path in paths {
            let path = path.as_ref();
            let Some(key) = normalize_path(path) else {
                tracing::warn!("Skipping {:?}: not a path inside the working tree", path);
                summary.skipped.push(path.to_string());
                continue;
            };
            let Some(data) = self.read_worktree_file(&key) else {
                summary.skipped.push(path.to_string());
                continue;
            };
            let id = self.objects.write(&data)?;
            index.stage(key.clone(), id);
            summary.staged.push(key);
        }

        self.index.write(&index)?;
        Ok(summary)
    }

    fn read_worktree_file(&self, key: &str) -> Option<Vec<u8>> {
        let full = self.root.join(key);
        if !full.is_file() {
            tracing::warn!("Skipping {:?}: missing or not a regular file", key);
            return None;
        }
        match fs::read(&full) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", key, e);
                None
            }
        }
    }

    /// Hash every regular file under the root (except `.mgit`) without
    /// storing anything
    pub fn scan_working_tree(&self) -> Result<BTreeMap<String, ObjectId>> {
        let mut snapshot = BTreeMap::new();
        self.scan_dir(&self.root, "", &mut snapshot)?;
        Ok(snapshot)
    }

    fn scan_dir(
        &self,
        dir: &Path,
        prefix: &str,
        snapshot: &mut BTreeMap<String, ObjectId>,
    ) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let rel = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if prefix.is_empty() && name == REPO_DIR {
                    continue;
                }
                self.scan_dir(&entry.path(), &rel, snapshot)?;
            } else if file_type.is_file() {
                let data = fs::read(entry.path())?;
                snapshot.insert(rel, ObjectId::from_data(&data));
            }
        }
        Ok(())
    }

    // ==================== Branches ====================

    /// Create a branch at the current branch's head
    pub fn create_branch(&self, name: &str) -> Result<()> {
        refs::validate_branch_name(name)?;
        let (_, base) = self.current_head()?;
        self.refs.create_branch(name, base)
    }

    /// Branch names, sorted
    pub fn branches(&self) -> Result<Vec<String>> {
        self.refs.list_branches()
    }

    /// Point HEAD at another branch when nothing is staged or modified.
    ///
    /// Untracked files do not block a switch. The working tree and index
    /// are left as they are.
    pub fn checkout(&self, name: &str) -> Result<CheckoutOutcome> {
        if !self.refs.list_branches()?.iter().any(|b| b == name) {
            return Ok(CheckoutOutcome::BranchNotFound);
        }
        let status = self.status()?;
        if status.has_staged_changes() || status.has_unstaged_changes() {
            return Ok(CheckoutOutcome::WorkingTreeNotClean);
        }
        self.refs.set_current_branch(name)?;
        tracing::info!("Switched to branch {}", name);
        Ok(CheckoutOutcome::Switched)
    }

    // ==================== History ====================

    /// Commits of the current branch, newest first
    pub fn log(&self) -> Result<Vec<LogEntry>> {
        let (_, mut cursor) = self.current_head()?;
        let mut entries = Vec::new();
        while let Some(id) = cursor {
            let commit = self.objects.read_commit(&id)?;
            cursor = commit.parent;
            entries.push(LogEntry {
                id,
                author: commit.author,
                message: commit.message,
                timestamp_millis: commit.timestamp_millis,
            });
        }
        Ok(entries)
    }
}

/// `/`-separated relative path, or None if it escapes the root or names
/// the repository directory
fn normalize_path(path: &str) -> Option<String> {
    let unified = path.replace('\\', "/");
    if unified.contains('\n') {
        return None;
    }
    let mut parts = Vec::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() || parts[0] == REPO_DIR {
        return None;
    }
    Some(parts.join("/"))
}
