//! Staging index: repository-relative path → staged blob id
//!
//! Stored as one `<hash> <path>` line per entry. The whole table is
//! read-modify-written on every add.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fsutil;
use crate::object::{ObjectId, Tree};

/// In-memory staging table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: BTreeMap<String, ObjectId>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `path` at `id`, replacing any previous entry
    pub fn stage(&mut self, path: impl Into<String>, id: ObjectId) -> Option<ObjectId> {
        self.entries.insert(path.into(), id)
    }

    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> &BTreeMap<String, ObjectId> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot the staged entries as a tree
    pub fn to_tree(&self) -> Tree {
        Tree::from(self.entries.clone())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for (path, id) in &self.entries {
            out.push_str(&id.to_hex());
            out.push(' ');
            out.push_str(path);
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Parse the on-disk form; blank lines are ignored
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(data);
        let mut entries = BTreeMap::new();
        for (n, line) in text.split_terminator('\n').enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || Error::MalformedIndex {
                line: n + 1,
                content: line.to_string(),
            };
            let (hash, path) = line.split_once(' ').ok_or_else(malformed)?;
            if path.is_empty() {
                return Err(malformed());
            }
            let id = ObjectId::from_hex(hash).map_err(|_| malformed())?;
            entries.insert(path.to_string(), id);
        }
        Ok(Self { entries })
    }
}

/// The `index` file of a repository
#[derive(Debug, Clone)]
pub struct IndexFile {
    path: PathBuf,
}

impl IndexFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index; a missing file is an empty index
    pub fn read(&self) -> Result<Index> {
        match fs::read(&self.path) {
            Ok(data) => Index::parse(&data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Index::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, index: &Index) -> Result<()> {
        fsutil::write_atomic(&self.path, &index.to_bytes())?;
        tracing::debug!("Wrote index with {} entries", index.len());
        Ok(())
    }
}
