//! Content-addressed object store
//!
//! Layout: `objects/{hash[0..2]}/{hash[2..]}`. Objects are written once and
//! never overwritten, so concurrent writers of identical content need no
//! locking: the second writer sees the file and returns the same id.

use bytes::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fsutil;
use crate::object::{Commit, OBJECT_ID_HEX_LEN, ObjectId, Tree};

/// Width of the shard directory name
const SHARD_PREFIX_LEN: usize = 2;

/// Filesystem object store rooted at an `objects/` directory
#[derive(Debug, Clone)]
pub struct ObjectStore {
    dir: PathBuf,
}

impl ObjectStore {
    /// Open a store rooted at `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The `objects/` directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location derived from the id: 2-hex shard + remainder
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.dir
            .join(&hex[..SHARD_PREFIX_LEN])
            .join(&hex[SHARD_PREFIX_LEN..])
    }

    /// Store `data` and return its id. Writing an existing object is a no-op.
    pub fn write(&self, data: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::from_data(data);
        let path = self.object_path(&id);
        if path.exists() {
            tracing::debug!("Object {} already stored", id);
            return Ok(id);
        }
        fs::create_dir_all(&self.dir)?;
        if fsutil::write_new(&self.dir, &path, data)? {
            tracing::debug!("Stored object {} ({} bytes)", id, data.len());
        }
        Ok(id)
    }

    /// Read raw object bytes; absent objects yield [`Error::ObjectNotFound`]
    pub fn read(&self, id: &ObjectId) -> Result<Bytes> {
        match fs::read(self.object_path(id)) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::ObjectNotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if object exists
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// All stored object ids, sorted
    pub fn list(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        let shards = match fs::read_dir(&self.dir) {
            Ok(shards) => shards,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        for shard in shards {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().into_owned();
            if prefix.len() != SHARD_PREFIX_LEN {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let name = format!("{}{}", prefix, entry.file_name().to_string_lossy());
                // in-flight temp files and strays are not objects
                if name.len() != OBJECT_ID_HEX_LEN {
                    continue;
                }
                if let Ok(id) = ObjectId::from_hex(&name) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Serialize and store a tree
    pub fn write_tree(&self, tree: &Tree) -> Result<ObjectId> {
        self.write(&tree.to_bytes())
    }

    /// Serialize and store a commit
    pub fn write_commit(&self, commit: &Commit) -> Result<ObjectId> {
        self.write(&commit.to_bytes())
    }

    /// Read and parse a tree object
    pub fn read_tree(&self, id: &ObjectId) -> Result<Tree> {
        Tree::parse(&self.read(id)?)
    }

    /// Read and parse a commit object
    pub fn read_commit(&self, id: &ObjectId) -> Result<Commit> {
        Commit::parse(&self.read(id)?)
    }
}
