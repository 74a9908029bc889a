//! Core object model for mgit
//!
//! Blobs, trees and commits share one flat content-addressed namespace:
//! an object's id is the SHA-1 of its exact serialized bytes, and the type
//! is known from context rather than tagged in the payload. Tree and commit
//! encodings are plain line-oriented text and must re-serialize
//! byte-for-byte, since the id depends on it.

use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Length of an object id in raw bytes
pub const OBJECT_ID_LEN: usize = 20;

/// Length of an object id in hexadecimal
pub const OBJECT_ID_HEX_LEN: usize = OBJECT_ID_LEN * 2;

/// Unique identifier for any stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha1::digest(data);
        Self(hash.into())
    }

    /// Convert to lowercase hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hexadecimal string
    pub fn from_hex(hex_str: &str) -> std::result::Result<Self, hex::FromHexError> {
        let mut arr = [0u8; OBJECT_ID_LEN];
        hex::decode_to_slice(hex_str, &mut arr)?;
        Ok(Self(arr))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s).map_err(|_| Error::InvalidObjectId(s.to_string()))
    }
}

/// Object type discriminator, used for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        })
    }
}

/// Flat snapshot of tracked paths: repository-relative path → blob id
///
/// Not hierarchical. Entries iterate in path order, which fixes the
/// serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, ObjectId>,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the blob id recorded for a path
    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.entries.get(path)
    }

    /// All entries in path order
    pub fn entries(&self) -> &BTreeMap<String, ObjectId> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as one `blob <id> <path>` line per entry
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(self.entries.len() * (OBJECT_ID_HEX_LEN + 16));
        for (path, id) in &self.entries {
            out.push_str("blob ");
            out.push_str(&id.to_hex());
            out.push(' ');
            out.push_str(path);
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Parse the line format produced by [`Tree::to_bytes`]
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::malformed(ObjectKind::Tree, "not valid UTF-8"))?;
        let mut entries = BTreeMap::new();
        for line in text.split_terminator('\n') {
            let mut fields = line.splitn(3, ' ');
            let (Some("blob"), Some(id), Some(path)) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::malformed(
                    ObjectKind::Tree,
                    format!("expected `blob <id> <path>`, got {:?}", line),
                ));
            };
            if path.is_empty() {
                return Err(Error::malformed(ObjectKind::Tree, "empty path"));
            }
            let id = parse_id(ObjectKind::Tree, id)?;
            if entries.insert(path.to_string(), id).is_some() {
                return Err(Error::malformed(
                    ObjectKind::Tree,
                    format!("duplicate path {:?}", path),
                ));
            }
        }
        Ok(Self { entries })
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        ObjectId::from_data(&self.to_bytes())
    }
}

impl From<BTreeMap<String, ObjectId>> for Tree {
    fn from(entries: BTreeMap<String, ObjectId>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, ObjectId)> for Tree {
    fn from_iter<I: IntoIterator<Item = (String, ObjectId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Commit object: one node in a linear history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Tree object ID for this commit
    pub tree: ObjectId,
    /// Parent commit (None for a root commit)
    pub parent: Option<ObjectId>,
    /// Author name
    pub author: String,
    /// Commit message, stored verbatim
    pub message: String,
    /// Creation time in Unix milliseconds; None when a stored commit
    /// carries no readable date
    pub timestamp_millis: Option<i64>,
}

impl Commit {
    /// Create a new commit, rejecting a blank message or author
    pub fn new(
        tree: ObjectId,
        parent: Option<ObjectId>,
        author: impl Into<String>,
        message: impl Into<String>,
        timestamp_millis: i64,
    ) -> Result<Self> {
        let author = author.into();
        let message = message.into();
        Self::validate(&message, &author)?;
        Ok(Self {
            tree,
            parent,
            author,
            message,
            timestamp_millis: Some(timestamp_millis),
        })
    }

    /// Check message and author before anything is written
    pub fn validate(message: &str, author: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(Error::CommitValidation("message must not be blank"));
        }
        if author.trim().is_empty() {
            return Err(Error::CommitValidation("author must not be blank"));
        }
        // the author lives on a header line
        if author.contains('\n') {
            return Err(Error::CommitValidation("author must be a single line"));
        }
        Ok(())
    }

    /// Check if this is a root commit (no parent)
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Serialize: header lines, one blank line, then the message
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(128 + self.message.len());
        out.push_str("tree ");
        out.push_str(&self.tree.to_hex());
        out.push('\n');
        if let Some(parent) = &self.parent {
            out.push_str("parent ");
            out.push_str(&parent.to_hex());
            out.push('\n');
        }
        out.push_str("author ");
        out.push_str(&self.author);
        out.push('\n');
        if let Some(ts) = self.timestamp_millis {
            out.push_str("date ");
            out.push_str(&ts.to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.message);
        out.push('\n');
        out.into_bytes()
    }

    /// Parse the format produced by [`Commit::to_bytes`]
    ///
    /// `tree` and `author` are required. An unreadable `date` is treated as
    /// absent: this is a read of history, not a new write.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::malformed(ObjectKind::Commit, "not valid UTF-8"))?;
        let (header, body) = text
            .split_once("\n\n")
            .ok_or_else(|| Error::malformed(ObjectKind::Commit, "missing header terminator"))?;

        let mut tree = None;
        let mut parent = None;
        let mut author = None;
        let mut timestamp_millis = None;
        for line in header.split('\n') {
            let (key, value) = line.split_once(' ').unwrap_or((line, ""));
            match key {
                "tree" => tree = Some(parse_id(ObjectKind::Commit, value)?),
                "parent" => parent = Some(parse_id(ObjectKind::Commit, value)?),
                "author" => author = Some(value.to_string()),
                "date" => timestamp_millis = value.parse::<i64>().ok(),
                _ => {}
            }
        }

        let tree = tree.ok_or_else(|| Error::malformed(ObjectKind::Commit, "missing tree"))?;
        let author =
            author.ok_or_else(|| Error::malformed(ObjectKind::Commit, "missing author"))?;
        let message = body.strip_suffix('\n').unwrap_or(body).to_string();

        Ok(Self {
            tree,
            parent,
            author,
            message,
            timestamp_millis,
        })
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        ObjectId::from_data(&self.to_bytes())
    }
}

fn parse_id(kind: ObjectKind, value: &str) -> Result<ObjectId> {
    ObjectId::from_hex(value)
        .map_err(|_| Error::malformed(kind, format!("invalid object id {:?}", value)))
}
