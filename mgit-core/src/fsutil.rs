//! Filesystem helpers shared by the object, ref and index stores

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace `target` atomically: write a sibling temp file, then rename over.
///
/// Readers observe either the old contents or the new, never a partial write.
pub(crate) fn write_atomic(target: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = parent_dir(target)?;
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target)?;
    Ok(())
}

/// Create `target` with `contents` unless it already exists.
///
/// Returns `Ok(false)` when another writer got there first.
pub(crate) fn write_new(staging_dir: &Path, target: &Path, contents: &[u8]) -> io::Result<bool> {
    fs::create_dir_all(parent_dir(target)?)?;
    let mut tmp = NamedTempFile::new_in(staging_dir)?;
    tmp.write_all(contents)?;
    match tmp.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

/// True when `dir` has no entries (a missing directory counts as empty)
pub fn is_dir_empty(dir: &Path) -> io::Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

fn parent_dir(path: &Path) -> io::Result<&Path> {
    path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )
    })
}
