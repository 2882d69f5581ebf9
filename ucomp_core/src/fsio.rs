//! File-system glue: input checks, staging files, atomic commit.
//!
//! Every output is first written to a [`NamedTempFile`] in the destination
//! directory and renamed over the final path only once it is complete, so a
//! half-written artifact is never visible under its final name. Dropping a
//! staging file on any exit path removes it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// Size of an existing regular file, or `InputNotFound`.
pub fn input_size(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(Error::InputNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::InputNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Directory that staging files for `output` should live in.
///
/// Staging beside the destination keeps the final rename on one file system.
pub fn staging_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Create an anonymous staging file in `dir`, removed when dropped.
pub fn staging_file(dir: &Path) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix(".ucomp-")
        .suffix(".part")
        .tempfile_in(dir)?;
    Ok(file)
}

/// Atomically move a finished staging file to `dest`, replacing any file there.
pub fn commit(staged: NamedTempFile, dest: &Path) -> Result<()> {
    staged.as_file().sync_all()?;
    staged.persist(dest).map_err(|e| Error::Io(e.error))?;
    debug!(path = %dest.display(), "committed output");
    Ok(())
}
