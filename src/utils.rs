//! Filesystem helpers for the staging directory and final placement

use crate::error::{Error, Result};
use std::path::Path;

/// Create the staging directory, clearing files left behind by an earlier run
///
/// Leftovers are partial transfers and are never moved into the destination.
/// Subdirectories are left alone.
///
/// # Arguments
///
/// * `staging_dir` - Directory transfers are streamed into
///
/// # Returns
///
/// The number of leftover files removed.
pub async fn prepare_staging_dir(staging_dir: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(staging_dir)
        .await
        .map_err(|e| Error::filesystem(staging_dir, e))?;

    let mut entries = tokio::fs::read_dir(staging_dir)
        .await
        .map_err(|e| Error::filesystem(staging_dir, e))?;

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::filesystem(staging_dir, e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::filesystem(&path, e))?;
        if file_type.is_dir() {
            continue;
        }
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Error::filesystem(&path, e))?;
        tracing::debug!(path = %path.display(), "Removed leftover staged file");
        removed += 1;
    }

    Ok(removed)
}

/// Remove the staging directory and anything still in it
///
/// A directory that is already gone is not an error.
pub async fn remove_staging_dir(staging_dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(staging_dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::filesystem(staging_dir, e)),
    }
}

/// Move a fully-written staged file to its final path
///
/// A plain rename: staging and destination must share a filesystem, which
/// holds for the default layout where staging lives inside the destination.
/// An existing file at `target` is replaced.
pub async fn move_into_place(staged: &Path, target: &Path) -> Result<()> {
    tokio::fs::rename(staged, target)
        .await
        .map_err(|e| Error::filesystem(target, e))
}
