//! Directory reconciliation after a batch.
//!
//! Every regular file in the destination directory must be accounted for:
//! either it is the file an automatic artifact resolved to, or it satisfies a
//! manual artifact according to the [`ManualMatcher`]. Everything else is
//! stale and gets deleted.

mod matcher;

pub use matcher::{ExactStemMatcher, ManualMatcher, SubstringMatcher};

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::ArtifactDescriptor;

/// What reconciliation found and did
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    /// Files deleted from the destination, sorted by name
    pub stale_files: Vec<String>,
    /// Manual artifacts already present, in manifest order
    pub satisfied_manual_ids: Vec<String>,
    /// Manual artifacts still needing out-of-band action, in manifest order
    pub unresolved_manual_ids: Vec<String>,
}

impl ReconciliationResult {
    /// Whether every manual artifact is present
    pub fn all_manual_satisfied(&self) -> bool {
        self.unresolved_manual_ids.is_empty()
    }
}

/// Reconcile `destination_dir` against the expected contents
///
/// # Arguments
///
/// * `destination_dir` - Directory to reconcile; only its top level is listed
/// * `expected` - Artifact id to file name for automatic artifacts
/// * `manual` - Manual artifacts, in manifest order
/// * `matcher` - Decides which files satisfy which manual artifact
///
/// # Errors
///
/// Listing the directory or deleting a stale file fails with
/// [`Error::Filesystem`]. Files deleted before the failure stay deleted.
pub async fn reconcile(
    destination_dir: &Path,
    expected: &HashMap<String, String>,
    manual: &[ArtifactDescriptor],
    matcher: &dyn ManualMatcher,
) -> Result<ReconciliationResult> {
    let entries = list_files(destination_dir).await?;
    let expected_files: HashSet<&str> = expected.values().map(String::as_str).collect();

    let mut satisfied: HashSet<&str> = HashSet::new();
    let mut stale_files = Vec::new();

    for file_name in entries
        .iter()
        .filter(|name| !expected_files.contains(name.as_str()))
    {
        let mut matching = manual
            .iter()
            .filter(|artifact| matcher.matches(file_name, &artifact.id));

        if let Some(claimant) = matching.next() {
            let others: Vec<&str> = matching.map(|a| a.id.as_str()).collect();
            if !others.is_empty() {
                tracing::debug!(
                    file_name = %file_name,
                    claimed_by = %claimant.id,
                    also_matches = ?others,
                    "File matches several manual artifacts, first in manifest order wins"
                );
            }
            satisfied.insert(claimant.id.as_str());
            continue;
        }

        let path = destination_dir.join(file_name);
        tracing::info!(path = %path.display(), "Removing file not part of modpack");
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Error::filesystem(&path, e))?;
        stale_files.push(file_name.clone());
    }

    let (satisfied_manual_ids, unresolved_manual_ids): (Vec<_>, Vec<_>) = manual
        .iter()
        .map(|artifact| artifact.id.clone())
        .partition(|id| satisfied.contains(id.as_str()));

    tracing::info!(
        stale = stale_files.len(),
        satisfied_manual = satisfied_manual_ids.len(),
        unresolved_manual = unresolved_manual_ids.len(),
        "Reconciled destination directory"
    );

    Ok(ReconciliationResult {
        stale_files,
        satisfied_manual_ids,
        unresolved_manual_ids,
    })
}

/// Regular-file names directly inside `dir`, sorted
async fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::filesystem(dir, e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::filesystem(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::filesystem(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => {
                tracing::warn!(file_name = ?raw, "Skipping file with non UTF-8 name");
            }
        }
    }

    names.sort();
    Ok(names)
}
