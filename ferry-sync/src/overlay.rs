//! Static scaffold overlay.
//!
//! Copies a target's scaffold tree on top of the output root after
//! reconciliation, overwriting same-named files. [`destinations`] lists where
//! a scaffold will land so reconciliation can leave those files alone. Files
//! overlaid by an earlier run for a different target are not part of that
//! list and are removed as stale.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::SyncOptions;
use crate::error::{io_err, join_err, SyncError};
use crate::walk::{walk_files, WalkOptions};

/// Output paths `scaffold` would be copied to, sorted. Empty when the
/// scaffold is absent.
pub async fn destinations(
    scaffold: &Path,
    output_root: &Path,
    options: &SyncOptions,
) -> Result<Vec<PathBuf>, SyncError> {
    Ok(scaffold_pairs(scaffold, output_root, options)
        .await?
        .into_iter()
        .map(|(_, dest)| dest)
        .collect())
}

/// Copy every file under `scaffold` into `output_root`, preserving relative
/// paths and creating directories as needed.
///
/// Returns the destination paths written, sorted. An absent `scaffold` is a
/// no-op.
pub async fn apply_overlay(
    scaffold: &Path,
    output_root: &Path,
    options: &SyncOptions,
) -> Result<Vec<PathBuf>, SyncError> {
    let pairs = scaffold_pairs(scaffold, output_root, options).await?;
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let semaphore = Arc::new(Semaphore::new(options.permits()));
    let mut copies = JoinSet::new();
    for (source, dest) in pairs {
        let semaphore = semaphore.clone();
        copies.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|err| SyncError::Join(err.to_string()))?;
            copy_file(&source, &dest).await?;
            Ok::<_, SyncError>(dest)
        });
    }

    let mut written = Vec::with_capacity(copies.len());
    while let Some(joined) = copies.join_next().await {
        written.push(joined.map_err(join_err)??);
    }
    written.sort();

    tracing::info!(
        scaffold = %scaffold.display(),
        count = written.len(),
        "scaffold overlay applied",
    );
    Ok(written)
}

/// `(source, destination)` for every scaffold file, sorted by destination.
async fn scaffold_pairs(
    scaffold: &Path,
    output_root: &Path,
    options: &SyncOptions,
) -> Result<Vec<(PathBuf, PathBuf)>, SyncError> {
    match tokio::fs::metadata(scaffold).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(SyncError::NotADirectory {
                path: scaffold.to_path_buf(),
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(scaffold = %scaffold.display(), "no scaffold tree, overlay skipped");
            return Ok(Vec::new());
        }
        Err(err) => return Err(io_err(scaffold, err)),
    }

    let walk = WalkOptions {
        follow_links: true,
        max_concurrency: options.permits(),
    };
    let pairs = walk_files(scaffold, walk)
        .await?
        .into_iter()
        .filter_map(|source| {
            // Walked paths always extend the scaffold root.
            let dest = output_root.join(source.strip_prefix(scaffold).ok()?);
            Some((source, dest))
        })
        .collect();
    Ok(pairs)
}

async fn copy_file(source: &Path, dest: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    tokio::fs::copy(source, dest)
        .await
        .map_err(|e| io_err(dest, e))?;
    tracing::debug!(from = %source.display(), to = %dest.display(), "overlaid");
    Ok(())
}
