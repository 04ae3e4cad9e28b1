//! Source tree collection.
//!
//! Walks a source directory, keeps files whose extension matches, and reads
//! them concurrently. Any unreadable file fails the whole collection; no
//! partial source set is ever returned.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use ferry_core::SourceFile;

use crate::config::SyncOptions;
use crate::error::{io_err, join_err, SyncError};
use crate::walk::{walk_files, WalkOptions};

/// Collect every `*.{extension}` file below `root`, at any depth.
///
/// Returns `SyncError::NotFound` if `root` is missing,
/// `SyncError::NotADirectory` if it is not a directory. Results are sorted by
/// path, but callers should treat them as a set.
pub async fn collect_sources(
    root: &Path,
    extension: &str,
    options: &SyncOptions,
) -> Result<Vec<SourceFile>, SyncError> {
    let root = resolve_root(root).await?;

    let walk = WalkOptions {
        follow_links: true,
        max_concurrency: options.permits(),
    };
    let candidates: Vec<PathBuf> = walk_files(&root, walk)
        .await?
        .into_iter()
        .filter(|path| has_extension(path, extension))
        .collect();

    let semaphore = Arc::new(Semaphore::new(options.permits()));
    let mut reads = JoinSet::new();
    for path in candidates {
        let semaphore = semaphore.clone();
        reads.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|err| SyncError::Join(err.to_string()))?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| io_err(&path, e))?;
            Ok::<_, SyncError>(SourceFile { path, content })
        });
    }

    let mut sources = Vec::with_capacity(reads.len());
    while let Some(joined) = reads.join_next().await {
        sources.push(joined.map_err(join_err)??);
    }
    sources.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::info!(root = %root.display(), count = sources.len(), "collected sources");
    Ok(sources)
}

async fn resolve_root(root: &Path) -> Result<PathBuf, SyncError> {
    let meta = match tokio::fs::metadata(root).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(SyncError::NotFound {
                path: root.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(root, err)),
    };
    if !meta.is_dir() {
        return Err(SyncError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    tokio::fs::canonicalize(root)
        .await
        .map_err(|e| io_err(root, e))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    let extension = extension.trim_start_matches('.');
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == extension)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_is_exact_and_ignores_leading_dot() {
        assert!(has_extension(Path::new("/a/Main.fy"), "fy"));
        assert!(has_extension(Path::new("/a/Main.fy"), ".fy"));
        assert!(!has_extension(Path::new("/a/Main.fyi"), "fy"));
        assert!(!has_extension(Path::new("/a/fy"), "fy"));
        assert!(!has_extension(Path::new("/a/Main.FY.bak"), "fy"));
    }
}
