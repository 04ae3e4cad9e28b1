//! Structured concurrent directory walk.
//!
//! The tree is walked one level at a time. Every directory in the current
//! level is listed by its own task in a [`JoinSet`], at most
//! `max_concurrency` listings in flight, and all results flow back to a single
//! aggregation loop. The first failure drops the set, which aborts every
//! listing still outstanding.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{io_err, join_err, SyncError};

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Descend into symlinked directories and report symlinked files.
    /// Directories are deduplicated by canonical path, so link cycles end.
    /// When `false`, every symlink is reported as a leaf and never followed.
    pub follow_links: bool,
    pub max_concurrency: usize,
}

#[derive(Default)]
struct Listing {
    files: Vec<PathBuf>,
    /// Subdirectories, with their canonical path when links are followed.
    dirs: Vec<(PathBuf, Option<PathBuf>)>,
}

/// Every non-directory entry below `root`, at any depth, sorted by path.
///
/// `root` must be an existing directory.
pub async fn walk_files(root: &Path, options: WalkOptions) -> Result<Vec<PathBuf>, SyncError> {
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let mut visited = HashSet::new();
    if options.follow_links {
        visited.insert(canonical(root).await?);
    }

    let mut files = Vec::new();
    let mut frontier = vec![root.to_path_buf()];
    let mut depth = 0usize;

    while !frontier.is_empty() {
        let mut tasks = JoinSet::new();
        for dir in frontier.drain(..) {
            let semaphore = semaphore.clone();
            let follow_links = options.follow_links;
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| SyncError::Join(err.to_string()))?;
                list_dir(dir, follow_links).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let listing = joined.map_err(join_err)??;
            files.extend(listing.files);
            for (dir, key) in listing.dirs {
                let unseen = match key {
                    Some(key) => visited.insert(key),
                    None => true,
                };
                if unseen {
                    frontier.push(dir);
                } else {
                    tracing::debug!(path = %dir.display(), "directory already walked, skipping");
                }
            }
        }
        depth += 1;
    }

    tracing::debug!(root = %root.display(), files = files.len(), depth, "walk complete");
    files.sort();
    Ok(files)
}

async fn list_dir(dir: PathBuf, follow_links: bool) -> Result<Listing, SyncError> {
    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .map_err(|e| io_err(&dir, e))?;
    let mut listing = Listing::default();

    while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;

        if file_type.is_dir() {
            let key = if follow_links {
                Some(canonical(&path).await?)
            } else {
                None
            };
            listing.dirs.push((path, key));
        } else if file_type.is_symlink() && follow_links {
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => {
                    let key = canonical(&path).await?;
                    listing.dirs.push((path, Some(key)));
                }
                Ok(_) => listing.files.push(path),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "skipping dangling symlink");
                }
                Err(err) => return Err(io_err(&path, err)),
            }
        } else {
            listing.files.push(path);
        }
    }

    Ok(listing)
}

async fn canonical(path: &Path) -> Result<PathBuf, SyncError> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const NO_FOLLOW: WalkOptions = WalkOptions {
        follow_links: false,
        max_concurrency: 4,
    };

    #[tokio::test]
    async fn finds_files_at_every_depth() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("empty/nested")).unwrap();
        fs::write(root.join("top.txt"), "").unwrap();
        fs::write(root.join("a/one.txt"), "").unwrap();
        fs::write(root.join("a/b/c/deep.txt"), "").unwrap();

        let files = walk_files(root, NO_FOLLOW).await.unwrap();
        assert_eq!(
            files,
            vec![
                root.join("a/b/c/deep.txt"),
                root.join("a/one.txt"),
                root.join("top.txt"),
            ]
        );
    }

    #[tokio::test]
    async fn single_permit_still_completes() {
        let tmp = TempDir::new().unwrap();
        for i in 0..10 {
            let dir = tmp.path().join(format!("d{i}"));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("f"), "").unwrap();
        }
        let options = WalkOptions {
            follow_links: false,
            max_concurrency: 1,
        };
        assert_eq!(walk_files(tmp.path(), options).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn missing_root_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = walk_files(&tmp.path().join("absent"), NO_FOLLOW)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_cycle_terminates_when_following() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("a/file.txt"), "").unwrap();
        std::os::unix::fs::symlink(root, root.join("a/loop")).unwrap();

        let options = WalkOptions {
            follow_links: true,
            max_concurrency: 4,
        };
        let files = walk_files(root, options).await.unwrap();
        assert_eq!(files, vec![root.join("a/file.txt")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_reached_through_two_links_is_walked_once() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("shared")).unwrap();
        fs::write(root.join("shared/only.txt"), "").unwrap();
        std::os::unix::fs::symlink(root.join("shared"), root.join("left")).unwrap();
        std::os::unix::fs::symlink(root.join("shared"), root.join("right")).unwrap();

        let options = WalkOptions {
            follow_links: true,
            max_concurrency: 4,
        };
        let files = walk_files(root, options).await.unwrap();
        assert_eq!(files.len(), 1, "got {files:?}");
        assert!(files[0].ends_with("only.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_leaves_when_not_following() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/inner.txt"), "").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

        let files = walk_files(root, NO_FOLLOW).await.unwrap();
        assert_eq!(files, vec![root.join("link"), root.join("real/inner.txt")]);
    }
}
