//! Output reconciliation.
//!
//! Makes the files under an output root equal to a set of generated entries:
//!
//! 1. Resolve every entry to `root/segments…/file_name`; reject duplicates.
//! 2. Enumerate every file already under the root without following links.
//!    Whatever is not a target is a DELETE, unless the caller asked for it to
//!    be preserved and no target needs its path as a directory.
//! 3. Classify each target as UPDATE if the enumeration saw it, else INSERT.
//!    Updates are unconditional, even when the bytes on disk already match.
//! 4. Delete stale entries standing where a target needs a directory, then
//!    issue every other write and delete concurrently and wait for all of them
//!    to settle. The first failure is reported; nothing is rolled back.
//!
//! A target that is currently a symlink is unlinked before it is written, so
//! writes never land outside the root. Directories emptied by deletes are
//! left in place.

use std::collections::HashSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use ferry_core::GeneratedFileEntry;

use crate::config::SyncOptions;
use crate::error::{io_err, join_err, SyncError};
use crate::walk::{walk_files, WalkOptions};

/// Sink for per-operation progress notifications.
pub type ProgressSender = mpsc::UnboundedSender<Change>;

// ---------------------------------------------------------------------------
// Changes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        })
    }
}

/// One operation on one absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path.display())
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PlannedWrite {
    kind: ChangeKind,
    path: PathBuf,
    content: Vec<u8>,
}

/// Everything one reconciliation will do, computed without touching the disk.
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    root: PathBuf,
    writes: Vec<PlannedWrite>,
    /// Stale entries occupying a directory some target is written under.
    clears: Vec<PathBuf>,
    deletes: Vec<PathBuf>,
}

impl ReconcilePlan {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The planned changes, sorted by path.
    pub fn changes(&self) -> Vec<Change> {
        let mut changes: Vec<Change> = self
            .writes
            .iter()
            .map(|w| Change {
                kind: w.kind,
                path: w.path.clone(),
            })
            .chain(self.clears.iter().chain(&self.deletes).map(|path| Change {
                kind: ChangeKind::Delete,
                path: path.clone(),
            }))
            .collect();
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.clears.is_empty() && self.deletes.is_empty()
    }
}

/// Outcome of an applied reconciliation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Applied changes, sorted by path.
    pub changes: Vec<Change>,
}

impl ReconcileReport {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// Compute the changes needed to make `output_root` match `entries`.
///
/// A missing `output_root` plans every entry as an INSERT. Entries that do not
/// resolve below the root, or that resolve to the same path, fail the plan
/// before any I/O.
pub async fn plan(
    output_root: &Path,
    entries: Vec<GeneratedFileEntry>,
    options: &SyncOptions,
) -> Result<ReconcilePlan, SyncError> {
    plan_preserving(output_root, entries, &HashSet::new(), options).await
}

/// [`plan`], except that existing files listed in `preserve` are not deleted
/// unless a target has to be written beneath them.
pub async fn plan_preserving(
    output_root: &Path,
    entries: Vec<GeneratedFileEntry>,
    preserve: &HashSet<PathBuf>,
    options: &SyncOptions,
) -> Result<ReconcilePlan, SyncError> {
    let mut targets = Vec::with_capacity(entries.len());
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        let path = entry.resolve(output_root)?;
        if !seen.insert(path.clone()) {
            return Err(SyncError::DuplicateEntry { path });
        }
        targets.push((path, entry.content));
    }

    let root_exists = match tokio::fs::metadata(output_root).await {
        Ok(meta) if meta.is_dir() => true,
        Ok(_) => {
            return Err(SyncError::NotADirectory {
                path: output_root.to_path_buf(),
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => return Err(io_err(output_root, err)),
    };

    let existing: HashSet<PathBuf> = if root_exists {
        let walk = WalkOptions {
            follow_links: false,
            max_concurrency: options.permits(),
        };
        walk_files(output_root, walk).await?.into_iter().collect()
    } else {
        HashSet::new()
    };

    // Every directory strictly between the root and a target.
    let directories: HashSet<&Path> = targets
        .iter()
        .flat_map(|(path, _)| {
            path.ancestors()
                .skip(1)
                .take_while(move |dir| *dir != output_root && dir.starts_with(output_root))
        })
        .collect();

    let writes: Vec<PlannedWrite> = targets
        .iter()
        .map(|(path, content)| PlannedWrite {
            kind: if existing.contains(path) {
                ChangeKind::Update
            } else {
                ChangeKind::Insert
            },
            path: path.clone(),
            content: content.clone(),
        })
        .collect();

    let mut clears = Vec::new();
    let mut deletes = Vec::new();
    for path in existing {
        if seen.contains(&path) {
            continue;
        }
        if directories.contains(path.as_path()) {
            clears.push(path);
        } else if preserve.contains(&path) {
            tracing::debug!(path = %path.display(), "preserved");
        } else {
            deletes.push(path);
        }
    }

    tracing::debug!(
        root = %output_root.display(),
        writes = writes.len(),
        clears = clears.len(),
        deletes = deletes.len(),
        "reconciliation planned",
    );

    Ok(ReconcilePlan {
        root: output_root.to_path_buf(),
        writes,
        clears,
        deletes,
    })
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Carry out a plan.
///
/// Every write and delete is issued without waiting for the others, bounded by
/// `options.max_concurrency`. Each successful operation is logged and sent to
/// `progress` as it completes. All operations settle before this returns; if
/// any failed, the first failure is returned and the output root may be left
/// partially reconciled.
pub async fn apply(
    plan: ReconcilePlan,
    options: &SyncOptions,
    progress: Option<&ProgressSender>,
) -> Result<ReconcileReport, SyncError> {
    let ReconcilePlan {
        root,
        writes,
        clears,
        deletes,
    } = plan;

    tokio::fs::create_dir_all(&root)
        .await
        .map_err(|e| io_err(&root, e))?;

    let semaphore = Arc::new(Semaphore::new(options.permits()));
    let mut settled = Settled::default();

    // Stale files where a directory is about to be created go first.
    let mut ops = JoinSet::new();
    for path in clears {
        ops.spawn(delete(path, semaphore.clone()));
    }
    settled.drain(&mut ops, progress).await;

    let mut ops = JoinSet::new();
    for write in writes {
        let semaphore = semaphore.clone();
        ops.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|err| SyncError::Join(err.to_string()))?;
            write_file(&write.path, &write.content).await?;
            Ok::<_, SyncError>(Change {
                kind: write.kind,
                path: write.path,
            })
        });
    }
    for path in deletes {
        ops.spawn(delete(path, semaphore.clone()));
    }
    settled.drain(&mut ops, progress).await;

    let Settled {
        mut changes,
        first_error,
        failed,
    } = settled;

    if let Some(err) = first_error {
        tracing::warn!(
            root = %root.display(),
            applied = changes.len(),
            failed,
            "output left partially reconciled",
        );
        return Err(err);
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(ReconcileReport { changes })
}

#[derive(Default)]
struct Settled {
    changes: Vec<Change>,
    first_error: Option<SyncError>,
    failed: usize,
}

impl Settled {
    /// Wait for every operation in `ops`, recording each outcome.
    async fn drain(
        &mut self,
        ops: &mut JoinSet<Result<Change, SyncError>>,
        progress: Option<&ProgressSender>,
    ) {
        while let Some(joined) = ops.join_next().await {
            match joined.map_err(join_err).and_then(|result| result) {
                Ok(change) => {
                    tracing::info!(op = %change.kind, path = %change.path.display(), "applied");
                    if let Some(progress) = progress {
                        let _ = progress.send(change.clone());
                    }
                    self.changes.push(change);
                }
                Err(err) => {
                    tracing::error!(error = %err, "reconciliation operation failed");
                    self.failed += 1;
                    self.first_error.get_or_insert(err);
                }
            }
        }
    }
}

async fn delete(path: PathBuf, semaphore: Arc<Semaphore>) -> Result<Change, SyncError> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|err| SyncError::Join(err.to_string()))?;
    tokio::fs::remove_file(&path)
        .await
        .map_err(|e| io_err(&path, e))?;
    Ok(Change {
        kind: ChangeKind::Delete,
        path,
    })
}

/// Plan and apply in one call.
pub async fn reconcile(
    output_root: &Path,
    entries: Vec<GeneratedFileEntry>,
    options: &SyncOptions,
    progress: Option<&ProgressSender>,
) -> Result<ReconcileReport, SyncError> {
    let plan = plan(output_root, entries, options).await?;
    apply(plan, options, progress).await
}

async fn write_file(path: &Path, content: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_symlink() => tokio::fs::remove_file(path)
            .await
            .map_err(|e| io_err(path, e))?,
        _ => {}
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| io_err(path, e))
}
