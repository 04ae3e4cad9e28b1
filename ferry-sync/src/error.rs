//! Error types for ferry-sync.

use std::path::PathBuf;

use thiserror::Error;

use ferry_bridge::BridgeError;
use ferry_core::CoreError;

/// All errors that can arise from collection, reconciliation and overlay.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required directory or file is missing.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    /// The path exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two generated entries resolve to the same output path.
    #[error("duplicate generated entry for {path}")]
    DuplicateEntry { path: PathBuf },

    /// An error from descriptor loading or entry validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error from the compilation service.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A spawned file-system task panicked or was cancelled.
    #[error("file-system task failed: {0}")]
    Join(String),
}

/// Coarse classification callers use to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A required input is missing.
    NotFound,
    /// The compilation service rejected or could not decode a payload.
    Decode,
    /// A file-system or transport operation failed.
    Io,
    /// Input was malformed before any service or disk work happened.
    Invalid,
}

impl SyncError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::NotFound { .. } | SyncError::NotADirectory { .. } => FailureKind::NotFound,
            SyncError::Io { .. } | SyncError::Join(_) => FailureKind::Io,
            SyncError::DuplicateEntry { .. } => FailureKind::Invalid,
            SyncError::Core(err) => match err {
                CoreError::NotFound { .. } => FailureKind::NotFound,
                CoreError::Io { .. } => FailureKind::Io,
                CoreError::InvalidJson { .. } => FailureKind::Decode,
                CoreError::Parse { .. }
                | CoreError::InvalidEntry { .. }
                | CoreError::InvalidTarget { .. } => FailureKind::Invalid,
            },
            SyncError::Bridge(err) => match err {
                BridgeError::Decode { .. } | BridgeError::Json(_) => FailureKind::Decode,
                BridgeError::ServiceUnavailable { .. } => FailureKind::NotFound,
                BridgeError::Io { .. }
                | BridgeError::ChannelClosed(_)
                | BridgeError::Protocol(_) => FailureKind::Io,
            },
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn join_err(err: tokio::task::JoinError) -> SyncError {
    SyncError::Join(err.to_string())
}
