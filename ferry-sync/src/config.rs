//! Tuning shared by every concurrent file-system operation.

/// Default bound on concurrently outstanding file-system operations.
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

/// Environment variable the CLI reads for [`SyncOptions::max_concurrency`].
pub const JOBS_ENV: &str = "FERRY_JOBS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound on reads, writes, deletes and directory listings in flight
    /// at once. Values below 1 are treated as 1.
    pub max_concurrency: usize,
}

impl SyncOptions {
    pub fn with_max_concurrency(max_concurrency: usize) -> Self {
        Self { max_concurrency }
    }

    pub(crate) fn permits(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}
