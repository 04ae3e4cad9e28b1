//! Error types for ferry-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from descriptor loading and entry validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required input file or directory does not exist.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on the project descriptor.
    #[error("failed to parse project descriptor at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The intermediate representation file is not valid JSON.
    #[error("failed to decode intermediate representation at {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A generated entry cannot be resolved to a path below the output root.
    #[error("invalid generated entry '{entry}': {reason}")]
    InvalidEntry { entry: String, reason: &'static str },

    /// The generation target does not name a single scaffold directory.
    #[error("invalid generation target '{target}'")]
    InvalidTarget { target: String },
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}

/// Map a read failure to [`CoreError::NotFound`] when the file is missing.
pub(crate) fn read_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    let path = path.into();
    if source.kind() == std::io::ErrorKind::NotFound {
        CoreError::NotFound { path }
    } else {
        io_err(path, source)
    }
}
