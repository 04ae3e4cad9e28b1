//! Project descriptor (`ferry.yaml`).
//!
//! ```yaml
//! source_directory: src
//! source_extension: fy      # optional
//! name: my-package          # every other key is opaque and forwarded
//! dependencies: { core: "1.0" }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{read_err, CoreError};
use crate::paths::{DEFAULT_SOURCE_EXTENSION, DESCRIPTOR_FILE};

/// Parsed project descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Directory holding the sources, relative to the project root.
    pub source_directory: PathBuf,
    #[serde(default = "default_extension")]
    pub source_extension: String,
    /// Remaining descriptor keys, forwarded verbatim to the compilation service.
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

fn default_extension() -> String {
    DEFAULT_SOURCE_EXTENSION.to_string()
}

impl ProjectMetadata {
    /// `<project_root>/ferry.yaml`. Pure, no I/O.
    pub fn descriptor_path(project_root: &Path) -> PathBuf {
        project_root.join(DESCRIPTOR_FILE)
    }

    /// Load the descriptor from `<project_root>/ferry.yaml`.
    ///
    /// Returns `CoreError::NotFound` if absent,
    /// `CoreError::Parse` (with path + line context) if malformed YAML.
    pub async fn load(project_root: &Path) -> Result<Self, CoreError> {
        let path = Self::descriptor_path(project_root);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| read_err(&path, e))?;
        Self::parse(&path, &contents)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self, CoreError> {
        serde_yaml::from_str(contents).map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Absolute-or-relative directory the collector walks.
    pub fn source_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.source_directory)
    }
}
