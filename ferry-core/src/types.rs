//! Domain types exchanged between the collector, the compilation service and
//! the reconciler.
//!
//! Wire-facing types use camelCase field names; everything the service sends
//! back that this crate does not interpret stays a `serde_json::Value`.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{read_err, CoreError};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One compilable source file, read in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute path of the file on disk.
    pub path: PathBuf,
    pub content: String,
}

/// Opaque package definition returned by the compilation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageDefinition(pub Value);

/// Opaque intermediate representation handed to code generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntermediateRepresentation(pub Value);

impl IntermediateRepresentation {
    /// Read and decode an intermediate representation JSON file.
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| read_err(path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| CoreError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Generation options
// ---------------------------------------------------------------------------

/// Options for one generation run.
///
/// `target` selects the static scaffold tree; every other key is forwarded to
/// the service untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub target: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            extra: Map::new(),
        }
    }

    /// Add an opaque option forwarded to the service.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// `target` must name exactly one directory below the scaffold root.
    pub fn validate(&self) -> Result<(), CoreError> {
        if is_plain_component(&self.target) {
            Ok(())
        } else {
            Err(CoreError::InvalidTarget {
                target: self.target.clone(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Generated entries
// ---------------------------------------------------------------------------

/// One file produced by code generation, to be materialised below an output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFileEntry {
    #[serde(default)]
    pub directory_segments: Vec<String>,
    pub file_name: String,
    #[serde(with = "content")]
    pub content: Vec<u8>,
}

impl GeneratedFileEntry {
    pub fn new(
        directory_segments: impl IntoIterator<Item = impl Into<String>>,
        file_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            directory_segments: directory_segments.into_iter().map(Into::into).collect(),
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// `root/segments…/file_name`.
    ///
    /// Every segment and the file name must be a single normal path component,
    /// so a resolved path can never leave `root`.
    pub fn resolve(&self, root: &Path) -> Result<PathBuf, CoreError> {
        if !is_plain_component(&self.file_name) {
            return Err(self.invalid("file name is not a single path component"));
        }
        let mut path = root.to_path_buf();
        for segment in &self.directory_segments {
            if !is_plain_component(segment) {
                return Err(self.invalid("directory segment is not a single path component"));
            }
            path.push(segment);
        }
        path.push(&self.file_name);
        Ok(path)
    }

    fn invalid(&self, reason: &'static str) -> CoreError {
        CoreError::InvalidEntry {
            entry: self.to_string(),
            reason,
        }
    }
}

impl fmt::Display for GeneratedFileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.directory_segments {
            write!(f, "{segment}/")?;
        }
        f.write_str(&self.file_name)
    }
}

fn is_plain_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Entry content travels as a UTF-8 string when possible, otherwise as an
/// array of byte values.
mod content {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(bytes) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.collect_seq(bytes),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(match Wire::deserialize(deserializer)? {
            Wire::Text(text) => text.into_bytes(),
            Wire::Bytes(bytes) => bytes,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
