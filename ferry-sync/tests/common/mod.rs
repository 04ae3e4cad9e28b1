#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ferry_bridge::{BridgeError, CompilationBridge};
use ferry_core::{
    GeneratedFileEntry, GenerationOptions, IntermediateRepresentation, PackageDefinition,
    ProjectMetadata, SourceFile,
};
use serde_json::json;

/// In-process stand-in for the compilation service.
#[derive(Default)]
pub struct FakeBridge {
    pub entries: Vec<GeneratedFileEntry>,
    pub reject_with: Option<serde_json::Value>,
    pub compiled: Mutex<Vec<SourceFile>>,
}

impl FakeBridge {
    pub fn generating(entries: Vec<GeneratedFileEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn rejecting(payload: serde_json::Value) -> Self {
        Self {
            reject_with: Some(payload),
            ..Self::default()
        }
    }
}

#[async_trait]
impl CompilationBridge for FakeBridge {
    async fn compile_sources(
        &self,
        metadata: &ProjectMetadata,
        sources: &[SourceFile],
    ) -> Result<PackageDefinition, BridgeError> {
        if let Some(payload) = &self.reject_with {
            return Err(BridgeError::Decode {
                payload: payload.clone(),
            });
        }
        self.compiled.lock().unwrap().extend_from_slice(sources);
        Ok(PackageDefinition(json!({
            "name": metadata.config.get("name").cloned().unwrap_or_default(),
            "modules": sources.len(),
        })))
    }

    async fn generate_artifacts(
        &self,
        _options: &GenerationOptions,
        _ir: &IntermediateRepresentation,
    ) -> Result<Vec<GeneratedFileEntry>, BridgeError> {
        if let Some(payload) = &self.reject_with {
            return Err(BridgeError::Decode {
                payload: payload.clone(),
            });
        }
        Ok(self.entries.clone())
    }
}

pub fn entry(segments: &[&str], name: &str, content: &str) -> GeneratedFileEntry {
    GeneratedFileEntry::new(segments.iter().copied(), name, content)
}

pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Relative path → content for every file under `root`.
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn visit(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                let rel = path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    visit(root, root, &mut out);
    out
}

pub fn names(root: &Path) -> Vec<String> {
    snapshot(root).into_keys().collect()
}
