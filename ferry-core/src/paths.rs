use std::path::PathBuf;

/// File name of the project descriptor at a project root.
pub const DESCRIPTOR_FILE: &str = "ferry.yaml";

/// Extension of compilable source files when the descriptor does not set one.
pub const DEFAULT_SOURCE_EXTENSION: &str = "fy";

/// Environment variable overriding [`default_scaffold_root`].
pub const SCAFFOLD_DIR_ENV: &str = "FERRY_SCAFFOLD_DIR";

/// `<data dir>/ferry/scaffold`, the root holding one static tree per target.
///
/// Returns `None` when the platform has no data directory.
pub fn default_scaffold_root() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(SCAFFOLD_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    dirs::data_dir().map(|dir| dir.join("ferry").join("scaffold"))
}
