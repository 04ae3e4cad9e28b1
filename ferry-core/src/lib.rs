//! Ferry core library: domain types, project descriptor, errors.
//!
//! Public API surface:
//! - [`types`]: source files, generated entries, generation options
//! - [`project`]: `ferry.yaml` descriptor loading
//! - [`error`]: [`CoreError`]
//! - [`paths`]: well-known file names and default locations

pub mod error;
pub mod paths;
pub mod project;
pub mod types;

pub use error::CoreError;
pub use project::ProjectMetadata;
pub use types::{
    GeneratedFileEntry, GenerationOptions, IntermediateRepresentation, PackageDefinition,
    SourceFile,
};
