use async_trait::async_trait;

use ferry_core::{
    GeneratedFileEntry, GenerationOptions, IntermediateRepresentation, PackageDefinition,
    ProjectMetadata, SourceFile,
};

use crate::error::BridgeError;

/// Request/response access to the compilation service.
///
/// Implementations must keep concurrent calls on one handle independent: a
/// result is only ever delivered to the call that asked for it.
#[async_trait]
pub trait CompilationBridge: Send + Sync {
    /// Compile a project's sources into a package definition.
    async fn compile_sources(
        &self,
        metadata: &ProjectMetadata,
        sources: &[SourceFile],
    ) -> Result<PackageDefinition, BridgeError>;

    /// Generate the output files for an intermediate representation.
    async fn generate_artifacts(
        &self,
        options: &GenerationOptions,
        ir: &IntermediateRepresentation,
    ) -> Result<Vec<GeneratedFileEntry>, BridgeError>;
}
