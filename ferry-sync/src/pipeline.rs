//! `make` and `gen`: the sequencing shared by the CLI and tests.
//!
//! `make` = load descriptor → collect sources → compile.
//! `gen`  = load IR → generate → reconcile → overlay `<scaffold_root>/<target>`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use ferry_bridge::CompilationBridge;
use ferry_core::{GenerationOptions, IntermediateRepresentation, PackageDefinition, ProjectMetadata};

use crate::collector::collect_sources;
use crate::config::SyncOptions;
use crate::error::SyncError;
use crate::overlay::{self, apply_overlay};
use crate::reconcile::{self, Change, ChangeKind, ProgressSender};

/// Inputs for one `gen` run.
#[derive(Debug, Clone)]
pub struct GenRequest {
    pub ir_path: PathBuf,
    pub output_root: PathBuf,
    pub options: GenerationOptions,
    /// Directory holding one scaffold tree per target; `None` disables the overlay.
    pub scaffold_root: Option<PathBuf>,
    /// Plan only: report the changes without touching the output root.
    pub dry_run: bool,
}

/// What a `gen` run did (or, for a dry run, would do).
#[derive(Debug, Clone, Serialize)]
pub struct GenOutcome {
    pub changes: Vec<Change>,
    pub overlaid: Vec<PathBuf>,
    pub dry_run: bool,
}

impl GenOutcome {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// Compile the project rooted at `project_root` without writing any output.
pub async fn make<B: CompilationBridge>(
    bridge: &B,
    project_root: &Path,
    options: &SyncOptions,
) -> Result<PackageDefinition, SyncError> {
    let metadata = ProjectMetadata::load(project_root).await?;
    let source_root = metadata.source_root(project_root);
    let sources = collect_sources(&source_root, &metadata.source_extension, options).await?;

    let package = bridge.compile_sources(&metadata, &sources).await?;
    tracing::info!(
        project = %project_root.display(),
        sources = sources.len(),
        "project compiled",
    );
    Ok(package)
}

/// Generate output for an intermediate representation and materialise it.
///
/// Files the target's scaffold is about to overwrite are never planned for
/// deletion. The overlay runs strictly after reconciliation has settled.
pub async fn gen<B: CompilationBridge>(
    bridge: &B,
    request: &GenRequest,
    options: &SyncOptions,
    progress: Option<&ProgressSender>,
) -> Result<GenOutcome, SyncError> {
    request.options.validate()?;
    let ir = IntermediateRepresentation::load(&request.ir_path).await?;

    let entries = bridge.generate_artifacts(&request.options, &ir).await?;
    tracing::info!(entries = entries.len(), target = %request.options.target, "artifacts generated");

    let scaffold = request
        .scaffold_root
        .as_ref()
        .map(|root| root.join(&request.options.target));
    let preserve: HashSet<PathBuf> = match &scaffold {
        Some(scaffold) => overlay::destinations(scaffold, &request.output_root, options)
            .await?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    let plan =
        reconcile::plan_preserving(&request.output_root, entries, &preserve, options).await?;
    if request.dry_run {
        tracing::info!(root = %plan.root().display(), empty = plan.is_empty(), "dry run, nothing written");
        return Ok(GenOutcome {
            changes: plan.changes(),
            overlaid: Vec::new(),
            dry_run: true,
        });
    }

    let report = reconcile::apply(plan, options, progress).await?;

    let overlaid = match &scaffold {
        Some(scaffold) => apply_overlay(scaffold, &request.output_root, options).await?,
        None => Vec::new(),
    };

    Ok(GenOutcome {
        changes: report.changes,
        overlaid,
        dry_run: false,
    })
}
