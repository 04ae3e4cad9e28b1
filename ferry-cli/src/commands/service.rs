//! Flags shared by every command that talks to the compilation service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use tokio::runtime::Runtime;
use tokio::sync::OnceCell;

use ferry_bridge::endpoint::{DEFAULT_SERVICE, SERVICE_ENV};
use ferry_bridge::{BridgeError, CompilationBridge, ServiceClient, ServiceEndpoint};
use ferry_core::{
    GeneratedFileEntry, GenerationOptions, IntermediateRepresentation, PackageDefinition,
    ProjectMetadata, SourceFile,
};
use ferry_sync::config::{DEFAULT_MAX_CONCURRENCY, JOBS_ENV};
use ferry_sync::SyncOptions;

#[derive(Args, Debug)]
pub struct ServiceArgs {
    /// Compilation service: `unix:<socket>` or a command speaking on stdio.
    #[arg(long, env = SERVICE_ENV, default_value = DEFAULT_SERVICE)]
    pub service: ServiceEndpoint,

    /// Maximum file-system operations in flight at once.
    #[arg(long, env = JOBS_ENV, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub jobs: usize,
}

impl ServiceArgs {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions::with_max_concurrency(self.jobs)
    }

    pub fn runtime(&self) -> Result<Runtime> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")
    }

    pub fn bridge(&self) -> LazyService {
        LazyService {
            endpoint: self.service.clone(),
            client: OnceCell::new(),
        }
    }
}

/// Opens the service on first use, so input errors surface before a
/// connection is attempted.
pub struct LazyService {
    endpoint: ServiceEndpoint,
    client: OnceCell<ServiceClient>,
}

impl LazyService {
    async fn client(&self) -> Result<&ServiceClient, BridgeError> {
        self.client
            .get_or_try_init(|| async {
                tracing::debug!(endpoint = %self.endpoint, "opening compilation service");
                ServiceClient::open(&self.endpoint).await
            })
            .await
    }
}

#[async_trait]
impl CompilationBridge for LazyService {
    async fn compile_sources(
        &self,
        metadata: &ProjectMetadata,
        sources: &[SourceFile],
    ) -> Result<PackageDefinition, BridgeError> {
        self.client().await?.compile_sources(metadata, sources).await
    }

    async fn generate_artifacts(
        &self,
        options: &GenerationOptions,
        ir: &IntermediateRepresentation,
    ) -> Result<Vec<GeneratedFileEntry>, BridgeError> {
        self.client().await?.generate_artifacts(options, ir).await
    }
}
