//! `ferry make`: compile a project and print its package definition.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ferry_sync::pipeline;

use super::service::ServiceArgs;

#[derive(Args, Debug)]
pub struct MakeArgs {
    /// Project root containing `ferry.yaml`.
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    #[command(flatten)]
    pub service: ServiceArgs,
}

impl MakeArgs {
    pub fn run(self) -> Result<()> {
        let runtime = self.service.runtime()?;
        runtime.block_on(self.execute())
    }

    async fn execute(&self) -> Result<()> {
        let bridge = self.service.bridge();
        let package = pipeline::make(&bridge, &self.project, &self.service.sync_options())
            .await
            .with_context(|| format!("make failed for '{}'", self.project.display()))?;

        println!(
            "{}",
            serde_json::to_string_pretty(&package)
                .context("failed to render package definition JSON")?
        );
        Ok(())
    }
}
