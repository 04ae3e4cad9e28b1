//! `ferry gen`: generate output for an IR file and reconcile it to disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use tokio::sync::mpsc;

use ferry_core::paths::default_scaffold_root;
use ferry_core::GenerationOptions;
use ferry_sync::{pipeline, Change, ChangeKind, GenOutcome, GenRequest};

use super::service::ServiceArgs;

#[derive(Args, Debug)]
pub struct GenArgs {
    /// Intermediate representation JSON file.
    pub ir: PathBuf,

    /// Output directory to reconcile.
    #[arg(long)]
    pub output: PathBuf,

    /// Generation target; also selects the scaffold tree.
    #[arg(long)]
    pub target: String,

    /// Extra generation option; the value is parsed as JSON, else kept as a string.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, Value)>,

    /// Directory holding one scaffold tree per target
    /// (defaults to `FERRY_SCAFFOLD_DIR` or the platform data directory).
    #[arg(long)]
    pub scaffold: Option<PathBuf>,

    /// Report the changes without touching the output directory.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub service: ServiceArgs,
}

impl GenArgs {
    pub fn run(self) -> Result<()> {
        let runtime = self.service.runtime()?;
        runtime.block_on(self.execute())
    }

    fn request(&self) -> GenRequest {
        let options = self
            .options
            .iter()
            .fold(GenerationOptions::new(&self.target), |options, (key, value)| {
                options.with(key.clone(), value.clone())
            });
        GenRequest {
            ir_path: self.ir.clone(),
            output_root: self.output.clone(),
            options,
            scaffold_root: self.scaffold.clone().or_else(default_scaffold_root),
            dry_run: self.dry_run,
        }
    }

    async fn execute(&self) -> Result<()> {
        let bridge = self.service.bridge();
        let request = self.request();
        let sync_options = self.service.sync_options();
        let (tx, mut rx) = mpsc::unbounded_channel::<Change>();

        let run = async move {
            let outcome = pipeline::gen(&bridge, &request, &sync_options, Some(&tx)).await;
            drop(tx);
            outcome
        };
        let print = async {
            while let Some(change) = rx.recv().await {
                print_change(&change, false);
            }
        };
        let (outcome, ()) = tokio::join!(run, print);
        let outcome = outcome
            .with_context(|| format!("gen failed for '{}'", self.ir.display()))?;

        if outcome.dry_run {
            for change in &outcome.changes {
                print_change(change, true);
            }
        }
        print_summary(&outcome, &self.output);
        Ok(())
    }
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty option name in '{raw}'"));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn print_change(change: &Change, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let op = change.kind.to_string();
    let op = match change.kind {
        ChangeKind::Insert => op.green(),
        ChangeKind::Update => op.yellow(),
        ChangeKind::Delete => op.red(),
    };
    println!("{prefix}{op} {}", change.path.display());
}

fn print_summary(outcome: &GenOutcome, output: &std::path::Path) {
    let prefix = if outcome.dry_run { "[dry-run] " } else { "" };
    let verb = if outcome.dry_run { "would sync" } else { "synced" };
    println!(
        "{prefix}✓ '{}' {verb} ({} inserted, {} updated, {} deleted, {} overlaid)",
        output.display(),
        outcome.count(ChangeKind::Insert),
        outcome.count(ChangeKind::Update),
        outcome.count(ChangeKind::Delete),
        outcome.overlaid.len(),
    );
}
