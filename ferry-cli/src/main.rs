//! Ferry: compile projects and materialise generated output through an
//! external compilation service.
//!
//! # Usage
//!
//! ```text
//! ferry make [--project <dir>]
//! ferry gen <ir> --output <dir> --target <t> [--set key=value]... [--scaffold <dir>] [--dry-run]
//! ```
//!
//! Both commands accept `--service <endpoint>` (`FERRY_SERVICE`) and
//! `--jobs <n>` (`FERRY_JOBS`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{gen::GenArgs, make::MakeArgs};

#[derive(Parser, Debug)]
#[command(
    name = "ferry",
    version,
    about = "Compile projects and reconcile generated output directories",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect a project's sources and compile them into a package definition.
    Make(MakeArgs),

    /// Generate output for an intermediate representation and sync it to a directory.
    Gen(GenArgs),
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Make(args) => args.run(),
        Commands::Gen(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
