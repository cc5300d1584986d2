//! CLI structure and command definitions.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "manifold")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate Kubernetes manifests from declarative configuration", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate manifests and write them to stdout
    Build(BuildArgs),

    /// Show version information
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Path to read configuration from. Use '-' to read YAML from stdin
    #[arg(short, long)]
    pub path: String,

    /// Change directory before running
    #[arg(short = 'c', long = "chdir")]
    pub chdir: Option<PathBuf>,

    /// Tags injected into the configuration (name=value)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Only load instances of this package
    #[arg(long)]
    pub package: Option<String>,

    /// Directory for downloaded artifacts
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Only emit objects whose kind matches this regex (case-insensitive, anchored)
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Field holding the generator manifests
    #[arg(long)]
    pub generators_field: Option<String>,

    /// Field holding sops-encrypted secrets
    #[arg(long)]
    pub secrets_field: Option<String>,

    /// Configuration file (defaults to ~/.config/manifold/config.yml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Log filter directive for the global verbosity flags.
    pub fn log_directive(&self) -> String {
        let verbosity = if self.debug {
            self.verbose.max(2)
        } else {
            self.verbose
        };
        manifold_core::log::directive_for(verbosity, self.quiet)
    }

    pub fn execute(&self) -> Result<()> {
        use crate::commands::*;

        match &self.command {
            Commands::Build(args) => build::execute(args),
            Commands::Version => version::execute(self.verbose > 0),
        }
    }
}
