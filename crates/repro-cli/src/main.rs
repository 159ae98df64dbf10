//! repro - provenance recording and artifact publishing for reproducible
//! research pipelines.
//!
//! Thin CLI over `repro-core`: records build provenance for configured
//! artifacts, checks git publication gates, and promotes built figures and
//! tables into a paper repository with an aggregated provenance ledger.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use repro_core::PolicyOverrides;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// repro - reproducible-research provenance and publishing tool
#[derive(Parser, Debug)]
#[command(name = "repro")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Analysis repository root (defaults to the current directory)
    #[arg(long)]
    repo_root: Option<PathBuf>,

    /// Project configuration file, relative to the repository root
    #[arg(short, long, default_value = "repro.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit machine-readable JSON reports
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Publication policy flags shared by the gate-sensitive subcommands.
///
/// Each flag overrides the corresponding setting from `repro.toml`, which
/// in turn overrides the built-in defaults; unset flags inherit.
#[derive(Args, Debug, Clone, Copy)]
struct PolicyArgs {
    /// Allow publishing from, or artifacts built from, a dirty tree
    #[arg(long, value_name = "BOOL")]
    allow_dirty: Option<bool>,

    /// Refuse to publish while the branch is behind its upstream
    #[arg(long, value_name = "BOOL")]
    require_not_behind: Option<bool>,

    /// Require every artifact to be built from the current HEAD
    #[arg(long, value_name = "BOOL")]
    require_current_head: Option<bool>,
}

impl PolicyArgs {
    fn overrides(self) -> PolicyOverrides {
        PolicyOverrides {
            allow_dirty: self.allow_dirty,
            require_not_behind: self.require_not_behind,
            require_current_head: self.require_current_head,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record build provenance for a configured artifact
    Record {
        /// Artifact name declared in the project configuration
        name: String,
    },

    /// Check git publication gates without publishing anything
    Check {
        /// Space-separated artifact names for record-level checks
        #[arg(long)]
        names: Option<String>,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Publish built artifacts into the paper repository
    Publish {
        /// Root of the paper repository
        #[arg(long)]
        paper_root: PathBuf,

        /// Artifact kind: figures or tables
        #[arg(long)]
        kind: String,

        /// Space-separated artifact base names
        #[arg(long)]
        names: String,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Publish specific output files into the paper repository
    PublishFiles {
        /// Root of the paper repository
        #[arg(long)]
        paper_root: PathBuf,

        /// Space-separated output file paths
        #[arg(long)]
        files: String,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Verify build outputs still match their recorded checksums
    Verify {
        /// Space-separated artifact names (default: every record)
        #[arg(long)]
        names: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let ctx = commands::Context::resolve(cli.repo_root, cli.config, cli.json)?;

    match cli.command {
        Commands::Record { name } => commands::record::run(&ctx, &name),
        Commands::Check { names, policy } => {
            commands::check::run(&ctx, names.as_deref(), policy.overrides())
        }
        Commands::Publish {
            paper_root,
            kind,
            names,
            policy,
        } => commands::publish::run(&ctx, &paper_root, &kind, &names, policy.overrides()),
        Commands::PublishFiles {
            paper_root,
            files,
            policy,
        } => commands::publish::run_files(&ctx, &paper_root, &files, policy.overrides()),
        Commands::Verify { names } => commands::verify::run(&ctx, names.as_deref()),
    }
}
