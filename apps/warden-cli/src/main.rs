//! # warden-cli
//!
//! Command-line interface for Warden.
//!
//! - `warden check` — evaluate one action against a policy
//! - `warden batch` — evaluate a list of actions as a unit
//! - `warden validate` — load a policy and report rule conflicts
//! - `warden auto-approve` — list or test auto-approval sets
//! - `warden audit tail` — show recent events from a local audit log
//!
//! Decisions and reports go to stdout as JSON or tables; logs go to stderr.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Warden — policy enforcement and audit for autonomous agents.
#[derive(Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a single action against a policy.
    Check(commands::check::CheckArgs),
    /// Check a batch of actions; all must pass.
    Batch(commands::batch::BatchArgs),
    /// Load a policy file and report problems.
    Validate {
        /// Policy file (YAML, or JSON with a .json extension).
        #[arg(long)]
        policy: std::path::PathBuf,
    },
    /// Show which actions may skip approval at a risk level.
    AutoApprove {
        /// Policy file (YAML, or JSON with a .json extension).
        #[arg(long)]
        policy: std::path::PathBuf,
        /// Risk level: low, medium or high.
        #[arg(long)]
        risk: warden_policy::RiskLevel,
        /// Test a single action instead of listing the set.
        action: Option<String>,
    },
    /// Inspect a local audit log.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;

    match &cli.command {
        Commands::Check(args) => commands::check::execute(args),
        Commands::Batch(args) => commands::batch::execute(args),
        Commands::Validate { policy } => commands::validate::execute(policy),
        Commands::AutoApprove {
            policy,
            risk,
            action,
        } => commands::auto_approve::execute(policy, *risk, action.as_deref()),
        Commands::Audit { command } => commands::audit::execute(command),
    }
}

fn init_logging(json: bool) -> anyhow::Result<()> {
    // Logs go to stderr so decisions on stdout stay machine-readable.
    let filter = EnvFilter::from_default_env()
        .add_directive("warden_policy=info".parse()?)
        .add_directive("warden_audit=info".parse()?)
        .add_directive("warden=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
