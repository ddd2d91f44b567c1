// audit.rs — Audit subcommands: tail.

use std::path::PathBuf;

use clap::Subcommand;
use warden_audit::JsonlTransport;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show recent audit events from a local JSONL log.
    Tail {
        /// Path to the audit log written with --audit-log.
        #[arg(long)]
        log: PathBuf,
        /// Number of events to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &AuditCommands) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Tail { log, n } => {
            if !log.exists() {
                println!("No audit log found at {}", log.display());
                return Ok(());
            }

            let events = JsonlTransport::read_all(log)?;
            let start = events.len().saturating_sub(*n);
            let recent = &events[start..];

            if recent.is_empty() {
                println!("No audit events.");
                return Ok(());
            }

            println!(
                "{:<20} {:<14} {:<13} {:<8} RESOURCE",
                "TIMESTAMP", "AGENT", "ACTION", "STATUS"
            );
            println!("{}", "-".repeat(80));

            for event in recent {
                println!(
                    "{:<20} {:<14} {:<13} {:<8} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.agent_instance_id,
                    event.action_type,
                    event.status,
                    event.resource,
                );
            }
        }
    }

    Ok(())
}
