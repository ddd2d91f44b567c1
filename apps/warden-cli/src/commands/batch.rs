// batch.rs — `warden batch`: evaluate a list of actions as one unit.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use warden_policy::{BatchAction, PolicyEnforcer};

use super::emit::{emit, policy_check_event, EmitArgs};

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Policy file (YAML, or JSON with a .json extension).
    #[arg(long)]
    pub policy: PathBuf,
    /// JSON file holding an array of {"type": ..., <context keys>} objects.
    #[arg(long)]
    pub actions: PathBuf,
    /// Exit with an error when the batch is denied.
    #[arg(long)]
    pub require: bool,
    #[command(flatten)]
    pub emit: EmitArgs,
}

pub fn execute(args: &BatchArgs) -> anyhow::Result<()> {
    let enforcer = PolicyEnforcer::from_file(&args.policy)
        .with_context(|| format!("cannot load policy {}", args.policy.display()))?;
    let actions = read_actions(&args.actions)?;

    let started = Instant::now();
    let decision = enforcer.check_batch(&actions);
    let elapsed = started.elapsed();

    println!("{}", serde_json::to_string_pretty(&decision)?);

    emit(
        &args.emit,
        vec![policy_check_event(
            &args.emit.agent_id,
            &args.emit.trace_id(),
            &batch_resource(&actions),
            &decision,
            enforcer.document(),
            elapsed,
        )],
    );

    if args.require {
        decision.into_result()?;
    }
    Ok(())
}

fn read_actions(path: &Path) -> anyhow::Result<Vec<BatchAction>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read actions file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("{} is not a JSON array of actions", path.display()))
}

/// The action types of a batch, comma-joined, as the event's resource.
fn batch_resource(actions: &[BatchAction]) -> String {
    actions
        .iter()
        .map(|a| a.action_type.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
