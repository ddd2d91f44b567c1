// check.rs — `warden check`: evaluate one action.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use warden_policy::{ActionContext, ContextValue, PolicyEnforcer};

use super::emit::{emit, policy_check_event, EmitArgs};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Policy file (YAML, or JSON with a .json extension).
    #[arg(long)]
    pub policy: PathBuf,
    /// Action type to check (e.g., "s3:CreateBucket").
    pub action: String,
    /// Context entry as key=value; repeatable. Integers and true/false are typed.
    #[arg(short = 'c', long = "context", value_parser = parse_context_entry)]
    pub context: Vec<(String, ContextValue)>,
    /// Exit with an error when the action is denied.
    #[arg(long)]
    pub require: bool,
    /// Print every evaluated stage, not just the decision.
    #[arg(long)]
    pub explain: bool,
    #[command(flatten)]
    pub emit: EmitArgs,
}

pub fn execute(args: &CheckArgs) -> anyhow::Result<()> {
    let enforcer = PolicyEnforcer::from_file(&args.policy)
        .with_context(|| format!("cannot load policy {}", args.policy.display()))?;
    let context: ActionContext = args.context.iter().cloned().collect();

    let started = Instant::now();
    let trace = enforcer.check_with_trace(&args.action, &context);
    let elapsed = started.elapsed();

    if args.explain {
        println!("{}", serde_json::to_string_pretty(&trace)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&trace.decision)?);
    }

    emit(
        &args.emit,
        vec![policy_check_event(
            &args.emit.agent_id,
            &args.emit.trace_id(),
            &args.action,
            &trace.decision,
            enforcer.document(),
            elapsed,
        )],
    );

    if args.require {
        trace.decision.into_result()?;
    }
    Ok(())
}

/// Parse `key=value`. Values that look like integers or booleans are typed;
/// everything else is a string.
pub fn parse_context_entry(raw: &str) -> Result<(String, ContextValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    let value = if let Ok(n) = value.parse::<i64>() {
        ContextValue::Int(n)
    } else if let Ok(b) = value.parse::<bool>() {
        ContextValue::Bool(b)
    } else {
        ContextValue::Str(value.to_string())
    };
    Ok((key.to_string(), value))
}
