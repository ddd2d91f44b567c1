// validate.rs — `warden validate`: load a policy and report on it.

use std::path::Path;

use anyhow::Context;
use warden_policy::PolicyDocument;

pub fn execute(policy: &Path) -> anyhow::Result<()> {
    let doc = PolicyDocument::load(policy)
        .with_context(|| format!("invalid policy {}", policy.display()))?;

    println!("Policy:          {} (version {})", doc.name, doc.version);
    println!("Allowed actions: {}", doc.allowed_actions.len());
    println!("Denied actions:  {}", doc.denied_actions.len());
    println!("Rate limits:     {}", doc.rate_limits.len());
    println!("Auto-approve:    {} rule(s)", doc.auto_approve.len());

    let conflicts = doc.conflicts();
    if conflicts.is_empty() {
        println!("\nNo conflicts found.");
    } else {
        println!("\n{} conflict(s):", conflicts.len());
        for conflict in &conflicts {
            println!("  warning: {}", conflict);
        }
    }
    Ok(())
}
