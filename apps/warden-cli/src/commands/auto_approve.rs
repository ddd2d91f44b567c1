// auto_approve.rs — `warden auto-approve`: inspect auto-approval sets.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use warden_policy::{PolicyEnforcer, RiskLevel};

#[derive(Serialize)]
struct AutoApproveReport<'a> {
    risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_approve: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actions: Option<&'a [String]>,
}

pub fn execute(policy: &Path, risk: RiskLevel, action: Option<&str>) -> anyhow::Result<()> {
    let enforcer = PolicyEnforcer::from_file(policy)
        .with_context(|| format!("cannot load policy {}", policy.display()))?;

    let report = match action {
        Some(action) => AutoApproveReport {
            risk_level: risk,
            action: Some(action),
            auto_approve: Some(enforcer.can_auto_approve(action, risk)),
            actions: None,
        },
        None => AutoApproveReport {
            risk_level: risk,
            action: None,
            auto_approve: None,
            actions: Some(enforcer.auto_approve_actions(risk)),
        },
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
