// emit.rs — Recording policy decisions to the audit sink.
//
// Emission is fail-open: a sink that can't be configured or reached is
// logged and ignored, and never changes a command's outcome.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde_json::json;
use warden_audit::{
    ActionKind, Actor, AuditClient, AuditConfig, AuditEvent, EventStatus, JsonlTransport,
};
use warden_policy::{PolicyDecision, PolicyDocument};

/// Flags controlling where policy decisions are recorded.
#[derive(Args, Debug, Clone, Default)]
pub struct EmitArgs {
    /// Record the decision as an audit event.
    #[arg(long)]
    pub emit: bool,
    /// Audit ingest base URL (implies --emit; overrides config and WARDEN_API_URL).
    #[arg(long)]
    pub api_url: Option<String>,
    /// Append events to a local JSONL file instead of POSTing them (implies --emit).
    #[arg(long)]
    pub audit_log: Option<PathBuf>,
    /// Audit client config file (TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Agent instance recorded on emitted events.
    #[arg(long, default_value = "warden-cli")]
    pub agent_id: String,
    /// Trace id recorded on emitted events (random if omitted).
    #[arg(long)]
    pub trace_id: Option<String>,
}

impl EmitArgs {
    pub fn enabled(&self) -> bool {
        self.emit || self.api_url.is_some() || self.audit_log.is_some()
    }

    pub fn trace_id(&self) -> String {
        self.trace_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    fn audit_config(&self) -> anyhow::Result<AuditConfig> {
        let config = match &self.config {
            Some(path) => AuditConfig::load(path)?,
            None => AuditConfig::default(),
        };
        let config = config.with_env_overrides();
        Ok(match &self.api_url {
            Some(url) => config.with_api_url(url.clone()),
            None => config,
        })
    }

    fn open_client(&self) -> anyhow::Result<AuditClient> {
        let config = self.audit_config()?;
        match &self.audit_log {
            Some(path) => {
                let transport = JsonlTransport::open(path)?;
                Ok(AuditClient::with_transport(config, Box::new(transport))?)
            }
            None => Ok(AuditClient::new(config)?),
        }
    }
}

/// Build the `policy_check` event describing one decision.
pub fn policy_check_event(
    agent_id: &str,
    trace_id: &str,
    resource: &str,
    decision: &PolicyDecision,
    policy: &PolicyDocument,
    elapsed: Duration,
) -> AuditEvent {
    let (status, outcome) = if decision.allowed {
        (EventStatus::Success, "allow")
    } else {
        (EventStatus::Denied, "deny")
    };
    AuditEvent::new(
        agent_id,
        trace_id,
        Actor::System,
        ActionKind::PolicyCheck,
        resource,
        status,
    )
    .with_latency_ms(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    .with_metadata(json!({
        "decision": outcome,
        "reason": decision.reason,
        "requires_approval": decision.requires_approval,
        "policy": policy.name,
        "policy_version": policy.version,
    }))
}

/// Deliver `events` if emission is enabled. Never fails.
pub fn emit(args: &EmitArgs, events: Vec<AuditEvent>) {
    if !args.enabled() || events.is_empty() {
        return;
    }
    let client = match args.open_client() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("audit emission disabled: {:#}", e);
            return;
        }
    };
    for event in events {
        client.capture(event);
    }
    client.close();

    let stats = client.stats();
    if stats.dropped > 0 {
        tracing::warn!(dropped = stats.dropped, "some audit events were not delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use warden_policy::{ActionContext, PolicyEnforcer};

    fn policy() -> PolicyDocument {
        PolicyDocument::from_yaml_str(
            r#"
name: test-policy
version: 4
allowed_actions:
  - type: "s3:*"
denied_actions:
  - type: "s3:DeleteBucket"
"#,
        )
        .unwrap()
    }

    #[test]
    fn denied_decision_becomes_denied_event() {
        let doc = policy();
        let enforcer = PolicyEnforcer::new(doc.clone());
        let decision = enforcer.check("s3:DeleteBucket", &ActionContext::new());

        let event = policy_check_event(
            "agent-1",
            "trace-1",
            "s3:DeleteBucket",
            &decision,
            &doc,
            Duration::from_millis(3),
        );
        assert_eq!(event.status, EventStatus::Denied);
        assert_eq!(event.action_type, ActionKind::PolicyCheck);
        assert_eq!(event.resource, "s3:DeleteBucket");
        assert_eq!(event.latency_ms, Some(3));
        assert_eq!(event.metadata["decision"], "deny");
        assert_eq!(event.metadata["policy"], "test-policy");
        assert_eq!(event.metadata["policy_version"], 4);
        assert_eq!(
            event.metadata["reason"],
            "Action denied by policy rule: s3:DeleteBucket"
        );
    }

    #[test]
    fn emission_is_off_unless_requested() {
        assert!(!EmitArgs::default().enabled());
        let with_log = EmitArgs {
            audit_log: Some(PathBuf::from("audit.jsonl")),
            ..EmitArgs::default()
        };
        assert!(with_log.enabled());
    }

    #[test]
    fn emit_to_jsonl_writes_every_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let args = EmitArgs {
            audit_log: Some(path.clone()),
            agent_id: "agent-9".to_string(),
            trace_id: Some("trace-9".to_string()),
            ..EmitArgs::default()
        };
        let doc = policy();
        let decision = PolicyEnforcer::new(doc.clone()).check("s3:GetObject", &ActionContext::new());
        let event = policy_check_event(
            &args.agent_id,
            &args.trace_id(),
            "s3:GetObject",
            &decision,
            &doc,
            Duration::ZERO,
        );

        emit(&args, vec![event.clone()]);

        let events = JsonlTransport::read_all(&path).unwrap();
        assert_eq!(events, vec![event]);
        assert_eq!(events[0].trace_id, "trace-9");
        assert_eq!(events[0].status, EventStatus::Success);
    }

    #[test]
    fn unreadable_config_does_not_fail() {
        let args = EmitArgs {
            emit: true,
            config: Some(PathBuf::from("/nonexistent/warden/audit.toml")),
            ..EmitArgs::default()
        };
        let event = AuditEvent::new(
            "a",
            "t",
            Actor::System,
            ActionKind::PolicyCheck,
            "x",
            EventStatus::Success,
        );
        emit(&args, vec![event]);
    }
}
