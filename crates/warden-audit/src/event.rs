// event.rs — Audit event data model.
//
// Every policy decision and every guarded action's outcome is recorded as
// an AuditEvent. An event is built by the caller, handed to the client, and
// never mutated afterwards. The serialized form is the sink's wire format:
//
// {"event_id": "...", "timestamp": "2026-01-25T10:30:00Z",
//  "agent_instance_id": "...", "trace_id": "...", "actor": "agent",
//  "action_type": "tool_call", "resource": "...", "status": "success",
//  "latency_ms": 342, "metadata": {...}}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who performed the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Agent,
    Human,
    System,
}

/// What kind of action the event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ToolCall,
    HttpRequest,
    DbQuery,
    FileRead,
    FileWrite,
    ApiCall,
    /// A policy evaluation (allow or deny).
    PolicyCheck,
}

/// How the action turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Success,
    Error,
    Pending,
    /// The policy engine refused the action.
    Denied,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Agent => "agent",
            Actor::Human => "human",
            Actor::System => "system",
        }
    }
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ToolCall => "tool_call",
            ActionKind::HttpRequest => "http_request",
            ActionKind::DbQuery => "db_query",
            ActionKind::FileRead => "file_read",
            ActionKind::FileWrite => "file_write",
            ActionKind::ApiCall => "api_call",
            ActionKind::PolicyCheck => "policy_check",
        }
    }
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Success => "success",
            EventStatus::Error => "error",
            EventStatus::Pending => "pending",
            EventStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single audit event: one decision or one action outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier, generated at construction.
    pub event_id: Uuid,

    /// When the event was created (UTC, serialized with a `Z` suffix).
    pub timestamp: DateTime<Utc>,

    /// Which agent instance produced the event.
    pub agent_instance_id: String,

    /// Correlates events belonging to one run.
    pub trace_id: String,

    pub actor: Actor,
    pub action_type: ActionKind,

    /// The resource touched (URL, bucket, file path, action type, ...).
    pub resource: String,

    pub status: EventStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AuditEvent {
    /// Create a new event with a random UUID and the current timestamp.
    pub fn new(
        agent_instance_id: impl Into<String>,
        trace_id: impl Into<String>,
        actor: Actor,
        action_type: ActionKind,
        resource: impl Into<String>,
        status: EventStatus,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_instance_id: agent_instance_id.into(),
            trace_id: trace_id.into(),
            actor,
            action_type,
            resource: resource.into(),
            status,
            latency_ms: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the latency and return self (builder pattern).
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Replace the metadata map. Non-object values are stored under `"value"`.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = match metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self
    }

    /// Add one metadata entry and return self.
    pub fn with_metadata_entry(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AuditEvent {
        AuditEvent::new(
            "agent-1",
            "trace-1",
            Actor::Agent,
            ActionKind::ToolCall,
            "web_search",
            EventStatus::Success,
        )
    }

    #[test]
    fn wire_round_trip_preserves_identity_and_enums() {
        let event = sample()
            .with_latency_ms(342)
            .with_metadata(json!({"tool_name": "search"}));

        let json = serde_json::to_string(&event).expect("serialize");
        let restored: AuditEvent = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(event.event_id, restored.event_id);
        assert_eq!(event.actor, restored.actor);
        assert_eq!(event.action_type, restored.action_type);
        assert_eq!(event.status, restored.status);
        assert_eq!(event, restored);
    }

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(sample().event_id, sample().event_id);
    }

    #[test]
    fn timestamp_uses_z_suffix() {
        let value = serde_json::to_value(sample()).unwrap();
        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'), "timestamp {} should end in Z", ts);
    }

    #[test]
    fn enums_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&ActionKind::PolicyCheck).unwrap(),
            "\"policy_check\""
        );
        assert_eq!(
            serde_json::to_string(&ActionKind::HttpRequest).unwrap(),
            "\"http_request\""
        );
        assert_eq!(serde_json::to_string(&Actor::System).unwrap(), "\"system\"");
        assert_eq!(
            serde_json::to_string(&EventStatus::Denied).unwrap(),
            "\"denied\""
        );
        assert_eq!(ActionKind::FileWrite.to_string(), "file_write");
    }

    #[test]
    fn optional_fields_are_omitted_when_empty() {
        let value = serde_json::to_value(sample()).unwrap();
        assert!(value.get("latency_ms").is_none());
        assert!(value.get("metadata").is_none());

        let parsed: AuditEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.latency_ms, None);
        assert!(parsed.metadata.is_empty());
    }

    #[test]
    fn metadata_builders() {
        let event = sample()
            .with_metadata(json!({"a": 1}))
            .with_metadata_entry("b", "two");
        assert_eq!(event.metadata.get("a"), Some(&json!(1)));
        assert_eq!(event.metadata.get("b"), Some(&json!("two")));

        let scalar = sample().with_metadata(json!(5));
        assert_eq!(scalar.metadata.get("value"), Some(&json!(5)));
    }
}
