// error.rs — Error types for the policy subsystem.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::PolicyDecision;

/// Errors raised while loading a policy document.
///
/// These are fatal at enforcer construction: a guard with no policy must not
/// silently fall back to allowing or denying everything.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file does not exist.
    #[error("policy file not found: {path}")]
    NotFound { path: PathBuf },

    /// The policy file exists but could not be read.
    #[error("failed to read policy file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The policy file is not valid YAML, or is missing required fields.
    #[error("failed to parse policy YAML at {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The policy file is not valid JSON, or is missing required fields.
    #[error("failed to parse policy JSON at {path}: {source}")]
    ParseJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The document parsed but violates the policy schema.
    #[error("invalid policy: {reason}")]
    Invalid { reason: String },
}

/// A denial converted into an error, for call sites that want to fail fast.
///
/// Carries the full decision so callers can still report the matched rule.
#[derive(Debug, Clone, Error)]
#[error("policy violation: {}", .decision.reason)]
pub struct PolicyViolation {
    pub decision: PolicyDecision,
}

impl PolicyViolation {
    pub fn new(decision: PolicyDecision) -> Self {
        Self { decision }
    }

    /// The decision that caused the violation.
    pub fn decision(&self) -> &PolicyDecision {
        &self.decision
    }
}
