//! # warden-policy
//!
//! Declarative action policies for autonomous agents.
//!
//! A [`PolicyDocument`] lists denied actions, rate limits, allowed actions
//! (optionally gated behind human approval) and auto-approval sets. The
//! [`PolicyEnforcer`] evaluates each action an agent is about to take and
//! returns a [`PolicyDecision`].
//!
//! ## Key invariants
//!
//! - **Deny wins**: a matching deny rule beats any allow rule.
//! - **Default deny**: an action no allow rule matches is denied.
//! - **Budgets count allows only**: a use is counted against the action
//!   type's hourly budget only when the check allows it.
//!
//! ## Quick Example
//!
//! ```rust
//! use warden_policy::{ActionContext, PolicyDocument, PolicyEnforcer};
//!
//! let policy = PolicyDocument::from_yaml_str(r#"
//! name: demo
//! version: 1
//! allowed_actions:
//!   - type: "s3:CreateBucket"
//!     conditions:
//!       bucket_name_pattern: "demo-*"
//! "#).unwrap();
//! let enforcer = PolicyEnforcer::new(policy);
//!
//! let ctx = ActionContext::new().with("bucket_name", "demo-1");
//! assert!(enforcer.check("s3:CreateBucket", &ctx).allowed);
//! ```

pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod rate_limit;

pub use context::{ActionContext, BatchAction, ContextValue, OtherValue};
pub use document::{AutoApproveRule, PolicyDocument, RateLimit, RiskLevel, Rule, RuleConflict};
pub use engine::{
    EvaluationStep, EvaluationTrace, MatchedRule, PolicyDecision, PolicyEnforcer, Verdict,
};
pub use error::{PolicyError, PolicyViolation};
pub use rate_limit::{InMemoryRateLimits, RateLimitStore};
