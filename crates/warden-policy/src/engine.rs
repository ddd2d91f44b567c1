// engine.rs — Policy decision engine.
//
// Every guarded action passes through `PolicyEnforcer::check()`, which runs a
// fixed pipeline and stops at the first stage that decides:
//
// 1. Does a denied_actions rule match (pattern + conditions)? → Deny
// 2. Has a matching rate limit's budget for this action type run out? → Deny
// 3. Does an allowed_actions rule match? First match wins. No match → Deny
// 4. Take requires_approval from the matched allow rule
// 5. Count the use against the action type's budget → Allow
//
// A denial is a normal return value, not an error. Callers that prefer to
// bail out use `require()`, which turns a denial into a `PolicyViolation`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::context::{ActionContext, BatchAction};
use crate::document::{PolicyDocument, RateLimit, RiskLevel, Rule};
use crate::error::{PolicyError, PolicyViolation};
use crate::pattern::{conditions_match, matches_action};
use crate::rate_limit::{InMemoryRateLimits, RateLimitStore};

/// The rule or limit that produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchedRule {
    /// A denied_actions entry matched.
    Deny(Rule),
    /// A rate limit's budget was exhausted.
    RateLimit(RateLimit),
    /// An allowed_actions entry matched.
    Allow(Rule),
}

/// The result of a policy check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    /// Human-readable explanation naming the matched rule or limit.
    pub reason: String,
    /// Only meaningful when `allowed` is true.
    pub requires_approval: bool,
    pub matched_rule: Option<MatchedRule>,
}

impl PolicyDecision {
    fn allow(reason: String, requires_approval: bool, matched_rule: Option<MatchedRule>) -> Self {
        Self {
            allowed: true,
            reason,
            requires_approval,
            matched_rule,
        }
    }

    fn deny(reason: String, matched_rule: Option<MatchedRule>) -> Self {
        Self {
            allowed: false,
            reason,
            requires_approval: false,
            matched_rule,
        }
    }

    /// Split into a tagged verdict.
    pub fn into_verdict(self) -> Verdict {
        if self.allowed {
            Verdict::Allowed(self)
        } else {
            Verdict::Denied(self)
        }
    }

    /// `Ok` when allowed, `Err(PolicyViolation)` carrying the decision otherwise.
    pub fn into_result(self) -> Result<PolicyDecision, PolicyViolation> {
        self.into_verdict().into_result()
    }
}

/// A decision tagged by outcome, for exhaustive matching at call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed(PolicyDecision),
    Denied(PolicyDecision),
}

impl Verdict {
    pub fn decision(&self) -> &PolicyDecision {
        match self {
            Verdict::Allowed(d) | Verdict::Denied(d) => d,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed(_))
    }

    pub fn into_result(self) -> Result<PolicyDecision, PolicyViolation> {
        match self {
            Verdict::Allowed(d) => Ok(d),
            Verdict::Denied(d) => Err(PolicyViolation::new(d)),
        }
    }
}

/// One stage of the evaluation pipeline, as recorded by `check_with_trace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Which stage ran (e.g., "deny_scan", "rate_limit", "allow_scan").
    pub check: String,
    /// What the stage found (e.g., "passed", "denied by 'iam:*'").
    pub outcome: String,
    /// Whether this stage produced the final decision.
    pub terminal: bool,
}

/// A decision together with the stages that led to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationTrace {
    pub decision: PolicyDecision,
    pub steps: Vec<EvaluationStep>,
}

/// Collects steps when tracing is on; a no-op otherwise.
struct Tracer {
    steps: Option<Vec<EvaluationStep>>,
}

impl Tracer {
    fn record(&mut self, check: &str, terminal: bool, outcome: impl FnOnce() -> String) {
        if let Some(steps) = self.steps.as_mut() {
            steps.push(EvaluationStep {
                check: check.to_string(),
                outcome: outcome(),
                terminal,
            });
        }
    }
}

/// Evaluates action requests against one policy document.
///
/// Owns the rate-limit counters. The counter lock is held for a whole
/// evaluation, so the budget read in stage 2 and the increment in stage 5
/// are one atomic step even with concurrent callers.
pub struct PolicyEnforcer {
    document: PolicyDocument,
    rates: Mutex<Box<dyn RateLimitStore>>,
}

impl PolicyEnforcer {
    /// Build an enforcer with in-memory rate counters.
    pub fn new(document: PolicyDocument) -> Self {
        Self::with_store(document, Box::new(InMemoryRateLimits::new()))
    }

    /// Build an enforcer backed by a custom counter store.
    pub fn with_store(document: PolicyDocument, store: Box<dyn RateLimitStore>) -> Self {
        Self {
            document,
            rates: Mutex::new(store),
        }
    }

    /// Load a policy file and build an enforcer from it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        Ok(Self::new(PolicyDocument::load(path)?))
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    /// Check whether an action is allowed. Counts the use if it is.
    pub fn check(&self, action_type: &str, context: &ActionContext) -> PolicyDecision {
        let mut tracer = Tracer { steps: None };
        self.evaluate(action_type, context, &mut tracer)
    }

    /// Same as `check()`, also returning every stage that ran.
    pub fn check_with_trace(&self, action_type: &str, context: &ActionContext) -> EvaluationTrace {
        let mut tracer = Tracer {
            steps: Some(Vec::new()),
        };
        let decision = self.evaluate(action_type, context, &mut tracer);
        EvaluationTrace {
            decision,
            steps: tracer.steps.unwrap_or_default(),
        }
    }

    /// Check and convert a denial into an error.
    pub fn require(
        &self,
        action_type: &str,
        context: &ActionContext,
    ) -> Result<PolicyDecision, PolicyViolation> {
        self.check(action_type, context).into_result()
    }

    /// Check a sequence of actions, each with its own context.
    ///
    /// The first denial is returned as-is and later actions are not
    /// evaluated (nor counted). If everything is allowed, the batch needs
    /// approval when any single action does.
    pub fn check_batch(&self, actions: &[BatchAction]) -> PolicyDecision {
        let mut requires_approval = false;
        for action in actions {
            let decision = self.check(&action.action_type, &action.context);
            if !decision.allowed {
                return decision;
            }
            requires_approval |= decision.requires_approval;
        }
        PolicyDecision::allow(
            format!("Batch of {} actions allowed", actions.len()),
            requires_approval,
            None,
        )
    }

    /// Clear every rate-limit counter.
    pub fn reset_rate_limits(&self) {
        self.rates().reset();
        tracing::debug!(policy = %self.document.name, "rate limit counters reset");
    }

    /// How many times an action type has been allowed since the last reset.
    pub fn rate_count(&self, action_type: &str) -> u64 {
        self.rates().count(action_type)
    }

    /// Actions that may be auto-approved at a risk level.
    ///
    /// The first auto_approve entry for the level wins.
    pub fn auto_approve_actions(&self, risk_level: RiskLevel) -> &[String] {
        self.document
            .auto_approve
            .iter()
            .find(|rule| rule.risk_level == risk_level)
            .map(|rule| rule.actions.as_slice())
            .unwrap_or(&[])
    }

    pub fn can_auto_approve(&self, action_type: &str, risk_level: RiskLevel) -> bool {
        self.auto_approve_actions(risk_level)
            .iter()
            .any(|a| a == action_type)
    }

    fn rates(&self) -> MutexGuard<'_, Box<dyn RateLimitStore>> {
        // Counters are plain integers; a panic elsewhere cannot leave them torn.
        self.rates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evaluate(
        &self,
        action_type: &str,
        context: &ActionContext,
        tracer: &mut Tracer,
    ) -> PolicyDecision {
        let doc = &self.document;

        // Stage 1: deny rules.
        if let Some(rule) = first_match(&doc.denied_actions, action_type, context) {
            tracer.record("deny_scan", true, || {
                format!("denied by '{}'", rule.action_pattern)
            });
            tracing::debug!(action = action_type, rule = %rule.action_pattern, "denied by rule");
            return PolicyDecision::deny(
                format!("Action denied by policy rule: {}", rule.action_pattern),
                Some(MatchedRule::Deny(rule.clone())),
            );
        }
        tracer.record("deny_scan", false, || {
            format!("passed: {} rule(s) checked", doc.denied_actions.len())
        });

        // Held until the allow stage has counted this use.
        let mut rates = self.rates();

        // Stage 2: rate limits, keyed by the literal action type.
        let count = rates.count(action_type);
        for limit in doc
            .rate_limits
            .iter()
            .filter(|l| matches_action(&l.action_pattern, action_type))
        {
            let max = u64::from(limit.max_per_hour);
            if count >= max {
                tracer.record("rate_limit", true, || {
                    format!("exceeded '{}': {}/{}", limit.action_pattern, count, max)
                });
                tracing::debug!(action = action_type, count, max, "rate limit exceeded");
                return PolicyDecision::deny(
                    format!(
                        "Rate limit exceeded: {} ({}/{} per hour)",
                        action_type, count, max
                    ),
                    Some(MatchedRule::RateLimit(limit.clone())),
                );
            }
        }
        tracer.record("rate_limit", false, || {
            format!("passed: {} use(s) so far", count)
        });

        // Stage 3: allow rules, first match wins.
        let Some(rule) = first_match(&doc.allowed_actions, action_type, context) else {
            tracer.record("allow_scan", true, || "no allow rule matched".to_string());
            tracing::debug!(action = action_type, "not in allowed_actions");
            return PolicyDecision::deny(
                format!("Action not in allowed_actions: {}", action_type),
                None,
            );
        };
        tracer.record("allow_scan", false, || {
            format!("matched '{}'", rule.action_pattern)
        });

        // Stage 4: approval gate.
        let requires_approval = rule.requires_approval;
        tracer.record("approval", false, || {
            if requires_approval {
                "approval required".to_string()
            } else {
                "no approval required".to_string()
            }
        });

        // Stage 5: count and allow.
        rates.record(action_type);
        drop(rates);
        tracer.record("allow", true, || "allowed".to_string());
        tracing::debug!(
            action = action_type,
            rule = %rule.action_pattern,
            requires_approval,
            "allowed"
        );

        PolicyDecision::allow(
            format!("Allowed by policy rule: {}", rule.action_pattern),
            requires_approval,
            Some(MatchedRule::Allow(rule.clone())),
        )
    }
}

fn first_match<'a>(rules: &'a [Rule], action_type: &str, context: &ActionContext) -> Option<&'a Rule> {
    rules.iter().find(|rule| {
        matches_action(&rule.action_pattern, action_type)
            && conditions_match(&rule.conditions, context)
    })
}
