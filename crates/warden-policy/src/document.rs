// document.rs — Policy document model and loading.
//
// A policy document is a YAML (or JSON) file declaring, in order:
// which actions are denied, which are rate limited, which are allowed (and
// whether they need a human approval gate), and which may be auto-approved
// at a given risk level. It is loaded once and never mutated.
//
// ```yaml
// name: s3-lifecycle
// version: 1
// allowed_actions:
//   - type: "s3:CreateBucket"
//     conditions:
//       bucket_name_pattern: "demo-*"
//       region: [us-east-1, us-west-2]
//   - type: "s3:DeleteBucket"
//     requires_approval: true
// denied_actions:
//   - type: "iam:*"
// rate_limits:
//   - action: "s3:PutObject"
//     max_per_hour: 100
// auto_approve:
//   - risk_level: low
//     actions: ["s3:ListBuckets"]
// ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::ContextValue;
use crate::error::PolicyError;
use crate::pattern::{check_pattern, BUCKET_NAME_PATTERN};

/// An allow or deny rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Action pattern: exact, `*`, `prefix:*`, or a glob.
    #[serde(rename = "type")]
    pub action_pattern: String,

    /// Conditions the request context must satisfy. All must pass.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, ContextValue>,

    /// Only meaningful on allow rules.
    #[serde(default, skip_serializing_if = "is_false")]
    pub requires_approval: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Rule {
    pub fn new(action_pattern: impl Into<String>) -> Self {
        Self {
            action_pattern: action_pattern.into(),
            conditions: BTreeMap::new(),
            requires_approval: false,
        }
    }

    pub fn with_condition(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

/// A per-action hourly budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    #[serde(rename = "action")]
    pub action_pattern: String,
    pub max_per_hour: u32,
}

impl RateLimit {
    pub fn new(action_pattern: impl Into<String>, max_per_hour: u32) -> Self {
        Self {
            action_pattern: action_pattern.into(),
            max_per_hour,
        }
    }
}

/// Risk classification used by auto-approval rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!(
                "unknown risk level '{}' (expected low, medium or high)",
                other
            )),
        }
    }
}

/// Actions that may skip the approval gate at a given risk level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoApproveRule {
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// A parsed policy document. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub name: String,
    pub version: i64,
    #[serde(default)]
    pub allowed_actions: Vec<Rule>,
    #[serde(default)]
    pub denied_actions: Vec<Rule>,
    #[serde(default)]
    pub rate_limits: Vec<RateLimit>,
    #[serde(default)]
    pub auto_approve: Vec<AutoApproveRule>,
}

/// The same unconditional pattern appears in both allow and deny lists.
///
/// Deny always wins, so the allow rule is dead weight and usually a mistake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConflict {
    pub action_pattern: String,
}

impl fmt::Display for RuleConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is both allowed and denied without conditions (deny wins)",
            self.action_pattern
        )
    }
}

impl PolicyDocument {
    /// An empty document: nothing allowed, nothing denied.
    pub fn new(name: impl Into<String>, version: i64) -> Self {
        Self {
            name: name.into(),
            version,
            allowed_actions: Vec::new(),
            denied_actions: Vec::new(),
            rate_limits: Vec::new(),
            auto_approve: Vec::new(),
        }
    }

    /// Load a policy from disk.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PolicyError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let data = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let document: PolicyDocument = if is_json {
            serde_json::from_str(&data).map_err(|source| PolicyError::ParseJson {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&data).map_err(|source| PolicyError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })?
        };
        document.validate()?;

        tracing::info!(
            policy = %document.name,
            version = document.version,
            allowed = document.allowed_actions.len(),
            denied = document.denied_actions.len(),
            rate_limits = document.rate_limits.len(),
            "loaded policy from {}",
            path.display()
        );
        Ok(document)
    }

    /// Parse a policy from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument =
            serde_yaml::from_str(yaml).map_err(|source| PolicyError::ParseYaml {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        document.validate()?;
        Ok(document)
    }

    /// Parse a policy from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument =
            serde_json::from_str(json).map_err(|source| PolicyError::ParseJson {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        document.validate()?;
        Ok(document)
    }

    /// Check schema constraints serde cannot express.
    ///
    /// Every action pattern and `bucket_name_pattern` must compile, so a typo
    /// in a deny rule is a load error rather than a rule that never matches.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(invalid("'name' cannot be empty"));
        }
        for (i, rule) in self.allowed_actions.iter().enumerate() {
            validate_rule(rule, &format!("allowed_actions[{}]", i))?;
        }
        for (i, rule) in self.denied_actions.iter().enumerate() {
            validate_rule(rule, &format!("denied_actions[{}]", i))?;
        }
        for (i, limit) in self.rate_limits.iter().enumerate() {
            validate_pattern(&limit.action_pattern, &format!("rate_limits[{}].action", i))?;
            if limit.max_per_hour == 0 {
                return Err(invalid(format!(
                    "rate_limits[{}].max_per_hour must be positive",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Unconditional patterns that are both allowed and denied.
    pub fn conflicts(&self) -> Vec<RuleConflict> {
        let mut conflicts: Vec<RuleConflict> = Vec::new();
        for allow in self.allowed_actions.iter().filter(|r| r.conditions.is_empty()) {
            let denied = self.denied_actions.iter().any(|deny| {
                deny.conditions.is_empty() && deny.action_pattern == allow.action_pattern
            });
            if denied
                && !conflicts
                    .iter()
                    .any(|c| c.action_pattern == allow.action_pattern)
            {
                conflicts.push(RuleConflict {
                    action_pattern: allow.action_pattern.clone(),
                });
            }
        }
        conflicts
    }
}

fn validate_rule(rule: &Rule, location: &str) -> Result<(), PolicyError> {
    validate_pattern(&rule.action_pattern, &format!("{}.type", location))?;
    match rule.conditions.get(BUCKET_NAME_PATTERN) {
        None => Ok(()),
        Some(ContextValue::Str(pattern)) => validate_pattern(
            pattern,
            &format!("{}.conditions.{}", location, BUCKET_NAME_PATTERN),
        ),
        Some(_) => Err(invalid(format!(
            "{}.conditions.{} must be a string",
            location, BUCKET_NAME_PATTERN
        ))),
    }
}

fn validate_pattern(pattern: &str, location: &str) -> Result<(), PolicyError> {
    if pattern.is_empty() {
        return Err(invalid(format!("{} is empty", location)));
    }
    check_pattern(pattern)
        .map_err(|e| invalid(format!("{} '{}' is not a valid pattern: {}", location, pattern, e)))
}

fn invalid(reason: impl Into<String>) -> PolicyError {
    PolicyError::Invalid {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FULL_POLICY: &str = r#"
name: s3-lifecycle
version: 2
allowed_actions:
  - type: "s3:CreateBucket"
    conditions:
      bucket_name_pattern: "demo-*"
      region: [us-east-1, us-west-2]
  - type: "s3:DeleteBucket"
    requires_approval: true
denied_actions:
  - type: "iam:*"
rate_limits:
  - action: "s3:PutObject"
    max_per_hour: 100
auto_approve:
  - risk_level: low
    actions: ["s3:ListBuckets"]
"#;

    #[test]
    fn parses_full_document() {
        let doc = PolicyDocument::from_yaml_str(FULL_POLICY).unwrap();
        assert_eq!(doc.name, "s3-lifecycle");
        assert_eq!(doc.version, 2);
        assert_eq!(doc.allowed_actions.len(), 2);
        assert!(!doc.allowed_actions[0].requires_approval);
        assert!(doc.allowed_actions[1].requires_approval);
        assert_eq!(
            doc.allowed_actions[0].conditions.get("region"),
            Some(&ContextValue::from(vec!["us-east-1", "us-west-2"]))
        );
        assert_eq!(doc.denied_actions[0].action_pattern, "iam:*");
        assert_eq!(doc.rate_limits[0], RateLimit::new("s3:PutObject", 100));
        assert_eq!(doc.auto_approve[0].risk_level, RiskLevel::Low);
    }

    #[test]
    fn optional_sections_default_to_empty() {
        let doc = PolicyDocument::from_yaml_str("name: minimal\nversion: 1\n").unwrap();
        assert!(doc.allowed_actions.is_empty());
        assert!(doc.denied_actions.is_empty());
        assert!(doc.rate_limits.is_empty());
        assert!(doc.auto_approve.is_empty());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = PolicyDocument::from_yaml_str("version: 1\n").unwrap_err();
        assert!(matches!(err, PolicyError::ParseYaml { .. }));

        let err = PolicyDocument::from_yaml_str("name: x\n").unwrap_err();
        assert!(matches!(err, PolicyError::ParseYaml { .. }));
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let yaml = "name: x\nversion: 1\nrate_limits:\n  - action: a\n    max_per_hour: 0\n";
        match PolicyDocument::from_yaml_str(yaml) {
            Err(PolicyError::Invalid { reason }) => assert!(reason.contains("max_per_hour")),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn unknown_risk_level_is_rejected() {
        let yaml = "name: x\nversion: 1\nauto_approve:\n  - risk_level: extreme\n    actions: []\n";
        assert!(PolicyDocument::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn uncompilable_deny_pattern_is_rejected_at_load() {
        let yaml = "name: x\nversion: 1\ndenied_actions:\n  - type: \"s3:[\"\n";
        match PolicyDocument::from_yaml_str(yaml) {
            Err(PolicyError::Invalid { reason }) => {
                assert!(reason.contains("denied_actions[0].type"), "{}", reason)
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn bucket_pattern_must_compile() {
        let yaml = r#"
name: x
version: 1
allowed_actions:
  - type: "s3:CreateBucket"
    conditions:
      bucket_name_pattern: "demo-[a"
"#;
        assert!(matches!(
            PolicyDocument::from_yaml_str(yaml),
            Err(PolicyError::Invalid { .. })
        ));
    }

    #[test]
    fn double_star_patterns_load() {
        let yaml = r#"
name: x
version: 1
allowed_actions:
  - type: "s3:CreateBucket"
    conditions:
      bucket_name_pattern: "demo-**"
denied_actions:
  - type: "iam:**"
"#;
        assert!(PolicyDocument::from_yaml_str(yaml).is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(
            PolicyDocument::from_yaml_str("name: \"\"\nversion: 1\n"),
            Err(PolicyError::Invalid { .. })
        ));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = PolicyDocument::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, PolicyError::NotFound { .. }));
    }

    #[test]
    fn load_yaml_and_json_files() {
        let dir = tempdir().unwrap();

        let yaml_path = dir.path().join("policy.yaml");
        fs::write(&yaml_path, FULL_POLICY).unwrap();
        let from_yaml = PolicyDocument::load(&yaml_path).unwrap();

        let json_path = dir.path().join("policy.json");
        fs::write(&json_path, serde_json::to_string(&from_yaml).unwrap()).unwrap();
        let from_json = PolicyDocument::load(&json_path).unwrap();

        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn malformed_json_reports_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PolicyDocument::load(&path),
            Err(PolicyError::ParseJson { .. })
        ));
    }

    #[test]
    fn conflicts_only_flag_unconditional_overlap() {
        let mut doc = PolicyDocument::new("c", 1);
        doc.allowed_actions = vec![
            Rule::new("s3:DeleteBucket"),
            Rule::new("s3:CreateBucket").with_condition("bucket_name_pattern", "demo-*"),
        ];
        doc.denied_actions = vec![Rule::new("s3:DeleteBucket"), Rule::new("s3:CreateBucket")];

        let conflicts = doc.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].action_pattern, "s3:DeleteBucket");
    }

    #[test]
    fn risk_level_parses_from_str() {
        assert_eq!("medium".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert!("MEDIUM".parse::<RiskLevel>().is_err());
    }
}
