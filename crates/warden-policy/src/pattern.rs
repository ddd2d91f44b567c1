// pattern.rs — Action pattern and condition matching.
//
// Action patterns are tried in this order:
//   1. `*` matches everything; an exact string matches itself
//   2. `prefix:*` matches by prefix (`s3:*` matches `s3:CreateBucket`)
//   3. anything else is a glob (`*`, `?`, `[...]`)
//
// Runs of `*` collapse to a single `*` before compiling, so `iam:**` means
// `iam:*`. Documents are checked with `check_pattern` at load, so a pattern
// that still fails to compile never reaches the matcher from a loaded policy.

use std::borrow::Cow;
use std::collections::BTreeMap;

use glob::{Pattern, PatternError};

use crate::context::{ActionContext, ContextValue};

/// Condition key whose value is a glob applied to the context's `bucket_name`.
pub const BUCKET_NAME_PATTERN: &str = "bucket_name_pattern";

/// Condition key whose value is one allowed region or a list of them.
pub const REGION: &str = "region";

/// Check whether an action type matches a rule's action pattern.
pub fn matches_action(pattern: &str, action_type: &str) -> bool {
    if pattern == action_type {
        return true;
    }
    let pattern = collapse_stars(pattern);
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*').filter(|p| p.ends_with(':')) {
        return action_type.starts_with(prefix);
    }
    glob_match(&pattern, action_type)
}

/// Check whether every condition is satisfied by the context.
///
/// An empty condition map always passes.
pub fn conditions_match(conditions: &BTreeMap<String, ContextValue>, context: &ActionContext) -> bool {
    conditions
        .iter()
        .all(|(key, expected)| condition_matches(key, expected, context))
}

fn condition_matches(key: &str, expected: &ContextValue, context: &ActionContext) -> bool {
    match key {
        BUCKET_NAME_PATTERN => {
            let Some(pattern) = expected.as_str() else {
                return false;
            };
            // A missing bucket name is matched as the empty string.
            match context.get(ActionContext::BUCKET_NAME) {
                ContextValue::Null => glob_match(pattern, ""),
                ContextValue::Str(name) => glob_match(pattern, name),
                _ => false,
            }
        }
        REGION => {
            let actual = context.get(ActionContext::REGION);
            match expected {
                ContextValue::List(allowed) => actual
                    .as_str()
                    .is_some_and(|region| allowed.iter().any(|a| a == region)),
                single => actual == single,
            }
        }
        other => context.get(other) == expected,
    }
}

/// Verify that a rule or condition pattern compiles.
pub fn check_pattern(pattern: &str) -> Result<(), PatternError> {
    compile(pattern).map(|_| ())
}

fn compile(pattern: &str) -> Result<Pattern, PatternError> {
    Pattern::new(&collapse_stars(pattern))
}

/// `**` has path-component meaning in `glob`; here it is just `*`.
fn collapse_stars(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains("**") {
        return Cow::Borrowed(pattern);
    }
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && out.ends_with('*') {
            continue;
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Glob-match without path-separator semantics, so `*` spans any character.
/// A pattern that does not compile matches nothing.
fn glob_match(pattern: &str, target: &str) -> bool {
    match compile(pattern) {
        Ok(p) => p.matches(target),
        Err(_) => false,
    }
}
