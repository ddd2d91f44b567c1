// context.rs — Typed request context for policy checks.
//
// Callers describe the action they are about to take with a small bag of
// key/value pairs (bucket name, region, environment, ...). Rule conditions
// are expressed with the same value type, so a condition and the context
// entry it constrains compare directly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single context or condition value.
///
/// `#[serde(untagged)]` lets YAML/JSON scalars and string lists map onto the
/// variants without an explicit type tag. Anything else (floats, maps, mixed
/// lists) lands in `Other` and only supports equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    /// Absent or explicit null.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Other(OtherValue),
}

/// An arbitrary JSON value compared by equality.
///
/// JSON numbers are never NaN, so equality is total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtherValue(pub serde_json::Value);

impl Eq for OtherValue {}

impl ContextValue {
    /// Borrow the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ContextValue::Null)
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Null => write!(f, "null"),
            ContextValue::Bool(b) => write!(f, "{}", b),
            ContextValue::Int(i) => write!(f, "{}", i),
            ContextValue::Str(s) => write!(f, "{}", s),
            ContextValue::List(items) => write!(f, "[{}]", items.join(", ")),
            ContextValue::Other(OtherValue(value)) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Str(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Str(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<i32> for ContextValue {
    fn from(value: i32) -> Self {
        ContextValue::Int(i64::from(value))
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(value: Vec<String>) -> Self {
        ContextValue::List(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        match serde_json::Number::from_f64(value) {
            Some(n) => ContextValue::Other(OtherValue(serde_json::Value::Number(n))),
            None => ContextValue::Null,
        }
    }
}

impl From<Vec<&str>> for ContextValue {
    fn from(value: Vec<&str>) -> Self {
        ContextValue::List(value.into_iter().map(str::to_string).collect())
    }
}

static NULL: ContextValue = ContextValue::Null;

/// The context an action is checked against.
///
/// Well-known keys have named accessors; everything else lives in the same
/// open map and is compared by exact equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionContext(BTreeMap<String, ContextValue>);

impl ActionContext {
    pub const BUCKET_NAME: &'static str = "bucket_name";
    pub const REGION: &'static str = "region";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry and return self (builder pattern).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a key. Missing keys read as [`ContextValue::Null`].
    pub fn get(&self, key: &str) -> &ContextValue {
        self.0.get(key).unwrap_or(&NULL)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn bucket_name(&self) -> Option<&str> {
        self.get(Self::BUCKET_NAME).as_str()
    }

    pub fn region(&self) -> Option<&str> {
        self.get(Self::REGION).as_str()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ActionContext
where
    K: Into<String>,
    V: Into<ContextValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One entry of a batch check: an action type plus its own context.
///
/// Serialized as a flat object, `{"type": "s3:PutObject", "bucket_name": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(flatten)]
    pub context: ActionContext,
}

impl BatchAction {
    pub fn new(action_type: impl Into<String>, context: ActionContext) -> Self {
        Self {
            action_type: action_type.into(),
            context,
        }
    }
}
