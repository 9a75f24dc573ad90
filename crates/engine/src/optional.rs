//! Optional-field policies.
//!
//! A chain is either required, in which case every selected instance is
//! checked, or tolerant of absent values. Tolerant chains skip absent
//! instances on the main stack and may substitute a default for them before
//! any main-stack item runs.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Zero-argument producer for default values.
pub type DefaultProducer = dyn Fn() -> Value + Send + Sync;

/// Value substituted for an absent optional field.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Producer(Arc<DefaultProducer>),
}

impl DefaultValue {
    /// Wraps a producer that is invoked once per defaulted instance.
    pub fn from_fn<F>(producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        DefaultValue::Producer(Arc::new(producer))
    }

    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Producer(producer) => producer(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultValue::Value(left), DefaultValue::Value(right)) => left == right,
            (DefaultValue::Producer(left), DefaultValue::Producer(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl From<Value> for DefaultValue {
    fn from(value: Value) -> Self {
        DefaultValue::Value(value)
    }
}

impl<'de> Deserialize<'de> for DefaultValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(DefaultValue::Value)
    }
}

/// Resolved tolerance flags for an optional chain.
///
/// Each flag widens what counts as absent; none of them narrows another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalPolicy {
    /// Treat `null`, `false`, `0`, and `""` as absent.
    pub check_falsy: bool,
    /// Treat `null` as absent.
    pub nullable: bool,
    /// Treat defined-but-empty values (`""`, `[]`, `{}`) as absent.
    pub defined: bool,
    pub default_value: Option<DefaultValue>,
}

impl OptionalPolicy {
    /// Returns true when `value` counts as absent under this policy.
    ///
    /// A missing value is always absent.
    pub fn is_absent(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return true;
        };
        (value.is_null() && (self.nullable || self.check_falsy))
            || (self.check_falsy && is_falsy(value))
            || (self.defined && is_empty(value))
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Whether a chain requires its fields or tolerates their absence.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Optional {
    #[default]
    Required,
    Tolerated(OptionalPolicy),
}

impl Optional {
    pub fn is_required(&self) -> bool {
        matches!(self, Optional::Required)
    }

    pub fn policy(&self) -> Option<&OptionalPolicy> {
        match self {
            Optional::Required => None,
            Optional::Tolerated(policy) => Some(policy),
        }
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.policy().and_then(|policy| policy.default_value.as_ref())
    }

    /// Required chains never consider a value absent-but-tolerated.
    pub fn tolerates(&self, value: Option<&Value>) -> bool {
        self.policy().is_some_and(|policy| policy.is_absent(value))
    }
}

/// Partial optional record merged over the all-false defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialOptional {
    #[serde(default, alias = "checkFalsy")]
    pub check_falsy: Option<bool>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub defined: Option<bool>,
    #[serde(default, rename = "default", alias = "default_value", alias = "defaultValue")]
    pub default_value: Option<DefaultValue>,
}

impl PartialOptional {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_falsy(mut self, check_falsy: bool) -> Self {
        self.check_falsy = Some(check_falsy);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn defined(mut self, defined: bool) -> Self {
        self.defined = Some(defined);
        self
    }

    pub fn default_value(mut self, default_value: impl Into<DefaultValue>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    fn merge(self) -> OptionalPolicy {
        OptionalPolicy {
            check_falsy: self.check_falsy.unwrap_or(false),
            nullable: self.nullable.unwrap_or(false),
            defined: self.defined.unwrap_or(false),
            default_value: self.default_value,
        }
    }
}

/// Caller-facing optional setting, normalized by [`OptionalSetting::resolve`].
///
/// `false` keeps the chain required, `true` tolerates absence with every flag
/// off, and a partial record overrides individual flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionalSetting {
    Flag(bool),
    Partial(PartialOptional),
}

impl Default for OptionalSetting {
    fn default() -> Self {
        OptionalSetting::Flag(false)
    }
}

impl OptionalSetting {
    pub fn resolve(self) -> Optional {
        match self {
            OptionalSetting::Flag(false) => Optional::Required,
            OptionalSetting::Flag(true) => Optional::Tolerated(OptionalPolicy::default()),
            OptionalSetting::Partial(partial) => Optional::Tolerated(partial.merge()),
        }
    }
}

impl From<bool> for OptionalSetting {
    fn from(flag: bool) -> Self {
        OptionalSetting::Flag(flag)
    }
}

impl From<PartialOptional> for OptionalSetting {
    fn from(partial: PartialOptional) -> Self {
        OptionalSetting::Partial(partial)
    }
}
