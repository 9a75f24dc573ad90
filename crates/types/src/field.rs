//! Field instances and the errors recorded against them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Location;

/// One concrete occurrence of a declared field within a request.
///
/// A single declared name can resolve to many instances when it contains
/// wildcards (`items.*.id`). `value` is `None` when the field is absent from
/// the request, which is distinct from an explicit JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInstance {
    /// Request area the instance was found in.
    pub location: Location,
    /// Resolved path of the instance.
    pub path: String,
    /// Path as declared on the chain, before wildcard expansion.
    pub original_path: String,
    /// Current value, possibly replaced by sanitizers.
    pub value: Option<Value>,
    /// Value as read from the request.
    pub original_value: Option<Value>,
}

impl FieldInstance {
    /// Creates an instance whose current value equals its original value.
    pub fn new(location: Location, path: impl Into<String>, original_path: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            location,
            path: path.into(),
            original_path: original_path.into(),
            original_value: value.clone(),
            value,
        }
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.location, self.path.clone())
    }
}

/// Identity of a field instance within one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub location: Location,
    pub path: String,
}

impl InstanceKey {
    pub fn new(location: Location, path: impl Into<String>) -> Self {
        Self {
            location,
            path: path.into(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.location, self.path)
    }
}

/// A failure recorded by a work item against one field instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub location: Location,
    pub path: String,
    /// Value the failing item saw. Omitted when the field was absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Message attached by the item or the chain.
    #[serde(rename = "msg")]
    pub message: Value,
}

impl FieldError {
    pub fn new(location: Location, path: impl Into<String>, value: Option<Value>, message: impl Into<Value>) -> Self {
        Self {
            location,
            path: path.into(),
            value,
            message: message.into(),
        }
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.location, self.path.clone())
    }
}
