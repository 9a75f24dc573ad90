//! Error types for building and running chains.

use fieldchain_types::InstanceKey;
use fieldchain_util::RuntimeError;
use thiserror::Error;

/// Errors surfaced by chain construction and execution.
///
/// A halted field instance is never reported here; halting is an ordinary
/// [`ItemOutcome`](crate::ItemOutcome). Everything in this enum is either a
/// usage mistake caught at build time or a defect that aborted a run.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("unsupported condition: expected a predicate or a chain, found {found}")]
    UnsupportedCondition { found: String },

    #[error("unknown work item '{name}'")]
    UnknownItem { name: String },

    #[error("unknown predicate '{name}'")]
    UnknownPredicate { name: String },

    #[error("invalid chain definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("field selection failed")]
    Selection(#[source] anyhow::Error),

    #[error("work item failed on {key}")]
    Item {
        key: InstanceKey,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ChainError {
    /// Returns true for errors raised while assembling a chain, before any run.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ChainError::UnsupportedCondition { .. }
                | ChainError::UnknownItem { .. }
                | ChainError::UnknownPredicate { .. }
                | ChainError::InvalidDefinition { .. }
        )
    }

    /// Instance whose work item failed, if the error came from one.
    pub fn instance(&self) -> Option<&InstanceKey> {
        match self {
            ChainError::Item { key, .. } => Some(key),
            _ => None,
        }
    }
}
