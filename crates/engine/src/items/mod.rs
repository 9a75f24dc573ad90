//! Work items: the units a chain executes per field instance.
//!
//! - [`ContextItem`] is the seam every item implements.
//! - [`ItemOutcome`] tells the runner whether to continue, store a new value,
//!   or halt the instance.
//! - The generic items here wrap caller-supplied functions; concrete
//!   validators and sanitizers live outside the engine.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use fieldchain_types::{InstanceKey, Location, Request};
use serde_json::Value;

use crate::context::Context;

mod bail;
mod condition;
mod sanitization;
mod validation;

pub use bail::{Bail, BailMode};
pub use condition::{ChainCondition, Condition, CustomCondition, PredicateFn};
pub use sanitization::{DefaultValueSanitizer, Sanitization, SanitizerFn};
pub use validation::{CustomValidation, DEFAULT_ERROR_MESSAGE, ValidatorFn};

/// Shared handle to a work item, as stored on a chain's stacks.
pub type ItemRef = Arc<dyn ContextItem>;

/// Positional metadata handed to every item invocation.
#[derive(Debug, Clone, Copy)]
pub struct Meta<'a> {
    pub req: &'a Request,
    pub location: Location,
    pub path: &'a str,
}

impl<'a> Meta<'a> {
    pub fn new(req: &'a Request, location: Location, path: &'a str) -> Self {
        Self { req, location, path }
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.location, self.path)
    }
}

/// Result of one item invocation on one instance.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Continue,
    /// Replace the instance value before the next item sees it.
    Sanitized(Value),
    /// Stop processing this instance on the current stack.
    Halt,
}

/// A unit of work run against one field instance at a time.
///
/// Items receive the shared run context, the instance's current value, and its
/// position. Returning `Err` is a defect and aborts the whole run; use
/// [`ItemOutcome::Halt`] to stop a single instance.
#[async_trait]
pub trait ContextItem: Send + Sync {
    async fn run(&self, context: &Context, value: Option<&Value>, meta: &Meta<'_>) -> Result<ItemOutcome>;
}
