use std::{fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use fieldchain_types::FieldError;
use serde_json::Value;
use tracing::trace;

use super::{ContextItem, ItemOutcome, Meta};
use crate::context::Context;

/// Message recorded when neither the item nor the chain provides one.
pub const DEFAULT_ERROR_MESSAGE: &str = "Invalid value";

pub type ValidatorFn = dyn Fn(Option<&Value>, &Meta<'_>) -> Result<bool> + Send + Sync;

/// Records a [`FieldError`] when the validator returns false or fails.
///
/// Validation never halts by itself; pair it with
/// [`ContextBuilder::bail_on_errors`](crate::ContextBuilder::bail_on_errors)
/// to stop an instance after its first failure.
#[derive(Clone)]
pub struct CustomValidation {
    validator: Arc<ValidatorFn>,
    message: Option<Value>,
}

impl CustomValidation {
    pub fn new<F>(validator: F) -> Self
    where
        F: Fn(Option<&Value>, &Meta<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        Self {
            validator: Arc::new(validator),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<Value>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Debug for CustomValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValidation").field("message", &self.message).finish_non_exhaustive()
    }
}

#[async_trait]
impl ContextItem for CustomValidation {
    async fn run(&self, context: &Context, value: Option<&Value>, meta: &Meta<'_>) -> Result<ItemOutcome> {
        let passed = match (self.validator)(value, meta) {
            Ok(passed) => passed,
            Err(error) => {
                trace!(instance = %meta.key(), error = %error, "validator failed");
                false
            }
        };
        if !passed {
            let message = self
                .message
                .clone()
                .or_else(|| context.message().cloned())
                .unwrap_or_else(|| Value::from(DEFAULT_ERROR_MESSAGE));
            context.add_error(FieldError::new(meta.location, meta.path, value.cloned(), message));
        }
        Ok(ItemOutcome::Continue)
    }
}
