use std::{fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{ContextItem, ItemOutcome, Meta};
use crate::{context::Context, optional::DefaultValue};

pub type SanitizerFn = dyn Fn(Option<&Value>) -> Value + Send + Sync;

/// Replaces the instance value with the result of a pure function.
#[derive(Clone)]
pub struct Sanitization {
    sanitizer: Arc<SanitizerFn>,
}

impl Sanitization {
    pub fn new<F>(sanitizer: F) -> Self
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        Self {
            sanitizer: Arc::new(sanitizer),
        }
    }
}

impl fmt::Debug for Sanitization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sanitization(..)")
    }
}

#[async_trait]
impl ContextItem for Sanitization {
    async fn run(&self, _context: &Context, value: Option<&Value>, _meta: &Meta<'_>) -> Result<ItemOutcome> {
        Ok(ItemOutcome::Sanitized((self.sanitizer)(value)))
    }
}

/// Pre-stack item that materializes an optional chain's default value.
///
/// The runner only hands it instances that are absent under the chain's
/// optional policy, so it substitutes unconditionally.
#[derive(Debug, Clone)]
pub struct DefaultValueSanitizer {
    default: DefaultValue,
}

impl DefaultValueSanitizer {
    pub fn new(default: DefaultValue) -> Self {
        Self { default }
    }
}

#[async_trait]
impl ContextItem for DefaultValueSanitizer {
    async fn run(&self, _context: &Context, _value: Option<&Value>, _meta: &Meta<'_>) -> Result<ItemOutcome> {
        Ok(ItemOutcome::Sanitized(self.default.produce()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextBuilder;
    use fieldchain_types::{Location, Request};
    use serde_json::json;

    #[tokio::test]
    async fn sanitizers_return_replacement_values() {
        let context = Context::new(Arc::new(ContextBuilder::new().build()));
        let request = Request::new();
        let meta = Meta::new(&request, Location::Query, "name");

        let trim = Sanitization::new(|value| match value {
            Some(Value::String(text)) => json!(text.trim()),
            other => other.cloned().unwrap_or(Value::Null),
        });
        assert_eq!(
            trim.run(&context, Some(&json!("  ada  ")), &meta).await.expect("run"),
            ItemOutcome::Sanitized(json!("ada"))
        );

        let default = DefaultValueSanitizer::new(DefaultValue::from_fn(|| json!([])));
        assert_eq!(default.run(&context, None, &meta).await.expect("run"), ItemOutcome::Sanitized(json!([])));
    }
}
