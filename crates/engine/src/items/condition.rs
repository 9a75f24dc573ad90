use std::{fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use super::{ContextItem, ItemOutcome, Meta};
use crate::{context::Context, executor::ContextRunner};

/// Synchronous predicate evaluated against an instance's current value.
pub type PredicateFn = dyn Fn(Option<&Value>, &Meta<'_>) -> Result<bool> + Send + Sync;

/// Gate accepted by [`ContextBuilder::if_`](crate::ContextBuilder::if_).
#[derive(Clone)]
pub enum Condition {
    Predicate(Arc<PredicateFn>),
    /// Another chain, run as a dry run against the same request.
    Chain(ContextRunner),
}

impl Condition {
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(Option<&Value>, &Meta<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(predicate))
    }
}

impl From<ContextRunner> for Condition {
    fn from(runner: ContextRunner) -> Self {
        Condition::Chain(runner)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
            Condition::Chain(runner) => f.debug_tuple("Chain").field(runner).finish(),
        }
    }
}

/// Halts instances for which the predicate is false or fails.
#[derive(Clone)]
pub struct CustomCondition {
    predicate: Arc<PredicateFn>,
}

impl CustomCondition {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(Option<&Value>, &Meta<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        Self::from_shared(Arc::new(predicate))
    }

    pub fn from_shared(predicate: Arc<PredicateFn>) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl ContextItem for CustomCondition {
    async fn run(&self, _context: &Context, value: Option<&Value>, meta: &Meta<'_>) -> Result<ItemOutcome> {
        match (self.predicate)(value, meta) {
            Ok(true) => Ok(ItemOutcome::Continue),
            Ok(false) => Ok(ItemOutcome::Halt),
            Err(error) => {
                trace!(instance = %meta.key(), error = %error, "condition failed");
                Ok(ItemOutcome::Halt)
            }
        }
    }
}

/// Halts instances when the gating chain records any error.
///
/// The gate is evaluated once per instance invocation and never saved to the
/// request's contexts.
#[derive(Clone, Debug)]
pub struct ChainCondition {
    chain: ContextRunner,
}

impl ChainCondition {
    pub fn new(chain: ContextRunner) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl ContextItem for ChainCondition {
    async fn run(&self, _context: &Context, _value: Option<&Value>, meta: &Meta<'_>) -> Result<ItemOutcome> {
        let gate = self.chain.dry_run(meta.req).await?;
        if gate.has_errors() {
            trace!(instance = %meta.key(), errors = gate.errors().len(), "gating chain failed");
            return Ok(ItemOutcome::Halt);
        }
        Ok(ItemOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContextBuilder, CustomValidation};
    use anyhow::anyhow;
    use fieldchain_types::{Location, Request};
    use serde_json::json;

    fn empty_context() -> Context {
        Context::new(Arc::new(ContextBuilder::new().build()))
    }

    #[tokio::test]
    async fn predicates_gate_on_truthiness_and_errors() {
        let context = empty_context();
        let request = Request::new();
        let meta = Meta::new(&request, Location::Body, "age");

        let adult = CustomCondition::new(|value, _| Ok(value.and_then(Value::as_u64).is_some_and(|age| age >= 18)));
        assert_eq!(adult.run(&context, Some(&json!(30)), &meta).await.expect("run"), ItemOutcome::Continue);
        assert_eq!(adult.run(&context, Some(&json!(3)), &meta).await.expect("run"), ItemOutcome::Halt);

        let broken = CustomCondition::new(|_, _| Err(anyhow!("boom")));
        assert_eq!(broken.run(&context, None, &meta).await.expect("run"), ItemOutcome::Halt);
    }

    #[tokio::test]
    async fn chain_conditions_follow_the_gating_chain() {
        let mut gate = ContextBuilder::new();
        gate.set_fields(["token"])
            .set_locations([Location::Headers])
            .add_item(CustomValidation::new(|value, _| Ok(value.is_some())));
        let condition = ChainCondition::new(ContextRunner::from_builder(&gate));
        let context = empty_context();

        let with_token = Request::new().with(Location::Headers, json!({ "token": "t" }));
        let meta = Meta::new(&with_token, Location::Body, "name");
        assert_eq!(condition.run(&context, None, &meta).await.expect("run"), ItemOutcome::Continue);

        let without_token = Request::new();
        let meta = Meta::new(&without_token, Location::Body, "name");
        assert_eq!(condition.run(&context, None, &meta).await.expect("run"), ItemOutcome::Halt);
    }
}
