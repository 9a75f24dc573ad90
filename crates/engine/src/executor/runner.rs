//! Chain runner.
//!
//! `ContextRunner` pairs a built chain with the selector used to resolve its
//! fields. Each run:
//! 1. selects field instances from the request,
//! 2. materializes defaults through the pre-stack,
//! 3. walks the main stack position by position, running each item
//!    concurrently across every instance that has not halted,
//! 4. appends the completed context to the request's contexts.
//!
//! Concurrency is cooperative: instance invocations of one position are
//! joined with `try_join_all` inside the calling task, so no position starts
//! before the previous one has finished for every instance.

use std::{collections::HashSet, fmt, sync::Arc};

use fieldchain_types::{FieldInstance, InstanceKey, Request};
use fieldchain_util::{JsonFieldSelector, SelectFields, block_on_future};
use futures_util::future::try_join_all;
use tracing::{debug, trace, warn};

use super::{store::RequestContexts, types::RunOptions};
use crate::{
    builder::{ChainSpec, ContextBuilder},
    context::{Context, DataQuery},
    error::ChainError,
    items::{ContextItem, ItemOutcome, Meta},
};

/// Runs a built chain against requests.
///
/// Cloning is cheap; clones share the chain and the selector.
#[derive(Clone)]
pub struct ContextRunner {
    spec: Arc<ChainSpec>,
    selector: Arc<dyn SelectFields>,
}

impl ContextRunner {
    pub fn new(spec: ChainSpec, selector: impl SelectFields + 'static) -> Self {
        Self::with_shared_selector(spec, Arc::new(selector))
    }

    pub fn with_shared_selector(spec: ChainSpec, selector: Arc<dyn SelectFields>) -> Self {
        Self {
            spec: Arc::new(spec),
            selector,
        }
    }

    /// Builds the chain and pairs it with [`JsonFieldSelector`].
    pub fn from_builder(builder: &ContextBuilder) -> Self {
        Self::new(builder.build(), JsonFieldSelector)
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    /// Runs the chain and saves the resulting context.
    pub async fn run(&self, request: &Request, contexts: &RequestContexts) -> Result<Arc<Context>, ChainError> {
        self.run_with_options(request, contexts, RunOptions::default()).await
    }

    pub async fn run_with_options(
        &self,
        request: &Request,
        contexts: &RequestContexts,
        options: RunOptions,
    ) -> Result<Arc<Context>, ChainError> {
        let context = match self.execute(request).await {
            Ok(context) => Arc::new(context),
            Err(error) => {
                warn!(chain = ?self.spec.fields(), error = %error, "chain run aborted");
                return Err(error);
            }
        };

        if options.save_context {
            contexts.push(Arc::clone(&context));
        }
        debug!(
            chain = ?self.spec.fields(),
            errors = context.errors().len(),
            saved = options.save_context,
            "chain run complete"
        );
        Ok(context)
    }

    /// Runs the chain without saving the context anywhere.
    pub async fn dry_run(&self, request: &Request) -> Result<Arc<Context>, ChainError> {
        self.run_with_options(request, &RequestContexts::new(), RunOptions { save_context: false })
            .await
    }

    /// Drives [`run`](Self::run) to completion from synchronous code.
    pub fn run_blocking(&self, request: &Request, contexts: &RequestContexts) -> Result<Arc<Context>, ChainError> {
        block_on_future(self.run(request, contexts))?
    }

    async fn execute(&self, request: &Request) -> Result<Context, ChainError> {
        let instances = self
            .selector
            .select_fields(request, self.spec.fields(), self.spec.locations())
            .map_err(ChainError::Selection)?;
        debug!(chain = ?self.spec.fields(), instances = instances.len(), "selected field instances");

        let context = Context::new(Arc::clone(&self.spec));
        context.add_field_instances(instances);

        if !context.pre_stack().is_empty() {
            run_pre_stack(&context, request).await?;
        }
        run_main_stack(&context, request).await?;
        Ok(context)
    }
}

impl fmt::Debug for ContextRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRunner").field("spec", &self.spec).finish_non_exhaustive()
    }
}

/// Every candidate walks the whole pre-stack in order; candidates run
/// concurrently with each other.
async fn run_pre_stack(context: &Context, request: &Request) -> Result<(), ChainError> {
    let candidates = context.get_data(DataQuery::optionals_with_defaults());
    debug!(candidates = candidates.len(), items = context.pre_stack().len(), "running pre-stack");

    let pending = candidates.into_iter().map(|candidate| async move {
        let key = candidate.key();
        for item in context.pre_stack() {
            let Some(current) = context.field_instance(&key) else {
                break;
            };
            if apply_item(item.as_ref(), context, request, &current).await? {
                break;
            }
        }
        Ok::<_, ChainError>(())
    });
    try_join_all(pending).await?;
    Ok(())
}

/// Runs each position across all eligible instances before moving on.
async fn run_main_stack(context: &Context, request: &Request) -> Result<(), ChainError> {
    let mut halted = HashSet::<InstanceKey>::new();

    for (position, item) in context.stack().iter().enumerate() {
        let eligible = context
            .get_data(DataQuery::required_only())
            .into_iter()
            .filter(|instance| !halted.contains(&instance.key()))
            .collect::<Vec<_>>();
        trace!(position, instances = eligible.len(), "running stack position");

        let outcomes = try_join_all(
            eligible
                .iter()
                .map(|instance| apply_item(item.as_ref(), context, request, instance)),
        )
        .await?;

        for (instance, halt) in eligible.iter().zip(outcomes) {
            if halt {
                halted.insert(instance.key());
            }
        }
    }
    Ok(())
}

/// Invokes one item on one instance. Returns true when the instance halted.
async fn apply_item(item: &dyn ContextItem, context: &Context, request: &Request, instance: &FieldInstance) -> Result<bool, ChainError> {
    let key = instance.key();
    let meta = Meta::new(request, instance.location, &instance.path);
    let outcome = item
        .run(context, instance.value.as_ref(), &meta)
        .await
        .map_err(|source| ChainError::Item { key: key.clone(), source })?;

    match outcome {
        ItemOutcome::Continue => Ok(false),
        ItemOutcome::Sanitized(value) => {
            context.set_value(&key, value);
            Ok(false)
        }
        ItemOutcome::Halt => {
            trace!(instance = %key, "instance halted");
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CustomValidation, Sanitization, optional::PartialOptional};
    use anyhow::{Result, anyhow};
    use fieldchain_types::{FieldInstance, Location};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    fn query(document: Value) -> Request {
        Request::new().with(Location::Query, document)
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Sanitization {
        let log = Arc::clone(log);
        Sanitization::new(move |value| {
            log.lock().expect("log lock").push(label.to_string());
            value.cloned().unwrap_or(Value::Null)
        })
    }

    #[tokio::test]
    async fn sanitized_values_feed_later_items() {
        let mut builder = ContextBuilder::new();
        builder
            .set_fields(["name"])
            .set_locations([Location::Query])
            .add_item(Sanitization::new(|value| json!(value.and_then(Value::as_str).unwrap_or_default().trim())))
            .add_item(CustomValidation::new(|value, _| Ok(value == Some(&json!("ada")))));

        let context = ContextRunner::from_builder(&builder)
            .dry_run(&query(json!({ "name": "  ada " })))
            .await
            .expect("run");

        assert!(!context.has_errors());
        let instance = context.field_instance(&InstanceKey::new(Location::Query, "name")).expect("instance");
        assert_eq!(instance.value, Some(json!("ada")));
        assert_eq!(instance.original_value, Some(json!("  ada ")));
    }

    #[tokio::test]
    async fn empty_pre_stack_skips_defaulting() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = ContextBuilder::new();
        builder.set_fields(["a"]).set_locations([Location::Query]).optional().add_item(recorder(&log, "main"));

        let context = ContextRunner::from_builder(&builder).dry_run(&query(json!({}))).await.expect("run");

        assert!(log.lock().expect("log lock").is_empty());
        assert_eq!(context.field_instances()[0].value, None);
    }

    #[tokio::test]
    async fn defaults_materialize_before_the_main_stack() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::clone(&seen);
        let mut builder = ContextBuilder::new();
        builder
            .set_fields(["page", "size"])
            .set_locations([Location::Query])
            .set_optional(PartialOptional::new().default_value(json!(1)))
            .add_item(CustomValidation::new(move |value, meta| {
                observed.lock().expect("seen lock").push((meta.path.to_string(), value.cloned()));
                Ok(true)
            }));

        ContextRunner::from_builder(&builder)
            .dry_run(&query(json!({ "size": 50 })))
            .await
            .expect("run");

        let seen = seen.lock().expect("seen lock").clone();
        assert_eq!(seen, vec![("page".to_string(), Some(json!(1))), ("size".to_string(), Some(json!(50)))]);
    }

    #[tokio::test]
    async fn halts_only_stop_their_own_instance() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = ContextBuilder::new();
        builder
            .set_fields(["a", "b"])
            .set_locations([Location::Query])
            .if_(crate::Condition::predicate(|_, meta| Ok(meta.path != "a")))
            .add_item(recorder(&log, "after"));

        ContextRunner::from_builder(&builder)
            .dry_run(&query(json!({ "a": 1, "b": 2 })))
            .await
            .expect("run");

        assert_eq!(*log.lock().expect("log lock"), vec!["after".to_string()]);
    }

    #[tokio::test]
    async fn item_defects_abort_with_the_failing_key() {
        struct Exploding;

        #[async_trait::async_trait]
        impl ContextItem for Exploding {
            async fn run(&self, _context: &Context, _value: Option<&Value>, meta: &Meta<'_>) -> Result<ItemOutcome> {
                if meta.path == "b" {
                    return Err(anyhow!("exploded"));
                }
                Ok(ItemOutcome::Continue)
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = ContextBuilder::new();
        builder
            .set_fields(["a", "b"])
            .set_locations([Location::Query])
            .add_item(Exploding)
            .add_item(recorder(&log, "later"));
        let contexts = RequestContexts::new();

        let error = ContextRunner::from_builder(&builder)
            .run(&query(json!({ "a": 1, "b": 2 })), &contexts)
            .await
            .expect_err("defect");

        assert_eq!(error.instance(), Some(&InstanceKey::new(Location::Query, "b")));
        assert!(log.lock().expect("log lock").is_empty());
        assert!(contexts.is_empty());
    }

    #[tokio::test]
    async fn selector_failures_are_defects() {
        let selector = |_: &Request, _: &[String], _: &[Location]| -> Result<Vec<FieldInstance>> { Err(anyhow!("no request")) };
        let runner = ContextRunner::new(ContextBuilder::new().build(), selector);
        let error = runner.dry_run(&Request::new()).await.expect_err("selection");
        assert!(matches!(error, ChainError::Selection(_)));
    }

    #[test]
    fn run_blocking_saves_the_context() {
        let mut builder = ContextBuilder::new();
        builder.set_fields(["a"]).set_locations([Location::Query]);
        let contexts = RequestContexts::new();
        let context = ContextRunner::from_builder(&builder)
            .run_blocking(&query(json!({ "a": 1 })), &contexts)
            .expect("run");
        assert_eq!(contexts.len(), 1);
        assert!(Arc::ptr_eq(&contexts.contexts()[0], &context));
    }
}
