//! Chain assembly.
//!
//! [`ContextBuilder`] accumulates fields, locations, work items, and the
//! optional policy while a chain is being declared. [`ContextBuilder::build`]
//! takes an immutable [`ChainSpec`] snapshot that runners share across runs.

use std::{fmt, sync::Arc};

use fieldchain_types::Location;
use serde_json::Value;
use tracing::trace;

use crate::{
    items::{Bail, ChainCondition, Condition, ContextItem, CustomCondition, DefaultValueSanitizer, ItemRef},
    optional::{Optional, OptionalSetting},
};

/// Immutable description of a chain.
#[derive(Clone, Default)]
pub struct ChainSpec {
    fields: Vec<String>,
    locations: Vec<Location>,
    stack: Vec<ItemRef>,
    pre_stack: Vec<ItemRef>,
    optional: Optional,
    message: Option<Value>,
}

impl ChainSpec {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Declared locations. Empty means every location.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn stack(&self) -> &[ItemRef] {
        &self.stack
    }

    pub fn pre_stack(&self) -> &[ItemRef] {
        &self.pre_stack
    }

    pub fn optional(&self) -> &Optional {
        &self.optional
    }

    pub fn message(&self) -> Option<&Value> {
        self.message.as_ref()
    }
}

impl fmt::Debug for ChainSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainSpec")
            .field("fields", &self.fields)
            .field("locations", &self.locations)
            .field("stack", &self.stack.len())
            .field("pre_stack", &self.pre_stack.len())
            .field("optional", &self.optional)
            .field("message", &self.message)
            .finish()
    }
}

/// Mutable accumulator for a chain under construction.
///
/// Every mutator returns `&mut Self` so calls can be chained:
///
/// ```rust
/// use fieldchain_engine::ContextBuilder;
/// use fieldchain_types::Location;
///
/// let mut builder = ContextBuilder::new();
/// builder.set_fields(["email"]).set_locations([Location::Body]).optional().bail();
/// let spec = builder.build();
/// assert_eq!(spec.stack().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct ContextBuilder {
    spec: ChainSpec,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fields<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_locations(&mut self, locations: impl IntoIterator<Item = Location>) -> &mut Self {
        self.spec.locations = locations.into_iter().collect();
        self
    }

    /// Chain-level message used by items that do not carry their own.
    pub fn set_message(&mut self, message: impl Into<Value>) -> &mut Self {
        self.spec.message = Some(message.into());
        self
    }

    pub fn add_item(&mut self, item: impl ContextItem + 'static) -> &mut Self {
        self.spec.stack.push(Arc::new(item));
        self
    }

    /// Appends already shared items, preserving their order.
    pub fn add_items(&mut self, items: impl IntoIterator<Item = ItemRef>) -> &mut Self {
        self.spec.stack.extend(items);
        self
    }

    pub fn add_pre_item(&mut self, item: impl ContextItem + 'static) -> &mut Self {
        self.spec.pre_stack.push(Arc::new(item));
        self
    }

    pub fn add_pre_items(&mut self, items: impl IntoIterator<Item = ItemRef>) -> &mut Self {
        self.spec.pre_stack.extend(items);
        self
    }

    /// Replaces the optional policy.
    ///
    /// A policy that carries a default value also appends a default-value
    /// sanitizer to the pre-stack. Calling this repeatedly with defaults adds
    /// one sanitizer per call; the last one wins at run time.
    pub fn set_optional(&mut self, setting: impl Into<OptionalSetting>) -> &mut Self {
        let optional = setting.into().resolve();
        if let Some(default) = optional.default_value() {
            trace!("registering default value sanitizer");
            self.spec.pre_stack.push(Arc::new(DefaultValueSanitizer::new(default.clone())));
        }
        self.spec.optional = optional;
        self
    }

    /// Tolerates absent values with every optional flag off.
    pub fn optional(&mut self) -> &mut Self {
        self.set_optional(true)
    }

    /// Appends a condition that halts instances for which it does not hold.
    pub fn if_(&mut self, condition: impl Into<Condition>) -> &mut Self {
        match condition.into() {
            Condition::Predicate(predicate) => self.add_item(CustomCondition::from_shared(predicate)),
            Condition::Chain(runner) => self.add_item(ChainCondition::new(runner)),
        }
    }

    /// Appends an unconditional halt.
    pub fn bail(&mut self) -> &mut Self {
        self.add_item(Bail::new())
    }

    /// Appends a halt that only fires for instances that already have errors.
    pub fn bail_on_errors(&mut self) -> &mut Self {
        self.add_item(Bail::on_errors())
    }

    /// Appends a halt that fires for every instance once any instance has errors.
    pub fn bail_on_context_errors(&mut self) -> &mut Self {
        self.add_item(Bail::on_context_errors())
    }

    pub fn build(&self) -> ChainSpec {
        self.spec.clone()
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextBuilder").field(&self.spec).finish()
    }
}
