//! Per-run chain context.
//!
//! A [`Context`] is created fresh for every run of a chain. It carries the
//! immutable [`ChainSpec`] the run was started from together with the mutable
//! state the run produces: the selected field instances (whose values work
//! items may rewrite) and the errors recorded against them.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use fieldchain_types::{FieldError, FieldInstance, InstanceKey, Location};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{builder::ChainSpec, items::ItemRef, optional::Optional};

/// Filter applied by [`Context::get_data`].
///
/// When both flags are set, `only_optionals_with_defaults` wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataQuery {
    /// Drop instances whose value is absent under a tolerated optional policy.
    pub required_only: bool,
    /// Keep only instances that may receive a default value.
    pub only_optionals_with_defaults: bool,
}

impl DataQuery {
    pub const fn all() -> Self {
        Self {
            required_only: false,
            only_optionals_with_defaults: false,
        }
    }

    pub const fn required_only() -> Self {
        Self {
            required_only: true,
            only_optionals_with_defaults: false,
        }
    }

    pub const fn optionals_with_defaults() -> Self {
        Self {
            required_only: false,
            only_optionals_with_defaults: true,
        }
    }
}

#[derive(Debug, Default)]
struct ContextState {
    instances: IndexMap<InstanceKey, FieldInstance>,
    errors: Vec<FieldError>,
}

/// Mutable state of a single chain run.
///
/// Work items running concurrently for different instances of the same
/// position share one `Context`; every accessor takes the internal lock for
/// the duration of the call only.
pub struct Context {
    spec: Arc<ChainSpec>,
    state: Mutex<ContextState>,
}

impl Context {
    pub fn new(spec: Arc<ChainSpec>) -> Self {
        Self {
            spec,
            state: Mutex::new(ContextState::default()),
        }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn fields(&self) -> &[String] {
        self.spec.fields()
    }

    pub fn locations(&self) -> &[Location] {
        self.spec.locations()
    }

    pub fn stack(&self) -> &[ItemRef] {
        self.spec.stack()
    }

    pub fn pre_stack(&self) -> &[ItemRef] {
        self.spec.pre_stack()
    }

    pub fn optional(&self) -> &Optional {
        self.spec.optional()
    }

    pub fn message(&self) -> Option<&Value> {
        self.spec.message()
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records selected instances. Re-adding an existing key replaces the
    /// instance and clears the errors recorded against it.
    pub fn add_field_instances(&self, instances: impl IntoIterator<Item = FieldInstance>) {
        let mut state = self.lock();
        for instance in instances {
            let key = instance.key();
            if state.instances.insert(key.clone(), instance).is_some() {
                state.errors.retain(|error| error.key() != key);
            }
        }
    }

    /// Returns the instances matching `query`, in selection order.
    pub fn get_data(&self, query: DataQuery) -> Vec<FieldInstance> {
        let state = self.lock();
        let optional = self.spec.optional();

        let mut group_sizes = HashMap::<&str, usize>::new();
        for instance in state.instances.values() {
            *group_sizes.entry(instance.original_path.as_str()).or_default() += 1;
        }

        state
            .instances
            .values()
            .filter(|instance| !is_redundant_placeholder(instance, &group_sizes))
            .filter(|instance| matches_query(optional, query, instance))
            .cloned()
            .collect()
    }

    /// All recorded instances, including unmatched wildcard placeholders.
    pub fn field_instances(&self) -> Vec<FieldInstance> {
        self.lock().instances.values().cloned().collect()
    }

    pub fn field_instance(&self, key: &InstanceKey) -> Option<FieldInstance> {
        self.lock().instances.get(key).cloned()
    }

    /// Rewrites an instance's value. Returns false if the instance is unknown.
    pub fn set_value(&self, key: &InstanceKey, value: Value) -> bool {
        match self.lock().instances.get_mut(key) {
            Some(instance) => {
                instance.value = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn remove_field_instance(&self, key: &InstanceKey) -> Option<FieldInstance> {
        self.lock().instances.shift_remove(key)
    }

    pub fn add_error(&self, error: FieldError) {
        self.lock().errors.push(error);
    }

    /// Errors in the order they were recorded.
    pub fn errors(&self) -> Vec<FieldError> {
        self.lock().errors.clone()
    }

    pub fn errors_for(&self, key: &InstanceKey) -> Vec<FieldError> {
        self.lock().errors.iter().filter(|error| error.key() == *key).cloned().collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.lock().errors.is_empty()
    }

    pub fn has_errors_for(&self, key: &InstanceKey) -> bool {
        self.lock().errors.iter().any(|error| error.key() == *key)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Context")
            .field("spec", &self.spec)
            .field("instances", &state.instances.len())
            .field("errors", &state.errors)
            .finish()
    }
}

// A wildcard that matched nothing in one location but something elsewhere
// leaves a placeholder that no longer stands for anything.
fn is_redundant_placeholder(instance: &FieldInstance, group_sizes: &HashMap<&str, usize>) -> bool {
    instance.value.is_none()
        && instance.path == instance.original_path
        && group_sizes.get(instance.original_path.as_str()).copied().unwrap_or_default() > 1
}

fn matches_query(optional: &Optional, query: DataQuery, instance: &FieldInstance) -> bool {
    let value = instance.value.as_ref();
    if query.only_optionals_with_defaults {
        return match optional {
            Optional::Required => true,
            Optional::Tolerated(policy) => policy.default_value.is_some() && policy.is_absent(value),
        };
    }
    if query.required_only {
        return !optional.tolerates(value);
    }
    true
}
