//! Per-request collection of completed chain contexts.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use fieldchain_types::FieldError;
use fieldchain_util::{parse_path, set_path};
use serde_json::{Map, Value};
use tracing::trace;

use super::types::MatchedDataOptions;
use crate::context::{Context, DataQuery};

/// Caller-owned list of the contexts produced while handling one request.
///
/// Runners append in completion order. Clones share the same list, so one
/// handle can be passed to several concurrent runs.
#[derive(Clone, Default)]
pub struct RequestContexts {
    contexts: Arc<Mutex<Vec<Arc<Context>>>>,
}

impl RequestContexts {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Context>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, context: Arc<Context>) {
        self.lock().push(context);
    }

    /// Snapshot of the saved contexts, oldest first.
    pub fn contexts(&self) -> Vec<Arc<Context>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Every recorded error, context by context.
    pub fn errors(&self) -> Vec<FieldError> {
        self.contexts().iter().flat_map(|context| context.errors()).collect()
    }

    /// Rebuilds a single JSON object from the selected values.
    ///
    /// Values from every location are merged into one object keyed by their
    /// resolved paths. Later contexts overwrite earlier ones, and absent
    /// values are never written.
    pub fn matched_data(&self, options: &MatchedDataOptions) -> Value {
        let query = if options.include_optionals {
            DataQuery::all()
        } else {
            DataQuery::required_only()
        };
        let mut output = Value::Object(Map::new());

        for context in self.contexts() {
            for instance in context.get_data(query) {
                if !options.locations.is_empty() && !options.locations.contains(&instance.location) {
                    continue;
                }
                if options.only_valid_data && context.has_errors_for(&instance.key()) {
                    continue;
                }
                let Some(value) = instance.value else {
                    continue;
                };
                let written = parse_path(&instance.path).and_then(|segments| set_path(&mut output, &segments, value));
                if let Err(error) = written {
                    trace!(path = %instance.path, error = %error, "skipping unmatched path");
                }
            }
        }
        output
    }
}

impl fmt::Debug for RequestContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContexts").field("contexts", &self.len()).finish()
    }
}
