//! Declarative chain definitions.
//!
//! Chains can be described in YAML or JSON and compiled against an
//! [`ItemRegistry`] that maps step names to work items and predicates:
//!
//! ```yaml
//! chains:
//!   signup:
//!     fields: [email]
//!     locations: [body]
//!     optional: { nullable: true, default: "" }
//!     steps:
//!       - item: trim
//!       - if: { predicate: present }
//!       - item: is_email
//!       - bail_on_errors
//! ```

use std::{collections::HashMap, fmt, fs, path::Path, sync::Arc};

use anyhow::{Context as _, Result, bail};
use fieldchain_types::Location;
use fieldchain_util::{JsonFieldSelector, SelectFields};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    builder::ContextBuilder,
    error::ChainError,
    executor::ContextRunner,
    items::{Condition, ContextItem, ItemRef, Meta, PredicateFn},
    optional::OptionalSetting,
};

/// Serializable form of a chain.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainDefinition {
    /// Name used when the definition is the only one in its file.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    /// Empty means every location.
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub optional: OptionalSetting,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub pre_steps: Vec<StepDefinition>,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// One entry of a definition's `steps` or `pre_steps`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDefinition {
    /// A registered work item, by name.
    Item(String),
    Bail,
    BailOnErrors,
    BailOnContextErrors,
    /// Untyped condition, resolved by [`ItemRegistry::condition`].
    If(Value),
}

/// Named work items and predicates available to chain definitions.
#[derive(Clone)]
pub struct ItemRegistry {
    items: HashMap<String, ItemRef>,
    predicates: HashMap<String, Arc<PredicateFn>>,
    selector: Arc<dyn SelectFields>,
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::with_selector(JsonFieldSelector)
    }

    /// Compiled chains use `selector` instead of [`JsonFieldSelector`].
    pub fn with_selector(selector: impl SelectFields + 'static) -> Self {
        Self {
            items: HashMap::new(),
            predicates: HashMap::new(),
            selector: Arc::new(selector),
        }
    }

    pub fn register_item(&mut self, name: impl Into<String>, item: impl ContextItem + 'static) -> &mut Self {
        self.items.insert(name.into(), Arc::new(item));
        self
    }

    pub fn register_predicate<F>(&mut self, name: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(Option<&Value>, &Meta<'_>) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(predicate));
        self
    }

    fn item(&self, name: &str) -> Result<ItemRef, ChainError> {
        self.items
            .get(name)
            .cloned()
            .ok_or_else(|| ChainError::UnknownItem { name: name.to_string() })
    }

    /// Converts untyped condition input into a [`Condition`].
    ///
    /// Accepted shapes are `{ predicate: <name> }` and
    /// `{ chain: <definition> }`; anything else is unsupported.
    pub fn condition(&self, input: &Value) -> Result<Condition, ChainError> {
        let unsupported = || ChainError::UnsupportedCondition { found: input.to_string() };
        let Value::Object(map) = input else {
            return Err(unsupported());
        };
        if map.len() != 1 {
            return Err(unsupported());
        }

        match map.iter().next() {
            Some((kind, Value::String(name))) if kind == "predicate" => self
                .predicates
                .get(name)
                .cloned()
                .map(Condition::Predicate)
                .ok_or_else(|| ChainError::UnknownPredicate { name: name.clone() }),
            Some((kind, chain)) if kind == "chain" => {
                let definition = ChainDefinition::deserialize(chain).map_err(|error| ChainError::InvalidDefinition {
                    reason: format!("condition chain: {error}"),
                })?;
                self.compile(&definition).map(Condition::Chain)
            }
            _ => Err(unsupported()),
        }
    }

    /// Appends one main-stack step. Nothing is added when the step fails.
    pub fn apply_step(&self, builder: &mut ContextBuilder, step: &StepDefinition) -> Result<(), ChainError> {
        match step {
            StepDefinition::Item(name) => {
                builder.add_items([self.item(name)?]);
            }
            StepDefinition::Bail => {
                builder.bail();
            }
            StepDefinition::BailOnErrors => {
                builder.bail_on_errors();
            }
            StepDefinition::BailOnContextErrors => {
                builder.bail_on_context_errors();
            }
            StepDefinition::If(input) => {
                builder.if_(self.condition(input)?);
            }
        }
        Ok(())
    }

    /// Appends one pre-stack step. Only named items may run before the main stack.
    pub fn apply_pre_step(&self, builder: &mut ContextBuilder, step: &StepDefinition) -> Result<(), ChainError> {
        match step {
            StepDefinition::Item(name) => {
                builder.add_pre_items([self.item(name)?]);
                Ok(())
            }
            other => Err(ChainError::InvalidDefinition {
                reason: format!("pre-steps only accept items, found {other:?}"),
            }),
        }
    }

    pub fn builder(&self, definition: &ChainDefinition) -> Result<ContextBuilder, ChainError> {
        let mut builder = ContextBuilder::new();
        builder
            .set_fields(definition.fields.iter().cloned())
            .set_locations(definition.locations.iter().copied())
            .set_optional(definition.optional.clone());
        if let Some(message) = &definition.message {
            builder.set_message(message.clone());
        }
        for step in &definition.pre_steps {
            self.apply_pre_step(&mut builder, step)?;
        }
        for step in &definition.steps {
            self.apply_step(&mut builder, step)?;
        }
        Ok(builder)
    }

    pub fn compile(&self, definition: &ChainDefinition) -> Result<ContextRunner, ChainError> {
        let builder = self.builder(definition)?;
        debug!(
            chain = definition.name.as_deref().unwrap_or("default"),
            steps = definition.steps.len(),
            "compiled chain definition"
        );
        Ok(ContextRunner::with_shared_selector(builder.build(), Arc::clone(&self.selector)))
    }
}

impl fmt::Debug for ItemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut items = self.items.keys().collect::<Vec<_>>();
        items.sort();
        let mut predicates = self.predicates.keys().collect::<Vec<_>>();
        predicates.sort();
        f.debug_struct("ItemRegistry")
            .field("items", &items)
            .field("predicates", &predicates)
            .finish_non_exhaustive()
    }
}

/// Parses chain definitions from YAML or JSON text.
///
/// The document is either a single definition, keyed by its `name` or
/// `default`, or a map of definitions under `chains`.
pub fn parse_chain_definitions(content: &str) -> Result<IndexMap<String, ChainDefinition>> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ChainDocument {
        chains: IndexMap<String, ChainDefinition>,
    }

    let document: serde_yaml::Value = serde_yaml::from_str(content).context("chain definitions are not valid YAML or JSON")?;
    let has_chains = document
        .as_mapping()
        .is_some_and(|mapping| mapping.contains_key(serde_yaml::Value::from("chains")));

    if has_chains {
        let bundle: ChainDocument = serde_yaml::from_value(document).context("invalid multi-chain document")?;
        return Ok(bundle.chains);
    }

    if document.as_mapping().is_none() {
        bail!("unsupported chain document: expected a chain definition or a 'chains' map");
    }

    let definition: ChainDefinition = serde_yaml::from_value(document).context("invalid chain definition")?;
    let name = definition.name.clone().unwrap_or_else(|| "default".to_string());
    Ok(IndexMap::from([(name, definition)]))
}

/// Loads chain definitions from a YAML or JSON file.
///
/// ```rust
/// use fieldchain_engine::load_chain_definitions;
///
/// let temp_dir = tempfile::tempdir()?;
/// let path = temp_dir.path().join("chains.yaml");
/// std::fs::write(&path, "fields: [email]\nlocations: [body]\nsteps: [bail]\n")?;
///
/// let chains = load_chain_definitions(&path)?;
/// assert_eq!(chains["default"].fields, vec!["email".to_string()]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load_chain_definitions(path: impl AsRef<Path>) -> Result<IndexMap<String, ChainDefinition>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("failed to read chain definitions: {}", path.display()))?;
    let chains = parse_chain_definitions(&content).with_context(|| format!("failed to parse chain definitions: {}", path.display()))?;
    debug!(path = %path.display(), chains = chains.len(), "loaded chain definitions");
    Ok(chains)
}
