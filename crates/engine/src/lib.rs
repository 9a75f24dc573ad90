//! # Fieldchain Engine
//!
//! The Fieldchain Engine selects fields from a request and runs a chain of
//! work items over every selected instance. Items may rewrite values, record
//! errors, or halt a single instance without affecting its siblings.
//!
//! ## Key Features
//!
//! - **Chain Building**: Declarative chains of sanitizers, validators, and gates
//! - **Wildcard Selection**: `items.*.id` expands to every matching instance
//! - **Optional Fields**: Tolerate absent values and materialize defaults
//! - **Positional Barriers**: Each stack position finishes for every instance
//!   before the next one starts
//! - **Chain Definitions**: YAML/JSON chains compiled against named items
//!
//! ## Usage
//!
//! ```rust
//! use fieldchain_engine::{ContextBuilder, ContextRunner, MatchedDataOptions, RequestContexts, Sanitization};
//! use fieldchain_types::{Location, Request};
//! use serde_json::json;
//!
//! let mut builder = ContextBuilder::new();
//! builder
//!     .set_fields(["foo", "bar"])
//!     .set_locations([Location::Query])
//!     .add_item(Sanitization::new(|value| json!(value.and_then(|value| value.as_i64()).unwrap_or_default() * 2)));
//! let runner = ContextRunner::from_builder(&builder);
//!
//! let request = Request::new().with(Location::Query, json!({ "foo": 1, "bar": 2 }));
//! let contexts = RequestContexts::new();
//! let context = runner.run_blocking(&request, &contexts)?;
//!
//! assert!(!context.has_errors());
//! assert_eq!(contexts.matched_data(&MatchedDataOptions::default()), json!({ "foo": 2, "bar": 4 }));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`builder`**: Chain assembly and the immutable chain snapshot
//! - **`context`**: Per-run field instances and recorded errors
//! - **`items`**: The work item trait and generic items
//! - **`executor`**: Running chains and collecting their contexts per request
//! - **`definition`**: Serializable chains and the item registry
//! - **`optional`**: Optional-field policies and default values

pub mod builder;
pub mod context;
pub mod definition;
pub mod error;
pub mod executor;
pub mod items;
pub mod optional;

// Re-export commonly used types for convenience
pub use builder::{ChainSpec, ContextBuilder};
pub use context::{Context, DataQuery};
pub use definition::{ChainDefinition, ItemRegistry, StepDefinition, load_chain_definitions, parse_chain_definitions};
pub use error::ChainError;
pub use executor::{ContextRunner, MatchedDataOptions, RequestContexts, RunOptions};
pub use items::{
    Bail, BailMode, ChainCondition, Condition, ContextItem, CustomCondition, CustomValidation, DEFAULT_ERROR_MESSAGE, DefaultValueSanitizer,
    ItemOutcome, ItemRef, Meta, Sanitization,
};
pub use optional::{DefaultValue, Optional, OptionalPolicy, OptionalSetting, PartialOptional};
