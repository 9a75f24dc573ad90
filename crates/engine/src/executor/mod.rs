//! Execution engine: selects field instances for a request, drives the
//! pre-stack and main-stack over them, and records completed contexts.
//!
//! - `runner::ContextRunner` runs one chain against one request
//! - `store::RequestContexts` collects the contexts produced for a request
//! - `types` holds the option records both of them accept

pub mod runner;
pub mod store;
pub mod types;

pub use runner::ContextRunner;
pub use store::RequestContexts;
pub use types::{MatchedDataOptions, RunOptions};
