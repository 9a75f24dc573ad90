//! Helpers shared by the fieldchain engine: field path parsing, JSON field
//! selection, and a bridge for driving async chains from synchronous code.

pub mod async_runtime;
pub mod path;
pub mod selection;

pub use async_runtime::{RuntimeError, block_on_future};
pub use path::{PathError, PathSegment, format_path, get_path, parse_path, set_path};
pub use selection::{JsonFieldSelector, SelectFields, select_fields};
