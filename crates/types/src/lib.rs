//! Shared type definitions for the fieldchain workspace.
//!
//! These types describe the request data a chain reads from and the concrete
//! field instances the selection step produces. They carry no behavior beyond
//! lookups and formatting so every crate in the workspace can depend on them.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod field;

pub use field::{FieldError, FieldInstance, InstanceKey};

/// Logical area of a request a field can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Parsed request body.
    Body,
    /// Request cookies.
    Cookies,
    /// Request headers.
    Headers,
    /// Route parameters.
    Params,
    /// Query string parameters.
    Query,
}

impl Location {
    /// Every location, in the order selection visits them when none are declared.
    pub const ALL: [Location; 5] = [Location::Body, Location::Cookies, Location::Headers, Location::Params, Location::Query];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Body => "body",
            Location::Cookies => "cookies",
            Location::Headers => "headers",
            Location::Params => "params",
            Location::Query => "query",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known [`Location`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown request location '{0}'")]
pub struct UnknownLocation(pub String);

impl FromStr for Location {
    type Err = UnknownLocation;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "body" => Ok(Location::Body),
            "cookies" => Ok(Location::Cookies),
            "headers" => Ok(Location::Headers),
            "params" => Ok(Location::Params),
            "query" => Ok(Location::Query),
            other => Err(UnknownLocation(other.to_string())),
        }
    }
}

/// Request data keyed by location.
///
/// Each location holds an arbitrary JSON document. The engine only ever reads
/// from a request; sanitized values live in the run contexts instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Request {
    locations: IndexMap<Location, Value>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper that sets the document for `location`.
    pub fn with(mut self, location: Location, document: Value) -> Self {
        self.insert(location, document);
        self
    }

    /// Replaces the document stored for `location`, returning the previous one.
    pub fn insert(&mut self, location: Location, document: Value) -> Option<Value> {
        self.locations.insert(location, document)
    }

    pub fn get(&self, location: Location) -> Option<&Value> {
        self.locations.get(&location)
    }

    /// Iterates over locations that carry a document, in insertion order.
    pub fn locations(&self) -> impl Iterator<Item = (Location, &Value)> {
        self.locations.iter().map(|(location, document)| (*location, document))
    }
}
