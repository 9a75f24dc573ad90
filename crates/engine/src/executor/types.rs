//! Core executor option types.

use fieldchain_types::Location;
use serde::{Deserialize, Serialize};

/// Options for a single chain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Append the completed context to the request's contexts.
    #[serde(default = "default_true")]
    pub save_context: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { save_context: true }
    }
}

/// Filters for [`RequestContexts::matched_data`](crate::RequestContexts::matched_data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedDataOptions {
    /// Include instances that are absent under a tolerated optional policy.
    #[serde(default)]
    pub include_optionals: bool,
    /// Skip instances that have recorded errors.
    #[serde(default = "default_true")]
    pub only_valid_data: bool,
    /// Restrict output to these locations. Empty means every location.
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Default for MatchedDataOptions {
    fn default() -> Self {
        Self {
            include_optionals: false,
            only_valid_data: true,
            locations: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_defaults_match_deserialized_defaults() {
        let run: RunOptions = serde_json::from_value(json!({})).expect("run options");
        assert_eq!(run, RunOptions::default());

        let matched: MatchedDataOptions = serde_json::from_value(json!({ "locations": ["query"] })).expect("matched options");
        assert!(matched.only_valid_data);
        assert!(!matched.include_optionals);
        assert_eq!(matched.locations, vec![Location::Query]);
    }
}
