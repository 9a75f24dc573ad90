//! Field selection over JSON request documents.
//!
//! Selection turns declared field names into concrete [`FieldInstance`]s. Each
//! declared field is looked up in every declared location, in that nesting
//! order, and wildcard segments are expanded against the data that is actually
//! present. The engine treats selection as a collaborator behind the
//! [`SelectFields`] trait so callers can plug in their own request shapes.

use std::collections::HashSet;

use anyhow::Result;
use fieldchain_types::{FieldInstance, InstanceKey, Location, Request};
use serde_json::Value;
use tracing::trace;

use crate::path::{PathSegment, format_path, get_path, parse_path};

/// Resolves declared fields into concrete instances for one request.
///
/// Implementations must return a complete list before any work item runs and
/// must not depend on the order in which the engine later visits instances.
pub trait SelectFields: Send + Sync {
    fn select_fields(&self, request: &Request, fields: &[String], locations: &[Location]) -> Result<Vec<FieldInstance>>;
}

impl<F> SelectFields for F
where
    F: Fn(&Request, &[String], &[Location]) -> Result<Vec<FieldInstance>> + Send + Sync,
{
    fn select_fields(&self, request: &Request, fields: &[String], locations: &[Location]) -> Result<Vec<FieldInstance>> {
        self(request, fields, locations)
    }
}

/// Default selector for [`Request`]s holding JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFieldSelector;

impl SelectFields for JsonFieldSelector {
    fn select_fields(&self, request: &Request, fields: &[String], locations: &[Location]) -> Result<Vec<FieldInstance>> {
        select_fields(request, fields, locations)
    }
}

/// Selects every instance of `fields` across `locations`.
///
/// - Plain paths yield exactly one instance per location, absent or not.
///   Their path is rewritten canonically against the data, as expansions are.
/// - Wildcard paths yield one instance per match. When nothing matches, a
///   single placeholder instance with the declared path and no value is kept
///   so optional/required handling still sees the field.
/// - Duplicate `(location, path)` pairs keep their first occurrence.
///
/// An empty `locations` slice means every location.
pub fn select_fields(request: &Request, fields: &[String], locations: &[Location]) -> Result<Vec<FieldInstance>> {
    let every_location = Location::ALL;
    let locations = if locations.is_empty() { &every_location[..] } else { locations };
    let mut seen = HashSet::<InstanceKey>::new();
    let mut instances = Vec::new();

    for field in fields {
        let segments = parse_path(field)?;
        for location in locations {
            let document = request.get(*location);
            for instance in expand_field(document, field, &segments, *location) {
                if seen.insert(instance.key()) {
                    instances.push(instance);
                }
            }
        }
    }

    trace!(fields = ?fields, selected = instances.len(), "selected field instances");
    Ok(instances)
}

fn expand_field(document: Option<&Value>, field: &str, segments: &[PathSegment], location: Location) -> Vec<FieldInstance> {
    let mut expansions = Vec::new();
    let mut prefix = Vec::with_capacity(segments.len());
    expand_segments(document, segments, &mut prefix, &mut expansions);

    // Only a wildcard can expand to nothing.
    if expansions.is_empty() {
        return vec![FieldInstance::new(location, field, field, None)];
    }

    expansions
        .into_iter()
        .map(|(resolved, value)| FieldInstance::new(location, format_path(&resolved), field, value))
        .collect()
}

fn expand_segments(
    current: Option<&Value>,
    remaining: &[PathSegment],
    prefix: &mut Vec<PathSegment>,
    output: &mut Vec<(Vec<PathSegment>, Option<Value>)>,
) {
    let Some((segment, rest)) = remaining.split_first() else {
        output.push((prefix.clone(), current.cloned()));
        return;
    };

    match segment {
        PathSegment::Wildcard => match current {
            Some(Value::Object(map)) => {
                for (key, child) in map {
                    prefix.push(PathSegment::Key(key.clone()));
                    expand_segments(Some(child), rest, prefix, output);
                    prefix.pop();
                }
            }
            Some(Value::Array(items)) => {
                for (index, child) in items.iter().enumerate() {
                    prefix.push(PathSegment::Index(index));
                    expand_segments(Some(child), rest, prefix, output);
                    prefix.pop();
                }
            }
            _ => {}
        },
        concrete => {
            let child = current.and_then(|value| get_path(value, std::slice::from_ref(concrete)));
            prefix.push(canonical_segment(current, concrete));
            expand_segments(child, rest, prefix, output);
            prefix.pop();
        }
    }
}

/// Spells a segment the way the data it addresses is shaped, so `a.0` and
/// `a[0]` over an array resolve to the same path.
fn canonical_segment(current: Option<&Value>, segment: &PathSegment) -> PathSegment {
    match (segment, current) {
        (PathSegment::Key(key), Some(Value::Array(_))) => key.parse().map(PathSegment::Index).unwrap_or_else(|_| segment.clone()),
        (PathSegment::Index(index), Some(Value::Object(_))) => PathSegment::Key(index.to_string()),
        _ => segment.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn paths(instances: &[FieldInstance]) -> Vec<String> {
        instances.iter().map(|instance| instance.key().to_string()).collect()
    }

    #[test]
    fn selects_plain_fields_per_location_in_field_order() {
        let request = Request::new()
            .with(Location::Query, json!({ "foo": 1 }))
            .with(Location::Body, json!({ "foo": "body", "bar": 2 }));

        let instances = select_fields(&request, &fields(&["foo", "bar"]), &[Location::Query, Location::Body]).expect("select");

        assert_eq!(paths(&instances), vec!["query:foo", "body:foo", "query:bar", "body:bar"]);
        assert_eq!(instances[0].value, Some(json!(1)));
        assert_eq!(instances[2].value, None);
        assert_eq!(instances[3].value, Some(json!(2)));
    }

    #[test]
    fn expands_wildcards_over_arrays_and_objects() {
        let request = Request::new().with(
            Location::Body,
            json!({
                "items": [{ "id": 1 }, { "id": 2 }, {}],
                "labels": { "a": "x", "b.c": "y" }
            }),
        );

        let instances = select_fields(&request, &fields(&["items.*.id", "labels.*"]), &[Location::Body]).expect("select");

        assert_eq!(
            paths(&instances),
            vec![
                "body:items[0].id",
                "body:items[1].id",
                "body:items[2].id",
                "body:labels.a",
                r#"body:labels["b.c"]"#,
            ]
        );
        assert!(instances.iter().all(|instance| instance.original_path == "items.*.id" || instance.original_path == "labels.*"));
        assert_eq!(instances[2].value, None);
    }

    #[test]
    fn unmatched_wildcards_keep_a_placeholder() {
        let request = Request::new().with(Location::Query, json!({ "items": [] }));
        let instances = select_fields(&request, &fields(&["items.*"]), &[Location::Query]).expect("select");

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].path, "items.*");
        assert_eq!(instances[0].original_path, "items.*");
        assert_eq!(instances[0].value, None);
    }

    #[test]
    fn duplicate_instances_are_selected_once() {
        let request = Request::new().with(Location::Query, json!({ "a": [1] }));
        let instances = select_fields(&request, &fields(&["a[0]", "a.*", "a[0]"]), &[Location::Query]).expect("select");
        assert_eq!(paths(&instances), vec!["query:a[0]"]);
    }

    #[test]
    fn plain_paths_are_canonical() {
        let request = Request::new().with(Location::Body, json!({ "a": [1, 2], "map": { "0": "zero" }, "b": { "c": 3 } }));
        let instances = select_fields(&request, &fields(&["a[0]", "a.0", "a.1", "map[0]", r#"b["c"]"#, "missing[2]"]), &[Location::Body])
            .expect("select");

        assert_eq!(paths(&instances), vec!["body:a[0]", "body:a[1]", "body:map.0", "body:b.c", "body:missing[2]"]);
        assert_eq!(instances[0].original_path, "a[0]");
        assert_eq!(instances[1].value, Some(json!(2)));
        assert_eq!(instances[2].value, Some(json!("zero")));
        assert_eq!(instances[4].value, None);
    }

    #[test]
    fn empty_locations_mean_all_locations() {
        let request = Request::new().with(Location::Headers, json!({ "token": "t" }));
        let instances = select_fields(&request, &fields(&["token"]), &[]).expect("select");
        assert_eq!(instances.len(), Location::ALL.len());
        let found = instances.iter().filter(|instance| instance.value.is_some()).collect::<Vec<_>>();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location, Location::Headers);
    }

    #[test]
    fn closures_act_as_selectors() {
        let selector = |_: &Request, names: &[String], _: &[Location]| -> Result<Vec<FieldInstance>> {
            Ok(names
                .iter()
                .map(|name| FieldInstance::new(Location::Params, name.clone(), name.clone(), Some(json!(0))))
                .collect())
        };
        let instances = selector.select_fields(&Request::new(), &fields(&["id"]), &[]).expect("select");
        assert_eq!(paths(&instances), vec!["params:id"]);
    }

    #[test]
    fn malformed_fields_fail_selection() {
        assert!(select_fields(&Request::new(), &fields(&["a..b"]), &[Location::Query]).is_err());
    }
}
