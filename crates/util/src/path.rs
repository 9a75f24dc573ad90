//! Field path parsing and JSON navigation.
//!
//! Paths use dotted segments with optional bracket access, mirroring how
//! request fields are usually written:
//!
//! - `user.name` - object keys
//! - `items[0].id` - array indices
//! - `headers["x-request-id"]` - keys containing separators
//! - `items.*.id` or `items[*].id` - wildcards expanded during selection

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use thiserror::Error;

static SEGMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:\[(?P<index>\d+)\]|\[(?P<wildcard>\*)\]|\["(?P<double>(?:[^"\\]|\\.)*)"\]|\['(?P<single>(?:[^'\\]|\\.)*)'\]|(?P<key>[^.\[\]]+))"#)
        .expect("segment pattern compiles")
});

/// One step of a parsed field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key. Numeric keys also address array elements.
    Key(String),
    /// Array index written in bracket form.
    Index(usize),
    /// Matches every key of an object or every element of an array.
    Wildcard,
}

/// Errors raised while parsing or writing field paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("malformed field path '{path}' at offset {offset}")]
    Malformed { path: String, offset: usize },

    #[error("field path '{path}' contains a wildcard and cannot be written")]
    WildcardWrite { path: String },

    #[error("field path '{path}' writes index {index}, past the array length limit")]
    IndexTooLarge { path: String, index: usize },
}

/// Parses `path` into segments. The empty path addresses the whole document.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathError> {
    let mut segments = Vec::new();
    let mut rest = path;
    let malformed = |rest: &str| PathError::Malformed {
        path: path.to_string(),
        offset: path.len() - rest.len(),
    };

    while !rest.is_empty() {
        let captures = SEGMENT_PATTERN.captures(rest).ok_or_else(|| malformed(rest))?;
        let consumed = captures.get(0).map(|matched| matched.end()).unwrap_or_default();
        segments.push(segment_from_captures(&captures));
        rest = &rest[consumed..];

        if let Some(after_dot) = rest.strip_prefix('.') {
            if after_dot.is_empty() || after_dot.starts_with('.') {
                return Err(malformed(after_dot));
            }
            rest = after_dot;
        } else if !rest.is_empty() && !rest.starts_with('[') {
            return Err(malformed(rest));
        }
    }

    Ok(segments)
}

fn segment_from_captures(captures: &Captures<'_>) -> PathSegment {
    if let Some(index) = captures.name("index") {
        return match index.as_str().parse::<usize>() {
            Ok(index) => PathSegment::Index(index),
            Err(_) => PathSegment::Key(index.as_str().to_string()),
        };
    }
    if captures.name("wildcard").is_some() {
        return PathSegment::Wildcard;
    }
    if let Some(quoted) = captures.name("double").or_else(|| captures.name("single")) {
        return PathSegment::Key(unescape(quoted.as_str()));
    }
    match captures.name("key").map(|key| key.as_str()) {
        Some("*") => PathSegment::Wildcard,
        Some(key) => PathSegment::Key(key.to_string()),
        None => PathSegment::Key(String::new()),
    }
}

fn unescape(quoted: &str) -> String {
    let mut output = String::with_capacity(quoted.len());
    let mut characters = quoted.chars();
    while let Some(character) = characters.next() {
        if character == '\\' {
            if let Some(escaped) = characters.next() {
                output.push(escaped);
            }
        } else {
            output.push(character);
        }
    }
    output
}

/// Renders segments back into a canonical path string.
///
/// Indices render as `[n]`, wildcards as `*`, and keys that would not survive
/// a round trip through [`parse_path`] are quoted.
pub fn format_path(segments: &[PathSegment]) -> String {
    let mut output = String::new();
    for segment in segments {
        match segment {
            PathSegment::Index(index) => output.push_str(&format!("[{index}]")),
            PathSegment::Wildcard => {
                if !output.is_empty() {
                    output.push('.');
                }
                output.push('*');
            }
            PathSegment::Key(key) if is_plain_key(key) => {
                if !output.is_empty() {
                    output.push('.');
                }
                output.push_str(key);
            }
            PathSegment::Key(key) => {
                let escaped = key.replace('\\', "\\\\").replace('"', "\\\"");
                output.push_str(&format!("[\"{escaped}\"]"));
            }
        }
    }
    output
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && key != "*" && !key.contains(['.', '[', ']'])
}

/// Reads the value addressed by `segments`, if it exists.
///
/// Wildcards never resolve here; expand them first.
pub fn get_path<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| match (segment, current) {
        (PathSegment::Key(key), Value::Object(map)) => map.get(key),
        (PathSegment::Key(key), Value::Array(items)) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
        (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
        _ => None,
    })
}

/// Longest array [`set_path`] will grow to.
pub const MAX_ARRAY_LENGTH: usize = 1 << 16;

/// Writes `value` at `segments`, creating intermediate containers as needed.
///
/// Scalars standing where a container is required are replaced. Arrays are
/// padded with `null` when the index is past the end, up to
/// [`MAX_ARRAY_LENGTH`]. Numeric keys address existing arrays and indices
/// address existing objects, the same way [`get_path`] reads them.
pub fn set_path(root: &mut Value, segments: &[PathSegment], value: Value) -> Result<(), PathError> {
    if segments.contains(&PathSegment::Wildcard) {
        return Err(PathError::WildcardWrite {
            path: format_path(segments),
        });
    }
    check_array_growth(root, segments)?;

    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for (position, segment) in parents.iter().enumerate() {
        let next_is_index = matches!(segments[position + 1], PathSegment::Index(_));
        current = child_slot(current, segment, next_is_index, segments)?;
    }
    *child_slot(current, last, false, segments)? = value;
    Ok(())
}

// Rejects oversized indices before anything is written.
fn check_array_growth(root: &Value, segments: &[PathSegment]) -> Result<(), PathError> {
    let mut current = Some(root);
    for segment in segments {
        let index = match (segment, current) {
            (PathSegment::Index(_), Some(Value::Object(_))) => None,
            (PathSegment::Index(index), _) => Some(*index),
            (PathSegment::Key(key), Some(Value::Array(_))) => key.parse::<usize>().ok(),
            _ => None,
        };
        let length = current.and_then(Value::as_array).map(Vec::len).unwrap_or_default();
        if let Some(index) = index
            && index >= length
            && index >= MAX_ARRAY_LENGTH
        {
            return Err(PathError::IndexTooLarge {
                path: format_path(segments),
                index,
            });
        }
        current = current.and_then(|value| get_path(value, std::slice::from_ref(segment)));
    }
    Ok(())
}

fn empty_child(next_is_index: bool) -> Value {
    if next_is_index { Value::Array(Vec::new()) } else { Value::Object(Map::new()) }
}

fn child_slot<'a>(current: &'a mut Value, segment: &PathSegment, next_is_index: bool, segments: &[PathSegment]) -> Result<&'a mut Value, PathError> {
    match segment {
        PathSegment::Index(index) if current.is_object() => Ok(object_slot(current, index.to_string(), next_is_index)),
        PathSegment::Index(index) => array_slot(current, *index, next_is_index, segments),
        PathSegment::Key(key) if current.is_array() => match key.parse::<usize>() {
            Ok(index) => array_slot(current, index, next_is_index, segments),
            Err(_) => Ok(object_slot(current, key.clone(), next_is_index)),
        },
        PathSegment::Key(key) => Ok(object_slot(current, key.clone(), next_is_index)),
        PathSegment::Wildcard => Ok(current),
    }
}

fn object_slot(current: &mut Value, key: String, next_is_index: bool) -> &mut Value {
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    let Value::Object(map) = current else {
        unreachable!("container was just ensured");
    };
    map.entry(key).or_insert_with(|| empty_child(next_is_index))
}

fn array_slot<'a>(current: &'a mut Value, index: usize, next_is_index: bool, segments: &[PathSegment]) -> Result<&'a mut Value, PathError> {
    let length = current.as_array().map(Vec::len).unwrap_or_default();
    if index >= length {
        let required = index
            .checked_add(1)
            .filter(|required| *required <= MAX_ARRAY_LENGTH)
            .ok_or_else(|| PathError::IndexTooLarge {
                path: format_path(segments),
                index,
            })?;
        if !current.is_array() {
            *current = Value::Array(Vec::new());
        }
        if let Value::Array(items) = current {
            items.resize(required, Value::Null);
        }
    }

    let Value::Array(items) = current else {
        unreachable!("container was just ensured");
    };
    let slot = &mut items[index];
    if slot.is_null() {
        *slot = empty_child(next_is_index);
    }
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(name: &str) -> PathSegment {
        PathSegment::Key(name.to_string())
    }

    #[test]
    fn parses_dotted_bracket_and_wildcard_segments() {
        let segments = parse_path(r#"users[0].tags.*["x.y"]['it\'s'][*]"#).expect("parse path");
        assert_eq!(
            segments,
            vec![
                key("users"),
                PathSegment::Index(0),
                key("tags"),
                PathSegment::Wildcard,
                key("x.y"),
                key("it's"),
                PathSegment::Wildcard,
            ]
        );
        assert!(parse_path("").expect("empty path").is_empty());
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(
            parse_path("a..b"),
            Err(PathError::Malformed {
                path: "a..b".into(),
                offset: 2
            })
        );
        assert!(parse_path("a[").is_err());
        assert!(parse_path("a.").is_err());
        assert!(parse_path("a[0]b").is_err());
    }

    #[test]
    fn formats_segments_canonically() {
        let segments = vec![key("items"), PathSegment::Index(2), key("meta.data"), PathSegment::Wildcard, key("id")];
        let formatted = format_path(&segments);
        assert_eq!(formatted, r#"items[2]["meta.data"].*.id"#);
        assert_eq!(parse_path(&formatted).expect("reparse"), segments);
    }

    #[test]
    fn reads_nested_values() {
        let document = json!({ "items": [{ "id": 1 }, { "id": 2 }], "map": { "0": "zero" } });
        let second = parse_path("items[1].id").expect("parse");
        assert_eq!(get_path(&document, &second), Some(&json!(2)));
        let dotted_index = parse_path("items.0.id").expect("parse");
        assert_eq!(get_path(&document, &dotted_index), Some(&json!(1)));
        let object_index = parse_path("map[0]").expect("parse");
        assert_eq!(get_path(&document, &object_index), Some(&json!("zero")));
        let missing = parse_path("items[5].id").expect("parse");
        assert_eq!(get_path(&document, &missing), None);
    }

    #[test]
    fn writes_create_intermediate_containers() {
        let mut document = Value::Null;
        set_path(&mut document, &parse_path("user.emails[1]").expect("parse"), json!("b@example.com")).expect("write");
        set_path(&mut document, &parse_path("user.name").expect("parse"), json!("ada")).expect("write");
        assert_eq!(document, json!({ "user": { "emails": [null, "b@example.com"], "name": "ada" } }));

        let wildcard = parse_path("user.*").expect("parse");
        assert!(matches!(set_path(&mut document, &wildcard, json!(1)), Err(PathError::WildcardWrite { .. })));
    }

    #[test]
    fn writes_refuse_oversized_indices() {
        let mut document = json!({ "ids": [1] });
        for path in ["ids[18446744073709551615]", "ids[10000000000]"] {
            let segments = parse_path(path).expect("parse");
            assert!(matches!(set_path(&mut document, &segments, json!(0)), Err(PathError::IndexTooLarge { .. })));
        }
        assert_eq!(document, json!({ "ids": [1] }));

        let mut fresh = Value::Null;
        let segments = parse_path("ids[70000]").expect("parse");
        assert!(set_path(&mut fresh, &segments, json!(0)).is_err());
        assert_eq!(fresh, Value::Null);
    }

    #[test]
    fn dotted_indices_write_into_existing_arrays() {
        let mut document = Value::Null;
        for (path, value) in [("items.0", "x"), ("items[1]", "y")] {
            set_path(&mut document, &parse_path(path).expect("parse"), json!(value)).expect("write");
        }
        assert_eq!(document, json!({ "items": { "0": "x", "1": "y" } }));

        let mut document = json!({ "items": ["a", "b"], "map": { "0": "zero" } });
        set_path(&mut document, &parse_path("items.0").expect("parse"), json!("x")).expect("write");
        set_path(&mut document, &parse_path("map[0]").expect("parse"), json!("cero")).expect("write");
        assert_eq!(document, json!({ "items": ["x", "b"], "map": { "0": "cero" } }));

        for path in ["items.0", "items[1]", "map[0]"] {
            let segments = parse_path(path).expect("parse");
            let read = get_path(&document, &segments).cloned().expect("read back");
            let mut copy = document.clone();
            set_path(&mut copy, &segments, read).expect("write back");
            assert_eq!(copy, document);
        }
    }

    #[test]
    fn empty_path_replaces_the_document() {
        let mut document = json!({ "a": 1 });
        set_path(&mut document, &[], json!([1, 2])).expect("write");
        assert_eq!(document, json!([1, 2]));
    }
}
