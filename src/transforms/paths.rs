//! Helpers shared by the operational transforms: alias generation, fragment
//! inlining and navigation of result data and error paths.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::document::{Document, FragmentDefinition, InlineFragment, Selection, SelectionSet};
use crate::execution::PathSegment;

pub(crate) const ALIAS_PREFIX: &str = "__gqlwrap__";

/// Produces response keys that cannot clash with client keys or with aliases
/// made by another transform of the same pipeline.
pub(crate) struct Aliases {
    position: usize,
    next: usize,
}

impl Aliases {
    pub(crate) fn new(position: usize) -> Self {
        Self { position, next: 0 }
    }

    pub(crate) fn next(&mut self) -> String {
        let alias = format!("{}{}_{}", ALIAS_PREFIX, self.position, self.next);
        self.next += 1;
        alias
    }
}

/// Replaces every fragment spread by an equivalent inline fragment and drops the
/// fragment definitions, so selections can be addressed by response-key path.
pub(crate) fn inline_fragment_spreads(document: &mut Document) {
    let fragments = std::mem::take(&mut document.fragments);
    for operation in &mut document.operations {
        inline_set(&mut operation.selection_set, &fragments, &mut HashSet::new());
    }
}

fn inline_set<'f>(
    set: &mut SelectionSet,
    fragments: &'f [FragmentDefinition],
    active: &mut HashSet<&'f str>,
) {
    for selection in &mut set.items {
        match selection {
            Selection::Field(field) => inline_set(&mut field.selection_set, fragments, active),
            Selection::InlineFragment(inline) => {
                inline_set(&mut inline.selection_set, fragments, active)
            }
            Selection::FragmentSpread(spread) => {
                let Some(fragment) = fragments.iter().find(|f| f.name == spread.fragment_name)
                else {
                    continue;
                };
                if !active.insert(fragment.name.as_str()) {
                    continue;
                }
                let mut selection_set = fragment.selection_set.clone();
                inline_set(&mut selection_set, fragments, active);
                active.remove(fragment.name.as_str());
                *selection = Selection::InlineFragment(InlineFragment {
                    type_condition: Some(fragment.type_condition.clone()),
                    directives: spread.directives.clone(),
                    selection_set,
                });
            }
        }
    }
}

/// Calls `f` on every object reached by following `keys` from `value`.
/// Lists are traversed element-wise; missing keys and nulls end the walk.
pub(crate) fn for_each_object_at(
    value: &mut Value,
    keys: &[String],
    f: &mut dyn FnMut(&mut Map<String, Value>),
) {
    match value {
        Value::Array(items) => {
            for item in items {
                for_each_object_at(item, keys, f);
            }
        }
        Value::Object(object) => match keys.split_first() {
            None => f(object),
            Some((key, rest)) => {
                if let Some(child) = object.get_mut(key) {
                    for_each_object_at(child, rest, f);
                }
            }
        },
        _ => {}
    }
}

/// Calls `f` on every non-null value at `keys`, descending into lists on the way
/// and at the end.
pub(crate) fn for_each_value_at(value: &mut Value, keys: &[String], f: &mut dyn FnMut(&mut Value)) {
    match (value, keys.split_first()) {
        (Value::Array(items), _) => {
            for item in items {
                for_each_value_at(item, keys, f);
            }
        }
        (Value::Null, _) => {}
        (value, None) => f(value),
        (Value::Object(object), Some((key, rest))) => {
            if let Some(child) = object.get_mut(key) {
                for_each_value_at(child, rest, f);
            }
        }
        _ => {}
    }
}

/// Index in `path` just past `keys`, skipping list indices between keys.
pub(crate) fn match_keys(path: &[PathSegment], keys: &[String]) -> Option<usize> {
    let mut index = skip_indices(path, 0);
    for key in keys {
        match path.get(index) {
            Some(PathSegment::Key(segment)) if segment == key => {
                index = skip_indices(path, index + 1);
            }
            _ => return None,
        }
    }
    Some(index)
}

fn skip_indices(path: &[PathSegment], mut index: usize) -> usize {
    while matches!(path.get(index), Some(PathSegment::Index(_))) {
        index += 1;
    }
    index
}

/// Rewrites `parent.from_key.rest` into `parent.to_keys.rest`. Returns whether
/// the path matched.
pub(crate) fn relocate_path(
    path: &mut Vec<PathSegment>,
    parent: &[String],
    from_key: &str,
    to_keys: &[String],
) -> bool {
    relocate_keys(path, parent, &[from_key.to_string()], to_keys)
}

/// Rewrites `parent.from_keys.rest` into `parent.to_keys.rest`. List indices
/// between the replaced keys are dropped.
pub(crate) fn relocate_keys(
    path: &mut Vec<PathSegment>,
    parent: &[String],
    from_keys: &[String],
    to_keys: &[String],
) -> bool {
    let Some(start) = match_keys(path, parent) else {
        return false;
    };
    let mut end = start;
    for (i, key) in from_keys.iter().enumerate() {
        if i > 0 {
            end = skip_indices(path, end);
        }
        if path.get(end).and_then(PathSegment::as_key) != Some(key.as_str()) {
            return false;
        }
        end += 1;
    }
    path.splice(
        start..end,
        to_keys.iter().map(|key| PathSegment::Key(key.clone())),
    );
    true
}

/// Inserts `value` at `keys` under `object`, creating intermediate objects.
pub(crate) fn insert_at(object: &mut Map<String, Value>, keys: &[String], value: Value) {
    let Some((last, parents)) = keys.split_last() else {
        return;
    };
    let mut current = object;
    for key in parents {
        let entry = current
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.clone(), value);
}

/// Removes and returns the value at `keys` under `object`, following objects only.
pub(crate) fn take_at(object: &mut Map<String, Value>, keys: &[String]) -> Option<Value> {
    let (last, parents) = keys.split_last()?;
    let mut current = object;
    for key in parents {
        current = current.get_mut(key)?.as_object_mut()?;
    }
    current.remove(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn aliases_are_unique_per_position() {
        let mut first = Aliases::new(0);
        let mut second = Aliases::new(1);
        assert_eq!(first.next(), "__gqlwrap__0_0");
        assert_eq!(first.next(), "__gqlwrap__0_1");
        assert_eq!(second.next(), "__gqlwrap__1_0");
    }

    #[test]
    fn inlines_nested_spreads() {
        let mut document =
            Document::parse("{ a { ...A } } fragment A on T { b ...B } fragment B on T { c }").unwrap();
        inline_fragment_spreads(&mut document);
        assert!(document.fragments.is_empty());
        assert_eq!(
            document.to_string(),
            "{\n  a {\n    ... on T {\n      b\n      ... on T {\n        c\n      }\n    }\n  }\n}"
        );
    }

    #[test]
    fn visits_objects_through_lists() {
        let mut data = json!({ "users": [{ "a": { "x": 1 } }, { "a": null }, { "a": { "x": 2 } }] });
        let mut seen = Vec::new();
        for_each_object_at(&mut data, &keys(&["users", "a"]), &mut |object| {
            seen.push(object["x"].clone());
        });
        assert_eq!(seen, vec![json!(1), json!(2)]);
    }

    #[test]
    fn relocates_error_paths() {
        let mut path = vec![
            PathSegment::from("users"),
            PathSegment::Index(3),
            PathSegment::from("__gqlwrap__0_0"),
            PathSegment::from("street"),
        ];
        assert!(relocate_path(
            &mut path,
            &keys(&["users"]),
            "__gqlwrap__0_0",
            &keys(&["address", "line"]),
        ));
        assert_eq!(
            path,
            vec![
                PathSegment::from("users"),
                PathSegment::Index(3),
                PathSegment::from("address"),
                PathSegment::from("line"),
                PathSegment::from("street"),
            ]
        );
        assert!(!relocate_path(&mut path, &keys(&["other"]), "x", &keys(&["y"])));
    }

    #[test]
    fn insert_creates_intermediate_objects() {
        let mut object = Map::new();
        insert_at(&mut object, &keys(&["a", "b"]), json!(1));
        insert_at(&mut object, &keys(&["a", "c"]), json!(2));
        assert_eq!(Value::Object(object), json!({ "a": { "b": 1, "c": 2 } }));
    }

    #[test]
    fn relocates_several_keys() {
        let mut path = vec![
            PathSegment::from("user"),
            PathSegment::from("__gqlwrap__1_0"),
            PathSegment::from("zip"),
            PathSegment::from("code"),
        ];
        assert!(relocate_keys(
            &mut path,
            &keys(&["user"]),
            &keys(&["__gqlwrap__1_0", "zip"]),
            &keys(&["postcode"]),
        ));
        assert_eq!(
            path,
            vec![
                PathSegment::from("user"),
                PathSegment::from("postcode"),
                PathSegment::from("code"),
            ]
        );
    }

    #[test]
    fn take_follows_objects() {
        let mut object = json!({ "a": { "b": 1 }, "c": [1] });
        let Value::Object(map) = &mut object else {
            unreachable!();
        };
        assert_eq!(take_at(map, &keys(&["a", "b"])), Some(json!(1)));
        assert_eq!(take_at(map, &keys(&["c", "0"])), None);
        assert_eq!(object, json!({ "a": {}, "c": [1] }));
    }
}
