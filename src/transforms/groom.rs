//! Deprecation and directive grooming on object fields.

use indexmap::IndexMap;

use crate::document::Directive;
use crate::schema::FieldDef;

use super::modify::{FieldTransform, TransformObjectFields};
use super::Pattern;

/// Removes object fields whose deprecation reason matches.
pub struct RemoveObjectFieldsWithDeprecation(TransformObjectFields);

impl RemoveObjectFieldsWithDeprecation {
    pub fn new(reason: impl Into<Pattern>) -> Self {
        let reason = reason.into();
        Self(TransformObjectFields::named(
            "RemoveObjectFieldsWithDeprecation",
            move |_, _, field| {
                if deprecated_with(field, &reason) {
                    FieldTransform::Omit
                } else {
                    FieldTransform::Unchanged
                }
            },
        ))
    }
}

forward_transform!(RemoveObjectFieldsWithDeprecation);

/// Un-deprecates object fields whose deprecation reason matches.
pub struct RemoveObjectFieldDeprecations(TransformObjectFields);

impl RemoveObjectFieldDeprecations {
    pub fn new(reason: impl Into<Pattern>) -> Self {
        let reason = reason.into();
        Self(TransformObjectFields::named(
            "RemoveObjectFieldDeprecations",
            move |_, _, field| {
                if !deprecated_with(field, &reason) {
                    return FieldTransform::Unchanged;
                }
                let mut field = field.clone();
                field.directives.retain(|d| d.name != "deprecated");
                FieldTransform::Replace(field)
            },
        ))
    }
}

forward_transform!(RemoveObjectFieldDeprecations);

fn deprecated_with(field: &FieldDef, reason: &Pattern) -> bool {
    field
        .deprecation_reason()
        .is_some_and(|actual| reason.matches(&actual))
}

/// Matches applied directives by name and, optionally, argument values.
#[derive(Debug, Clone)]
struct DirectiveMatcher {
    name: Pattern,
    arguments: IndexMap<String, Pattern>,
}

impl DirectiveMatcher {
    fn matches(&self, directive: &Directive) -> bool {
        self.name.matches(&directive.name)
            && self.arguments.iter().all(|(name, pattern)| {
                directive
                    .argument(name)
                    .is_some_and(|value| pattern.matches(&value.as_match_str()))
            })
    }
}

/// Removes matching directives from object fields.
///
/// `arguments` narrows the match: every listed argument must be present and
/// its value must match.
pub struct RemoveObjectFieldDirectives(TransformObjectFields);

impl RemoveObjectFieldDirectives {
    pub fn new(name: impl Into<Pattern>, arguments: IndexMap<String, Pattern>) -> Self {
        let matcher = DirectiveMatcher {
            name: name.into(),
            arguments,
        };
        Self(TransformObjectFields::named(
            "RemoveObjectFieldDirectives",
            move |_, _, field| {
                if !field.directives.iter().any(|d| matcher.matches(d)) {
                    return FieldTransform::Unchanged;
                }
                let mut field = field.clone();
                field.directives.retain(|d| !matcher.matches(d));
                FieldTransform::Replace(field)
            },
        ))
    }
}

forward_transform!(RemoveObjectFieldDirectives);

/// Removes object fields carrying a matching directive.
pub struct RemoveObjectFieldsWithDirective(TransformObjectFields);

impl RemoveObjectFieldsWithDirective {
    pub fn new(name: impl Into<Pattern>, arguments: IndexMap<String, Pattern>) -> Self {
        let matcher = DirectiveMatcher {
            name: name.into(),
            arguments,
        };
        Self(TransformObjectFields::named(
            "RemoveObjectFieldsWithDirective",
            move |_, _, field| {
                if field.directives.iter().any(|d| matcher.matches(d)) {
                    FieldTransform::Omit
                } else {
                    FieldTransform::Unchanged
                }
            },
        ))
    }
}

forward_transform!(RemoveObjectFieldsWithDirective);
