//! Built-in transforms.
//!
//! Filtering, renaming and modifying transforms only change the schema shape and
//! map request names back; the operational transforms ([`WrapFields`],
//! [`HoistField`], [`ExtractField`], [`WrapQuery`]) also restructure requests and
//! results.

use std::fmt;

use regex::Regex;

/// Implements [`Transform`](crate::transform::Transform) for a newtype by
/// forwarding every phase to the wrapped transform.
macro_rules! forward_transform {
    ($ty:ty) => {
        impl crate::transform::Transform for $ty {
            fn name(&self) -> &str {
                crate::transform::Transform::name(&self.0)
            }

            fn transform_schema(
                &self,
                schema: crate::schema::Schema,
                subschema: &std::sync::Arc<crate::pipeline::SubschemaConfig>,
                transformed_schema: Option<&std::sync::Arc<crate::schema::Schema>>,
            ) -> Result<crate::schema::Schema, crate::error::TransformError> {
                crate::transform::Transform::transform_schema(
                    &self.0,
                    schema,
                    subschema,
                    transformed_schema,
                )
            }

            fn transform_request(
                &self,
                request: crate::execution::Request,
                context: &crate::delegate::DelegationContext,
                state: &mut crate::transform::TransformState,
            ) -> Result<crate::execution::Request, crate::error::TransformError> {
                crate::transform::Transform::transform_request(&self.0, request, context, state)
            }

            fn transform_result(
                &self,
                result: crate::execution::ExecutionResult,
                context: &crate::delegate::DelegationContext,
                state: &mut crate::transform::TransformState,
            ) -> Result<crate::execution::ExecutionResult, crate::error::TransformError> {
                crate::transform::Transform::transform_result(&self.0, result, context, state)
            }
        }
    };
}

mod extract;
mod filter;
mod groom;
mod hoist;
mod modify;
mod paths;
mod prune;
mod rename;
mod wrap_fields;
mod wrap_query;

pub use extract::ExtractField;
pub use filter::{
    FilterInputObjectFields, FilterInterfaceFields, FilterObjectFieldDirectives,
    FilterObjectFields, FilterRootFields, FilterTypes,
};
pub use groom::{
    RemoveObjectFieldDeprecations, RemoveObjectFieldDirectives, RemoveObjectFieldsWithDeprecation,
    RemoveObjectFieldsWithDirective,
};
pub use hoist::HoistField;
pub use modify::{
    FieldTransform, TransformInputObjectFields, TransformInterfaceFields, TransformObjectFields,
    TransformRootFields,
};
pub use prune::{PruneOptions, PruneSchema};
pub use rename::{
    RenameInputObjectFields, RenameInterfaceFields, RenameObjectFieldArguments, RenameObjectFields,
    RenameRootFields, RenameRootTypes, RenameTypes, RenameTypesOptions,
};
pub use wrap_fields::{WrapFields, WrapType};
pub use wrap_query::WrapQuery;

/// A name or value matcher: exact string or regular expression.
#[derive(Clone)]
pub enum Pattern {
    Exact(String),
    Regex(Regex),
}

impl Pattern {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Exact(expected) => expected == value,
            Pattern::Regex(regex) => regex.is_match(value),
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Pattern::Exact(value.to_string())
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Pattern::Exact(value)
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Pattern::Regex(regex)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(value) => write!(f, "{:?}", value),
            Pattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matching() {
        assert!(Pattern::from("deprecated").matches("deprecated"));
        assert!(!Pattern::from("deprecated").matches("deprecated2"));

        let pattern = Pattern::from(Regex::new("^internal").unwrap());
        assert!(pattern.matches("internal only"));
        assert!(!pattern.matches("not internal"));
        assert_eq!(format!("{:?}", pattern), "/^internal/");
    }
}
