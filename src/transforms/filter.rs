//! Transforms that remove parts of the schema.

use std::sync::Arc;

use crate::document::InputValue;
use crate::error::TransformError;
use crate::pipeline::SubschemaConfig;
use crate::schema::{FieldDef, InputValueDef, Schema, TypeDef};
use crate::transform::Transform;
use crate::types::OperationKind;

use super::modify::{
    FieldTransform, TransformInputObjectFields, TransformInterfaceFields, TransformObjectFields,
    TransformRootFields,
};

type TypeFilter = dyn Fn(&TypeDef) -> bool + Send + Sync;

/// Keeps only the named types accepted by the filter. Fields, arguments,
/// union members and interfaces referring to a removed type go with it.
pub struct FilterTypes {
    filter: Box<TypeFilter>,
}

impl FilterTypes {
    pub fn new(filter: impl Fn(&TypeDef) -> bool + Send + Sync + 'static) -> Self {
        Self {
            filter: Box::new(filter),
        }
    }
}

impl Transform for FilterTypes {
    fn name(&self) -> &str {
        "FilterTypes"
    }

    fn transform_schema(
        &self,
        schema: Schema,
        _subschema: &Arc<SubschemaConfig>,
        _transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        let mut builder = schema.into_builder();
        builder.types.retain(|type_def| (self.filter)(type_def));
        builder.remove_dangling();
        builder
            .build()
            .map_err(|e| TransformError::schema(self.name(), e))
    }
}

fn keep_or_omit<T>(keep: bool) -> FieldTransform<T> {
    if keep {
        FieldTransform::Unchanged
    } else {
        FieldTransform::Omit
    }
}

/// Keeps the root fields accepted by the filter.
pub struct FilterRootFields(TransformRootFields);

impl FilterRootFields {
    pub fn new(filter: impl Fn(OperationKind, &str, &FieldDef) -> bool + Send + Sync + 'static) -> Self {
        Self(TransformRootFields::named(
            "FilterRootFields",
            move |kind, field_name, field| keep_or_omit(filter(kind, field_name, field)),
        ))
    }
}

forward_transform!(FilterRootFields);

/// Keeps the object fields accepted by the filter, called with
/// `(type name, field name, field)`.
pub struct FilterObjectFields(TransformObjectFields);

impl FilterObjectFields {
    pub fn new(filter: impl Fn(&str, &str, &FieldDef) -> bool + Send + Sync + 'static) -> Self {
        Self(TransformObjectFields::named(
            "FilterObjectFields",
            move |type_name, field_name, field| keep_or_omit(filter(type_name, field_name, field)),
        ))
    }
}

forward_transform!(FilterObjectFields);

/// Keeps the interface fields accepted by the filter.
pub struct FilterInterfaceFields(TransformInterfaceFields);

impl FilterInterfaceFields {
    pub fn new(filter: impl Fn(&str, &str, &FieldDef) -> bool + Send + Sync + 'static) -> Self {
        Self(TransformInterfaceFields::named(
            "FilterInterfaceFields",
            move |type_name, field_name, field| keep_or_omit(filter(type_name, field_name, field)),
        ))
    }
}

forward_transform!(FilterInterfaceFields);

/// Keeps the input object fields accepted by the filter.
pub struct FilterInputObjectFields(TransformInputObjectFields);

impl FilterInputObjectFields {
    pub fn new(
        filter: impl Fn(&str, &str, &InputValueDef) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self(TransformInputObjectFields::named(
            "FilterInputObjectFields",
            move |type_name, field_name, field| keep_or_omit(filter(type_name, field_name, field)),
        ))
    }
}

forward_transform!(FilterInputObjectFields);

/// Keeps the directives on object fields accepted by the filter, called with
/// the directive name and its arguments.
pub struct FilterObjectFieldDirectives(TransformObjectFields);

impl FilterObjectFieldDirectives {
    pub fn new(
        filter: impl Fn(&str, &[(String, InputValue)]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self(TransformObjectFields::named(
            "FilterObjectFieldDirectives",
            move |_, _, field| {
                let kept: Vec<_> = field
                    .directives
                    .iter()
                    .filter(|directive| filter(&directive.name, &directive.arguments))
                    .cloned()
                    .collect();
                if kept.len() == field.directives.len() {
                    return FieldTransform::Unchanged;
                }
                let mut field = field.clone();
                field.directives = kept;
                FieldTransform::Replace(field)
            },
        ))
    }
}

forward_transform!(FilterObjectFieldDirectives);
