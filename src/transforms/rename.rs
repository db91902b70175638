//! Renaming transforms.
//!
//! Type renames rewrite type conditions and variable types back to original
//! names on the way out and rewrite `__typename` values to gateway names on the
//! way back. Field renames are answered by aliases, see [`super::modify`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::delegate::DelegationContext;
use crate::document::{Field, Selection, SelectionSet};
use crate::error::TransformError;
use crate::execution::{ExecutionResult, Request};
use crate::pipeline::SubschemaConfig;
use crate::schema::{FieldDef, InputValueDef, Schema, TypeDef, TypeKind};
use crate::transform::{Transform, TransformState};
use crate::types::{OperationKind, TYPENAME_FIELD};
use crate::visit::{walk_document, SelectionVisitor};

use super::modify::{
    FieldTransform, TransformInputObjectFields, TransformInterfaceFields, TransformObjectFields,
    TransformRootFields,
};

type Renamer = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Which types [`RenameTypes`] may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenameTypesOptions {
    /// Rename `Int`, `Float`, `String`, `Boolean` and `ID` too.
    pub rename_builtins: bool,
    /// Rename custom scalars.
    pub rename_scalars: bool,
}

impl Default for RenameTypesOptions {
    fn default() -> Self {
        Self {
            rename_builtins: false,
            rename_scalars: true,
        }
    }
}

impl RenameTypesOptions {
    pub fn rename_builtins(mut self, value: bool) -> Self {
        self.rename_builtins = value;
        self
    }

    pub fn rename_scalars(mut self, value: bool) -> Self {
        self.rename_scalars = value;
        self
    }
}

/// Renames named types and every reference to them.
///
/// The renamer returns the new name, or `None` to leave a type alone.
///
/// ```
/// use gql_wrap::transforms::RenameTypes;
///
/// let transform = RenameTypes::new(|name| Some(format!("Legacy{}", name)));
/// # let _ = transform;
/// ```
pub struct RenameTypes {
    name: &'static str,
    renamer: Box<Renamer>,
    options: RenameTypesOptions,
    roots_only: bool,
}

impl RenameTypes {
    pub fn new(renamer: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            name: "RenameTypes",
            renamer: Box::new(renamer),
            options: RenameTypesOptions::default(),
            roots_only: false,
        }
    }

    pub fn with_options(mut self, options: RenameTypesOptions) -> Self {
        self.options = options;
        self
    }

    /// `original name -> new name` for the types of `schema` this transform renames.
    fn mapping(&self, schema: &Schema) -> HashMap<String, String> {
        schema
            .types()
            .filter(|t| self.applies_to(schema, t))
            .filter_map(|t| {
                (self.renamer)(&t.name)
                    .filter(|new_name| *new_name != t.name)
                    .map(|new_name| (t.name.clone(), new_name))
            })
            .collect()
    }

    fn applies_to(&self, schema: &Schema, type_def: &TypeDef) -> bool {
        if self.roots_only {
            return schema.root_kind_of(&type_def.name).is_some();
        }
        if type_def.is_builtin() {
            return self.options.rename_builtins;
        }
        !matches!(type_def.kind, TypeKind::Scalar) || self.options.rename_scalars
    }
}

impl Transform for RenameTypes {
    fn name(&self) -> &str {
        self.name
    }

    fn transform_schema(
        &self,
        schema: Schema,
        _subschema: &Arc<SubschemaConfig>,
        _transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        let mapping = self.mapping(&schema);
        if mapping.is_empty() {
            return Ok(schema);
        }
        let builtins: Vec<String> = mapping
            .keys()
            .filter(|name| schema.type_def(name).is_some_and(TypeDef::is_builtin))
            .cloned()
            .collect();

        let mut builder = schema.into_builder();
        // Built-in scalars are implicit; renamed ones need an explicit definition.
        builder.types.extend(builtins.into_iter().map(TypeDef::scalar));
        builder.rename_types(&|name: &str| mapping.get(name).cloned());
        builder
            .build()
            .map_err(|e| TransformError::schema(self.name, e))
    }

    fn transform_request(
        &self,
        mut request: Request,
        context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        let reverse: HashMap<String, String> = self
            .mapping(context.target_schema(state))
            .into_iter()
            .map(|(old, new)| (new, old))
            .collect();
        if reverse.is_empty() {
            return Ok(request);
        }
        let document = &mut request.document;
        for operation in &mut document.operations {
            for variable in &mut operation.variables {
                variable.ty = variable.ty.map_name(&|name: &str| reverse.get(name).cloned());
            }
            rename_conditions(&mut operation.selection_set, &reverse);
        }
        for fragment in &mut document.fragments {
            if let Some(original) = reverse.get(&fragment.type_condition) {
                fragment.type_condition = original.clone();
            }
            rename_conditions(&mut fragment.selection_set, &reverse);
        }
        Ok(request)
    }

    fn transform_result(
        &self,
        mut result: ExecutionResult,
        context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        let mapping = self.mapping(context.target_schema(state));
        if let Some(data) = &mut result.data {
            rename_typenames(data, &mapping);
        }
        Ok(result)
    }
}

fn rename_conditions(set: &mut SelectionSet, reverse: &HashMap<String, String>) {
    for selection in &mut set.items {
        match selection {
            Selection::Field(field) => rename_conditions(&mut field.selection_set, reverse),
            Selection::InlineFragment(inline) => {
                if let Some(original) = inline
                    .type_condition
                    .as_ref()
                    .and_then(|condition| reverse.get(condition))
                {
                    inline.type_condition = Some(original.clone());
                }
                rename_conditions(&mut inline.selection_set, reverse);
            }
            Selection::FragmentSpread(_) => {}
        }
    }
}

fn rename_typenames(value: &mut Value, mapping: &HashMap<String, String>) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(|item| rename_typenames(item, mapping)),
        Value::Object(object) => {
            for (key, child) in object.iter_mut() {
                match child {
                    Value::String(type_name) if key == TYPENAME_FIELD => {
                        if let Some(new_name) = mapping.get(type_name.as_str()) {
                            *type_name = new_name.clone();
                        }
                    }
                    other => rename_typenames(other, mapping),
                }
            }
        }
        _ => {}
    }
}

/// Renames the root operation types only.
pub struct RenameRootTypes(RenameTypes);

impl RenameRootTypes {
    pub fn new(renamer: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        let mut inner = RenameTypes::new(renamer);
        inner.name = "RenameRootTypes";
        inner.roots_only = true;
        Self(inner)
    }
}

forward_transform!(RenameRootTypes);

fn rename_to<T: Clone>(current: &str, new_name: Option<String>, def: &T) -> FieldTransform<T> {
    match new_name {
        Some(new_name) if new_name != current => FieldTransform::Rename(new_name, def.clone()),
        _ => FieldTransform::Unchanged,
    }
}

/// Renames object fields, called with `(type name, field name, field)`.
pub struct RenameObjectFields(TransformObjectFields);

impl RenameObjectFields {
    pub fn new(
        renamer: impl Fn(&str, &str, &FieldDef) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self(TransformObjectFields::named(
            "RenameObjectFields",
            move |type_name, field_name, field| {
                rename_to(field_name, renamer(type_name, field_name, field), field)
            },
        ))
    }
}

forward_transform!(RenameObjectFields);

/// Renames root fields.
pub struct RenameRootFields(TransformRootFields);

impl RenameRootFields {
    pub fn new(
        renamer: impl Fn(OperationKind, &str, &FieldDef) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self(TransformRootFields::named(
            "RenameRootFields",
            move |kind, field_name, field| {
                rename_to(field_name, renamer(kind, field_name, field), field)
            },
        ))
    }
}

forward_transform!(RenameRootFields);

/// Renames interface fields.
pub struct RenameInterfaceFields(TransformInterfaceFields);

impl RenameInterfaceFields {
    pub fn new(
        renamer: impl Fn(&str, &str, &FieldDef) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self(TransformInterfaceFields::named(
            "RenameInterfaceFields",
            move |type_name, field_name, field| {
                rename_to(field_name, renamer(type_name, field_name, field), field)
            },
        ))
    }
}

forward_transform!(RenameInterfaceFields);

/// Renames input object fields.
pub struct RenameInputObjectFields(TransformInputObjectFields);

impl RenameInputObjectFields {
    pub fn new(
        renamer: impl Fn(&str, &str, &InputValueDef) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self(TransformInputObjectFields::named(
            "RenameInputObjectFields",
            move |type_name, field_name, field| {
                rename_to(field_name, renamer(type_name, field_name, field), field)
            },
        ))
    }
}

forward_transform!(RenameInputObjectFields);

type ArgumentRenamer = dyn Fn(&str, &str, &str) -> Option<String> + Send + Sync;

/// Renames arguments of object fields, called with
/// `(type name, field name, argument name)`.
pub struct RenameObjectFieldArguments {
    renamer: Box<ArgumentRenamer>,
}

impl RenameObjectFieldArguments {
    pub fn new(
        renamer: impl Fn(&str, &str, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            renamer: Box::new(renamer),
        }
    }

    /// `(type, field, gateway argument) -> original argument`.
    fn reverse(&self, schema: &Schema) -> HashMap<(String, String, String), String> {
        let mut reverse = HashMap::new();
        for type_def in schema.types().filter(|t| t.is_object()) {
            for (field_name, field) in type_def.fields().into_iter().flatten() {
                for argument in &field.arguments {
                    if let Some(new_name) = (self.renamer)(&type_def.name, field_name, &argument.name)
                    {
                        reverse.insert(
                            (type_def.name.clone(), field_name.clone(), new_name),
                            argument.name.clone(),
                        );
                    }
                }
            }
        }
        reverse
    }
}

impl Transform for RenameObjectFieldArguments {
    fn name(&self) -> &str {
        "RenameObjectFieldArguments"
    }

    fn transform_schema(
        &self,
        schema: Schema,
        _subschema: &Arc<SubschemaConfig>,
        _transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        let mut builder = schema.into_builder();
        for type_def in builder.types.iter_mut().filter(|t| t.is_object()) {
            let type_name = type_def.name.clone();
            for (field_name, field) in type_def.fields_mut().into_iter().flatten() {
                for argument in &mut field.arguments {
                    if let Some(new_name) = (self.renamer)(&type_name, field_name, &argument.name) {
                        argument.name = new_name;
                    }
                }
            }
        }
        builder
            .build()
            .map_err(|e| TransformError::schema(self.name(), e))
    }

    fn transform_request(
        &self,
        mut request: Request,
        context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        let reverse = self.reverse(context.target_schema(state));
        if reverse.is_empty() {
            return Ok(request);
        }
        walk_document(
            &mut request.document,
            context.transformed_schema(state),
            &mut ArgumentsBack { reverse: &reverse },
        );
        Ok(request)
    }
}

struct ArgumentsBack<'a> {
    reverse: &'a HashMap<(String, String, String), String>,
}

impl SelectionVisitor for ArgumentsBack<'_> {
    fn leave_field(&mut self, parent_type: &str, field: &mut Field) -> bool {
        for (name, _) in &mut field.arguments {
            let key = (parent_type.to_string(), field.name.clone(), name.clone());
            if let Some(original) = self.reverse.get(&key) {
                *name = original.clone();
            }
        }
        true
    }
}
