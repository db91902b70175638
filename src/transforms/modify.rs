//! Field-level modifying transforms.
//!
//! One engine serves object, interface and root fields: a field transformer is
//! called once per field in scope and returns a [`FieldTransform`]. Renames are
//! mapped back in the request phase by aliasing the field to its gateway name,
//! so results need no rewriting.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::delegate::DelegationContext;
use crate::document::{Field, InputValue};
use crate::error::TransformError;
use crate::execution::Request;
use crate::pipeline::SubschemaConfig;
use crate::schema::{FieldDef, InputValueDef, Schema, TypeDef, TypeKind};
use crate::transform::{Transform, TransformState};
use crate::types::{OperationKind, TypeRef};
use crate::visit::{walk_document, SelectionVisitor};

/// Outcome of a field transformer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTransform<T = FieldDef> {
    /// Keep the field as it is.
    Unchanged,
    /// Remove the field.
    Omit,
    /// Keep the name, replace the definition.
    Replace(T),
    /// Rename the field and replace its definition.
    Rename(String, T),
}

type FieldFn = dyn Fn(&Schema, &str, &str, &FieldDef) -> FieldTransform + Send + Sync;
type NodeFn = dyn Fn(&str, &str, Field) -> Field + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Objects,
    Interfaces,
    Roots,
}

/// Shared engine behind the object, interface and root field transforms.
pub(crate) struct CompositeFields {
    name: String,
    scope: Scope,
    field_fn: Box<FieldFn>,
    node_fn: Option<Box<NodeFn>>,
}

type Outcomes = HashMap<String, HashMap<String, FieldTransform>>;

impl CompositeFields {
    fn in_scope(&self, schema: &Schema, type_def: &TypeDef) -> bool {
        match self.scope {
            Scope::Objects => type_def.is_object(),
            Scope::Interfaces => matches!(type_def.kind, TypeKind::Interface(_)),
            Scope::Roots => schema.root_kind_of(&type_def.name).is_some(),
        }
    }

    /// Transformer outcome per `(type, field)`. Interface renames and
    /// replacements also apply to the same field on implementing objects.
    fn outcomes(&self, schema: &Schema) -> Outcomes {
        let mut outcomes: Outcomes = HashMap::new();
        for type_def in schema.types().filter(|t| self.in_scope(schema, t)) {
            let Some(fields) = type_def.fields() else {
                continue;
            };
            let by_field = outcomes.entry(type_def.name.clone()).or_default();
            for (field_name, field) in fields {
                let outcome = (self.field_fn)(schema, &type_def.name, field_name, field);
                by_field.insert(field_name.clone(), outcome);
            }
        }
        if self.scope == Scope::Interfaces {
            let implemented = implementor_outcomes(schema, &outcomes);
            for (type_name, by_field) in implemented {
                outcomes.entry(type_name).or_default().extend(by_field);
            }
        }
        outcomes
    }

    /// `(type, gateway name) -> original name` for renamed fields, plus the set
    /// of `(type, gateway name)` pairs the transformer changed.
    fn mapping(&self, schema: &Schema) -> (HashMap<(String, String), String>, HashSet<(String, String)>) {
        let mut renames = HashMap::new();
        let mut touched = HashSet::new();
        for (type_name, by_field) in self.outcomes(schema) {
            for (field_name, outcome) in by_field {
                match outcome {
                    FieldTransform::Rename(new_name, _) => {
                        let key = (type_name.clone(), new_name);
                        renames.insert(key.clone(), field_name);
                        touched.insert(key);
                    }
                    FieldTransform::Replace(_) => {
                        touched.insert((type_name.clone(), field_name));
                    }
                    FieldTransform::Unchanged | FieldTransform::Omit => {}
                }
            }
        }
        (renames, touched)
    }
}

/// Carries interface field renames and replacements over to implementing
/// object types so they keep conforming. Omitted interface fields stay on the
/// objects.
///
/// A replacement equal to the interface field keeps the object's own
/// definition; any other replacement is taken as is, keeping the object's
/// resolver.
fn implementor_outcomes(schema: &Schema, interfaces: &Outcomes) -> Outcomes {
    let mut implemented: Outcomes = HashMap::new();
    for type_def in schema.types() {
        let TypeKind::Object(body) = &type_def.kind else {
            continue;
        };
        for interface in &body.interfaces {
            let Some(by_field) = interfaces.get(interface) else {
                continue;
            };
            for (field_name, outcome) in by_field {
                let Some(own) = body.fields.get(field_name) else {
                    continue;
                };
                let slot = implemented.entry(type_def.name.clone()).or_default();
                if slot.contains_key(field_name) {
                    continue;
                }
                let declared = schema.field(interface, field_name);
                let adapt = |replacement: &FieldDef| {
                    if declared == Some(replacement) {
                        own.clone()
                    } else {
                        FieldDef {
                            resolver: own.resolver.clone(),
                            ..replacement.clone()
                        }
                    }
                };
                let carried = match outcome {
                    FieldTransform::Unchanged | FieldTransform::Omit => continue,
                    FieldTransform::Replace(replacement) => FieldTransform::Replace(adapt(replacement)),
                    FieldTransform::Rename(new_name, replacement) => {
                        FieldTransform::Rename(new_name.clone(), adapt(replacement))
                    }
                };
                slot.insert(field_name.clone(), carried);
            }
        }
    }
    implemented
}

impl Transform for CompositeFields {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform_schema(
        &self,
        schema: Schema,
        _subschema: &Arc<SubschemaConfig>,
        _transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        let mut outcomes_by_type = self.outcomes(&schema);

        let mut builder = schema.into_builder();
        for type_def in &mut builder.types {
            let Some(mut outcomes) = outcomes_by_type.remove(&type_def.name) else {
                continue;
            };
            let Some(fields) = type_def.fields_mut() else {
                continue;
            };
            let original = std::mem::take(fields);
            for (field_name, field) in original {
                match outcomes.remove(&field_name).unwrap_or(FieldTransform::Unchanged) {
                    FieldTransform::Unchanged => {
                        fields.insert(field_name, field);
                    }
                    FieldTransform::Omit => {}
                    FieldTransform::Replace(mut replacement) => {
                        replacement.name = field_name.clone();
                        fields.insert(field_name, replacement);
                    }
                    FieldTransform::Rename(new_name, mut replacement) => {
                        replacement.name = new_name.clone();
                        fields.insert(new_name, replacement);
                    }
                }
            }
        }
        builder
            .build()
            .map_err(|e| TransformError::schema(self.name.as_str(), e))
    }

    fn transform_request(
        &self,
        mut request: Request,
        context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        let (renames, touched) = self.mapping(context.target_schema(state));
        if renames.is_empty() && (self.node_fn.is_none() || touched.is_empty()) {
            return Ok(request);
        }
        let mut visitor = RenameBack {
            renames: &renames,
            touched: &touched,
            node_fn: self.node_fn.as_deref(),
        };
        walk_document(
            &mut request.document,
            context.transformed_schema(state),
            &mut visitor,
        );
        Ok(request)
    }
}

struct RenameBack<'a> {
    renames: &'a HashMap<(String, String), String>,
    touched: &'a HashSet<(String, String)>,
    node_fn: Option<&'a NodeFn>,
}

impl SelectionVisitor for RenameBack<'_> {
    fn leave_field(&mut self, parent_type: &str, field: &mut Field) -> bool {
        let key = (parent_type.to_string(), field.name.clone());
        if let Some(node_fn) = self.node_fn {
            if self.touched.contains(&key) {
                let node = std::mem::replace(field, Field::new(String::new()));
                *field = node_fn(parent_type, &key.1, node);
            }
        }
        if field.name == key.1 {
            if let Some(original) = self.renames.get(&key) {
                if field.alias.is_none() {
                    field.alias = Some(field.name.clone());
                }
                field.name = original.clone();
            }
        }
        true
    }
}

/// Modifies, renames or removes fields of object types, root types included.
///
/// ```
/// use gql_wrap::transforms::{FieldTransform, TransformObjectFields};
///
/// let transform = TransformObjectFields::new(|type_name, field_name, field| {
///     if type_name == "User" && field_name == "email" {
///         FieldTransform::Rename("contact".into(), field.clone())
///     } else {
///         FieldTransform::Unchanged
///     }
/// });
/// # let _ = transform;
/// ```
pub struct TransformObjectFields(pub(crate) CompositeFields);

impl TransformObjectFields {
    pub fn new(
        transformer: impl Fn(&str, &str, &FieldDef) -> FieldTransform + Send + Sync + 'static,
    ) -> Self {
        Self::named("TransformObjectFields", transformer)
    }

    pub(crate) fn named(
        name: &str,
        transformer: impl Fn(&str, &str, &FieldDef) -> FieldTransform + Send + Sync + 'static,
    ) -> Self {
        Self(CompositeFields {
            name: name.to_string(),
            scope: Scope::Objects,
            field_fn: Box::new(move |_, type_name, field_name, field| {
                transformer(type_name, field_name, field)
            }),
            node_fn: None,
        })
    }

    /// Rewrites request nodes selecting a changed field. The node arrives with
    /// its sub-selections already mapped and must come back valid against the
    /// schema this transform was applied to.
    pub fn with_node_transformer(
        mut self,
        transformer: impl Fn(&str, &str, Field) -> Field + Send + Sync + 'static,
    ) -> Self {
        self.0.node_fn = Some(Box::new(transformer));
        self
    }
}

forward_transform!(TransformObjectFields);

/// Modifies, renames or removes fields of interface types.
pub struct TransformInterfaceFields(pub(crate) CompositeFields);

impl TransformInterfaceFields {
    pub fn new(
        transformer: impl Fn(&str, &str, &FieldDef) -> FieldTransform + Send + Sync + 'static,
    ) -> Self {
        Self::named("TransformInterfaceFields", transformer)
    }

    pub(crate) fn named(
        name: &str,
        transformer: impl Fn(&str, &str, &FieldDef) -> FieldTransform + Send + Sync + 'static,
    ) -> Self {
        Self(CompositeFields {
            name: name.to_string(),
            scope: Scope::Interfaces,
            field_fn: Box::new(move |_, type_name, field_name, field| {
                transformer(type_name, field_name, field)
            }),
            node_fn: None,
        })
    }

    pub fn with_node_transformer(
        mut self,
        transformer: impl Fn(&str, &str, Field) -> Field + Send + Sync + 'static,
    ) -> Self {
        self.0.node_fn = Some(Box::new(transformer));
        self
    }
}

forward_transform!(TransformInterfaceFields);

/// Modifies, renames or removes root fields, keyed by operation kind.
pub struct TransformRootFields(pub(crate) CompositeFields);

impl TransformRootFields {
    pub fn new(
        transformer: impl Fn(OperationKind, &str, &FieldDef) -> FieldTransform + Send + Sync + 'static,
    ) -> Self {
        Self::named("TransformRootFields", transformer)
    }

    pub(crate) fn named(
        name: &str,
        transformer: impl Fn(OperationKind, &str, &FieldDef) -> FieldTransform + Send + Sync + 'static,
    ) -> Self {
        Self(CompositeFields {
            name: name.to_string(),
            scope: Scope::Roots,
            field_fn: Box::new(move |schema, type_name, field_name, field| {
                match schema.root_kind_of(type_name) {
                    Some(kind) => transformer(kind, field_name, field),
                    None => FieldTransform::Unchanged,
                }
            }),
            node_fn: None,
        })
    }

    pub fn with_node_transformer(
        mut self,
        transformer: impl Fn(&str, &str, Field) -> Field + Send + Sync + 'static,
    ) -> Self {
        self.0.node_fn = Some(Box::new(transformer));
        self
    }
}

forward_transform!(TransformRootFields);

type InputFieldFn =
    dyn Fn(&str, &str, &InputValueDef) -> FieldTransform<InputValueDef> + Send + Sync;

/// Modifies, renames or removes fields of input object types.
///
/// Renamed keys are mapped back in argument literals, variable defaults and
/// variable values.
pub struct TransformInputObjectFields {
    name: String,
    transformer: Box<InputFieldFn>,
}

impl TransformInputObjectFields {
    pub fn new(
        transformer: impl Fn(&str, &str, &InputValueDef) -> FieldTransform<InputValueDef>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::named("TransformInputObjectFields", transformer)
    }

    pub(crate) fn named(
        name: &str,
        transformer: impl Fn(&str, &str, &InputValueDef) -> FieldTransform<InputValueDef>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            transformer: Box::new(transformer),
        }
    }

    /// `(input type, gateway key) -> original key`.
    fn renames(&self, schema: &Schema) -> HashMap<(String, String), String> {
        let mut renames = HashMap::new();
        for type_def in schema.types() {
            let TypeKind::InputObject(fields) = &type_def.kind else {
                continue;
            };
            for (field_name, field) in fields {
                if let FieldTransform::Rename(new_name, _) =
                    (self.transformer)(&type_def.name, field_name, field)
                {
                    renames.insert((type_def.name.clone(), new_name), field_name.clone());
                }
            }
        }
        renames
    }
}

impl Transform for TransformInputObjectFields {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform_schema(
        &self,
        schema: Schema,
        _subschema: &Arc<SubschemaConfig>,
        _transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        let mut builder = schema.into_builder();
        for type_def in &mut builder.types {
            let type_name = type_def.name.clone();
            let TypeKind::InputObject(fields) = &mut type_def.kind else {
                continue;
            };
            let original = std::mem::take(fields);
            for (field_name, field) in original {
                match (self.transformer)(&type_name, &field_name, &field) {
                    FieldTransform::Unchanged => {
                        fields.insert(field_name, field);
                    }
                    FieldTransform::Omit => {}
                    FieldTransform::Replace(mut replacement) => {
                        replacement.name = field_name.clone();
                        fields.insert(field_name, replacement);
                    }
                    FieldTransform::Rename(new_name, mut replacement) => {
                        replacement.name = new_name.clone();
                        fields.insert(new_name, replacement);
                    }
                }
            }
        }
        builder
            .build()
            .map_err(|e| TransformError::schema(self.name.as_str(), e))
    }

    fn transform_request(
        &self,
        mut request: Request,
        context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        let renames = self.renames(context.target_schema(state));
        if renames.is_empty() {
            return Ok(request);
        }
        let schema = context.transformed_schema(state);
        let inputs = InputRenamer {
            schema,
            renames: &renames,
        };

        for operation in &mut request.document.operations {
            for variable in &mut operation.variables {
                if let Some(default) = &mut variable.default_value {
                    inputs.literal(default, &variable.ty);
                }
                if let Some(value) = request.variables.get_mut(&variable.name) {
                    inputs.json(value, &variable.ty);
                }
            }
        }
        walk_document(&mut request.document, schema, &mut ArgumentRenamer { inputs: &inputs });
        Ok(request)
    }
}

struct InputRenamer<'a> {
    schema: &'a Schema,
    renames: &'a HashMap<(String, String), String>,
}

impl InputRenamer<'_> {
    fn key(&self, type_name: &str, key: &str) -> Option<&String> {
        self.renames.get(&(type_name.to_string(), key.to_string()))
    }

    fn field_type(&self, type_name: &str, key: &str) -> Option<TypeRef> {
        self.schema
            .input_fields(type_name)
            .and_then(|fields| fields.get(key))
            .map(|field| field.ty.clone())
    }

    fn literal(&self, value: &mut InputValue, ty: &TypeRef) {
        match value {
            InputValue::List(items) => {
                let item_ty = match ty.nullable() {
                    TypeRef::List(inner) => inner.as_ref(),
                    other => other,
                };
                for item in items {
                    self.literal(item, item_ty);
                }
            }
            InputValue::Object(fields) => {
                let type_name = ty.name();
                let original = std::mem::take(fields);
                let mut renamed = IndexMap::with_capacity(original.len());
                for (key, mut child) in original {
                    if let Some(child_ty) = self.field_type(type_name, &key) {
                        self.literal(&mut child, &child_ty);
                    }
                    let key = self.key(type_name, &key).cloned().unwrap_or(key);
                    renamed.insert(key, child);
                }
                *fields = renamed;
            }
            _ => {}
        }
    }

    fn json(&self, value: &mut Value, ty: &TypeRef) {
        match value {
            Value::Array(items) => {
                let item_ty = match ty.nullable() {
                    TypeRef::List(inner) => inner.as_ref(),
                    other => other,
                };
                for item in items {
                    self.json(item, item_ty);
                }
            }
            Value::Object(fields) => {
                let type_name = ty.name();
                let original = std::mem::take(fields);
                for (key, mut child) in original {
                    if let Some(child_ty) = self.field_type(type_name, &key) {
                        self.json(&mut child, &child_ty);
                    }
                    let key = self.key(type_name, &key).cloned().unwrap_or(key);
                    fields.insert(key, child);
                }
            }
            _ => {}
        }
    }
}

struct ArgumentRenamer<'a> {
    inputs: &'a InputRenamer<'a>,
}

impl SelectionVisitor for ArgumentRenamer<'_> {
    fn leave_field(&mut self, parent_type: &str, field: &mut Field) -> bool {
        let Some(definition) = self.inputs.schema.field(parent_type, &field.name) else {
            return true;
        };
        for (name, value) in &mut field.arguments {
            if let Some(argument) = definition.argument(name) {
                self.inputs.literal(value, &argument.ty);
            }
        }
        true
    }
}
