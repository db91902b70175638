//! Nesting fields of a type under new intermediate object types.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::delegate::{DelegatingResolver, DelegationContext};
use crate::document::{Field, Selection, SelectionSet};
use crate::error::TransformError;
use crate::execution::{ExecutionResult, Request};
use crate::pipeline::SubschemaConfig;
use crate::schema::{FieldDef, Resolver, Schema, TypeDef};
use crate::transform::{Transform, TransformState};
use crate::types::{Phase, TypeRef, TYPENAME_FIELD};

use super::paths::{
    for_each_object_at, inline_fragment_spreads, insert_at, relocate_path, Aliases,
};

/// Moves fields of `outer` under a chain of new wrapper fields and types.
///
/// With wrapping fields `[a, b]` and types `[A, B]`, `outer` gets a field
/// `a: A!`, `A` gets `b: B!` and `B` receives the wrapped fields. Requests
/// through the wrappers are flattened back onto `outer` and results are
/// nested again.
///
/// ```
/// use gql_wrap::transforms::WrapFields;
///
/// let transform = WrapFields::new(
///     "Query",
///     vec!["admin".into()],
///     vec!["AdminQuery".into()],
///     Some(vec!["users".into(), "audit".into()]),
/// );
/// # let _ = transform;
/// ```
pub struct WrapFields {
    outer: String,
    wrapping_field_names: Vec<String>,
    wrapping_type_names: Vec<String>,
    field_names: Option<Vec<String>>,
}

impl WrapFields {
    /// `field_names` selects the fields to wrap; `None` wraps all of them.
    pub fn new(
        outer: impl Into<String>,
        wrapping_field_names: Vec<String>,
        wrapping_type_names: Vec<String>,
        field_names: Option<Vec<String>>,
    ) -> Self {
        Self {
            outer: outer.into(),
            wrapping_field_names,
            wrapping_type_names,
            field_names,
        }
    }

    fn wraps(&self, field_name: &str) -> bool {
        self.field_names
            .as_ref()
            .map_or(true, |names| names.iter().any(|name| name == field_name))
    }

    fn fail(&self, message: impl Into<String>) -> TransformError {
        TransformError::new(self.name(), Phase::Schema, message)
    }
}

impl Transform for WrapFields {
    fn name(&self) -> &str {
        "WrapFields"
    }

    fn transform_schema(
        &self,
        schema: Schema,
        subschema: &Arc<SubschemaConfig>,
        transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        let depth = self.wrapping_field_names.len();
        if depth == 0 || depth != self.wrapping_type_names.len() {
            return Err(self.fail(
                "wrapping field names and wrapping type names must be non-empty and of equal length",
            ));
        }
        let root_kind = schema.root_kind_of(&self.outer);
        let mut builder = schema.into_builder();

        let fields = builder
            .type_def_mut(&self.outer)
            .filter(|t| t.is_object())
            .and_then(TypeDef::fields_mut)
            .ok_or_else(|| self.fail(format!("`{}` is not an object type", self.outer)))?;

        let mut wrapped = IndexMap::new();
        for (name, mut field) in std::mem::take(fields) {
            if self.wraps(&name) {
                field.resolver = None;
                wrapped.insert(name, field);
            } else {
                fields.insert(name, field);
            }
        }

        let mut entry = FieldDef::new(
            self.wrapping_field_names[0].as_str(),
            TypeRef::non_null(TypeRef::named(self.wrapping_type_names[0].as_str())),
        );
        // Wired on the second pass, once the final shape is known.
        if let (Some(kind), Some(_)) = (root_kind, transformed_schema) {
            entry.resolver =
                Some(Arc::new(DelegatingResolver::new(subschema.clone(), kind)) as Resolver);
        }
        fields.insert(entry.name.clone(), entry);

        for level in (0..depth).rev() {
            let type_name = self.wrapping_type_names[level].as_str();
            let type_def = if level + 1 == depth {
                TypeDef::object(type_name, std::mem::take(&mut wrapped).into_values().collect())
            } else {
                TypeDef::object(
                    type_name,
                    vec![FieldDef::new(
                        self.wrapping_field_names[level + 1].as_str(),
                        TypeRef::non_null(TypeRef::named(
                            self.wrapping_type_names[level + 1].as_str(),
                        )),
                    )],
                )
            };
            builder.types.push(type_def);
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
        inline_fragment_spreads(&mut request.document);
        let schema = context.transformed_schema(state);
        let mut rewriter = Rewriter {
            wrap: self,
            schema,
            aliases: Aliases::new(state.position()),
            records: Vec::new(),
        };
        for operation in &mut request.document.operations {
            if let Some(root) = schema.root_type_name(operation.kind) {
                rewriter.rewrite_set(&mut operation.selection_set, root, &[]);
            }
        }
        state.insert(rewriter.records);
        Ok(request)
    }

    fn transform_result(
        &self,
        mut result: ExecutionResult,
        _context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        let records: Vec<Record> = state.require(self.name(), "wrapped field records")?;
        restore(&mut result, &records);
        Ok(result)
    }
}

/// How a piece of the upstream result goes back into gateway shape.
#[derive(Debug, Clone)]
pub(crate) enum Restore {
    /// Move the value at `alias` to `target`.
    Move { alias: String, target: Vec<String> },
    /// Write a constant string at `target`.
    Constant { target: Vec<String>, value: String },
    /// Remove a placeholder selection.
    Drop { alias: String },
}

/// A restore step applied to every object found at `parent`.
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub(crate) parent: Vec<String>,
    pub(crate) restore: Restore,
}

impl Restore {
    fn apply(&self, object: &mut Map<String, Value>) {
        match self {
            Restore::Move { alias, target } => {
                if let Some(value) = object.remove(alias) {
                    insert_at(object, target, value);
                }
            }
            Restore::Constant { target, value } => {
                insert_at(object, target, Value::String(value.clone()));
            }
            Restore::Drop { alias } => {
                object.remove(alias);
            }
        }
    }
}

/// Applies `records` last to first, relocating error paths along with data.
pub(crate) fn restore(result: &mut ExecutionResult, records: &[Record]) {
    for record in records.iter().rev() {
        if let Some(data) = &mut result.data {
            for_each_object_at(data, &record.parent, &mut |object| record.restore.apply(object));
        }
        if let Restore::Move { alias, target } = &record.restore {
            for error in &mut result.errors {
                relocate_path(&mut error.path, &record.parent, alias, target);
            }
        }
    }
}

/// Adds an aliased `__typename` to `set` if it is empty, so the object still
/// shows up in the result.
pub(crate) fn keep_non_empty(
    set: &mut SelectionSet,
    path: &[String],
    aliases: &mut Aliases,
    records: &mut Vec<Record>,
) {
    if !set.is_empty() {
        return;
    }
    let alias = aliases.next();
    set.push(Field::new(TYPENAME_FIELD).with_alias(alias.as_str()));
    records.push(Record {
        parent: path.to_vec(),
        restore: Restore::Drop { alias },
    });
}

struct Rewriter<'a> {
    wrap: &'a WrapFields,
    schema: &'a Schema,
    aliases: Aliases,
    records: Vec<Record>,
}

impl Rewriter<'_> {
    fn child_type(&self, parent_type: &str, field_name: &str) -> Option<String> {
        self.schema
            .field(parent_type, field_name)
            .map(|def| def.ty.name().to_string())
    }

    fn rewrite_set(&mut self, set: &mut SelectionSet, parent_type: &str, path: &[String]) {
        let had_items = !set.is_empty();
        for selection in std::mem::take(&mut set.items) {
            match selection {
                Selection::Field(field)
                    if parent_type == self.wrap.outer
                        && field.name == self.wrap.wrapping_field_names[0] =>
                {
                    let prefix = vec![field.response_key().to_string()];
                    let mut leaves = Vec::new();
                    self.flatten(field.selection_set, 0, prefix, path, &mut leaves);
                    set.items.extend(leaves);
                }
                Selection::Field(mut field) => {
                    if let Some(child_type) = self.child_type(parent_type, &field.name) {
                        let mut child_path = path.to_vec();
                        child_path.push(field.response_key().to_string());
                        self.rewrite_set(&mut field.selection_set, &child_type, &child_path);
                    }
                    set.items.push(Selection::Field(field));
                }
                Selection::InlineFragment(mut inline) => {
                    let condition = inline
                        .type_condition
                        .clone()
                        .unwrap_or_else(|| parent_type.to_string());
                    self.rewrite_set(&mut inline.selection_set, &condition, path);
                    set.items.push(Selection::InlineFragment(inline));
                }
                spread => set.items.push(spread),
            }
        }
        if had_items {
            keep_non_empty(set, path, &mut self.aliases, &mut self.records);
        }
    }

    /// Replaces the selections of wrapper level `level` by aliased selections
    /// on the outer type, recording where each one belongs.
    fn flatten(
        &mut self,
        set: SelectionSet,
        level: usize,
        prefix: Vec<String>,
        path: &[String],
        out: &mut Vec<Selection>,
    ) {
        let wrapper_type = self.wrap.wrapping_type_names[level].clone();
        let next_wrapper = self.wrap.wrapping_field_names.get(level + 1).cloned();
        for selection in set.items {
            match selection {
                Selection::Field(field) if field.name == TYPENAME_FIELD => {
                    let mut target = prefix.clone();
                    target.push(field.response_key().to_string());
                    self.records.push(Record {
                        parent: path.to_vec(),
                        restore: Restore::Constant {
                            target,
                            value: wrapper_type.clone(),
                        },
                    });
                }
                Selection::Field(field) if next_wrapper.as_deref() == Some(field.name.as_str()) => {
                    let mut nested = prefix.clone();
                    nested.push(field.response_key().to_string());
                    self.flatten(field.selection_set, level + 1, nested, path, out);
                }
                Selection::Field(mut field) => {
                    let alias = self.aliases.next();
                    let mut target = prefix.clone();
                    target.push(field.response_key().to_string());
                    self.records.push(Record {
                        parent: path.to_vec(),
                        restore: Restore::Move {
                            alias: alias.clone(),
                            target,
                        },
                    });
                    if let Some(child_type) = self.child_type(&wrapper_type, &field.name) {
                        let mut child_path = path.to_vec();
                        child_path.push(alias.clone());
                        self.rewrite_set(&mut field.selection_set, &child_type, &child_path);
                    }
                    field.alias = Some(alias);
                    out.push(Selection::Field(field));
                }
                Selection::InlineFragment(inline) => {
                    self.flatten(inline.selection_set, level, prefix.clone(), path, out)
                }
                spread => out.push(spread),
            }
        }
    }
}

/// Single-level [`WrapFields`]: moves every field of `outer` under
/// `field_name: type_name!`.
pub struct WrapType(WrapFields);

impl WrapType {
    pub fn new(
        outer: impl Into<String>,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self(WrapFields::new(
            outer,
            vec![field_name.into()],
            vec![type_name.into()],
            None,
        ))
    }
}

forward_transform!(WrapType);
