//! Lifting a nested field onto an ancestor type.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::delegate::{DelegatingResolver, DelegationContext};
use crate::document::{Field, Selection, SelectionSet};
use crate::error::TransformError;
use crate::execution::{ExecutionResult, Request};
use crate::pipeline::SubschemaConfig;
use crate::schema::{FieldDef, Resolver, Schema};
use crate::transform::{Transform, TransformState};
use crate::types::{Phase, TypeRef};

use super::paths::{for_each_object_at, inline_fragment_spreads, relocate_keys, Aliases};

/// Exposes the field at `path` below `type_name` directly on `type_name`
/// as `new_field_name`, and removes it from its original parent.
///
/// ```
/// use gql_wrap::transforms::HoistField;
///
/// // Query.viewer.profile becomes Query.profile
/// let transform = HoistField::new("Query", vec!["viewer".into(), "profile".into()], "profile");
/// # let _ = transform;
/// ```
pub struct HoistField {
    type_name: String,
    path: Vec<String>,
    new_field_name: String,
}

impl HoistField {
    pub fn new(
        type_name: impl Into<String>,
        path: Vec<String>,
        new_field_name: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            path,
            new_field_name: new_field_name.into(),
        }
    }

    fn fail(&self, message: impl Into<String>) -> TransformError {
        TransformError::new(self.name(), Phase::Schema, message)
    }
}

impl Transform for HoistField {
    fn name(&self) -> &str {
        "HoistField"
    }

    fn transform_schema(
        &self,
        schema: Schema,
        subschema: &Arc<SubschemaConfig>,
        transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        if self.path.len() < 2 {
            return Err(self.fail("a hoisting path needs at least two fields"));
        }

        // Walk the path: every step but the last must be a singular object.
        let mut parent = self.type_name.clone();
        let mut nullable = false;
        let mut hoisted: Option<FieldDef> = None;
        for (i, step) in self.path.iter().enumerate() {
            let field = schema
                .field(&parent, step)
                .ok_or_else(|| self.fail(format!("`{}.{}` does not exist", parent, step)))?;
            if i + 1 == self.path.len() {
                hoisted = Some(field.clone());
                break;
            }
            if matches!(field.ty.nullable(), TypeRef::List(_)) {
                return Err(self.fail(format!(
                    "`{}.{}` is a list and cannot be hoisted through",
                    parent, step
                )));
            }
            nullable |= !field.ty.is_non_null();
            parent = field.ty.name().to_string();
        }
        let Some(mut hoisted) = hoisted else {
            return Err(self.fail("empty hoisting path"));
        };

        hoisted.name = self.new_field_name.clone();
        hoisted.resolver = None;
        if nullable {
            hoisted.ty = hoisted.ty.nullable().clone();
        }
        if let (Some(kind), Some(_)) = (schema.root_kind_of(&self.type_name), transformed_schema) {
            hoisted.resolver =
                Some(Arc::new(DelegatingResolver::new(subschema.clone(), kind)) as Resolver);
        }

        let leaf = &self.path[self.path.len() - 1];
        let mut builder = schema.into_builder();
        if let Some(fields) = builder.type_def_mut(&parent).and_then(|t| t.fields_mut()) {
            fields.shift_remove(leaf);
        }
        let fields = builder
            .type_def_mut(&self.type_name)
            .and_then(|t| t.fields_mut())
            .ok_or_else(|| self.fail(format!("`{}` has no fields", self.type_name)))?;
        fields.insert(hoisted.name.clone(), hoisted);

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
        let mut expander = Expander {
            hoist: self,
            schema,
            aliases: Aliases::new(state.position()),
            records: Vec::new(),
        };
        for operation in &mut request.document.operations {
            if let Some(root) = schema.root_type_name(operation.kind) {
                expander.expand_set(&mut operation.selection_set, root, &[]);
            }
        }
        state.insert(expander.records);
        Ok(request)
    }

    fn transform_result(
        &self,
        mut result: ExecutionResult,
        _context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        let records: Vec<Lift> = state.require(self.name(), "hoisted field records")?;
        for record in records.iter().rev() {
            if let Some(data) = &mut result.data {
                for_each_object_at(data, &record.parent, &mut |object| record.apply(object));
            }
            for error in &mut result.errors {
                relocate_keys(
                    &mut error.path,
                    &record.parent,
                    &record.chain,
                    std::slice::from_ref(&record.target),
                );
            }
        }
        Ok(result)
    }
}

/// The field chain `chain` (alias first) under `parent` answers the hoisted
/// field `target`.
#[derive(Debug)]
struct Lift {
    parent: Vec<String>,
    chain: Vec<String>,
    target: String,
}

impl Lift {
    fn apply(&self, object: &mut Map<String, Value>) {
        let Some((alias, inner)) = self.chain.split_first() else {
            return;
        };
        let Some(mut value) = object.remove(alias) else {
            return;
        };
        for key in inner {
            value = match value {
                Value::Object(mut child) => child.remove(key).unwrap_or(Value::Null),
                _ => Value::Null,
            };
        }
        merge(object, &self.target, value);
    }
}

/// Inserts `value` at `key`, merging objects selected more than once.
fn merge(object: &mut Map<String, Value>, key: &str, value: Value) {
    match (object.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming {
                merge(existing, &k, v);
            }
        }
        (_, value) => {
            object.insert(key.to_string(), value);
        }
    }
}

struct Expander<'a> {
    hoist: &'a HoistField,
    schema: &'a Schema,
    aliases: Aliases,
    records: Vec<Lift>,
}

impl Expander<'_> {
    fn expand_set(&mut self, set: &mut SelectionSet, parent_type: &str, path: &[String]) {
        for selection in &mut set.items {
            match selection {
                Selection::Field(field) => {
                    let Some(child_type) = self
                        .schema
                        .field(parent_type, &field.name)
                        .map(|def| def.ty.name().to_string())
                    else {
                        continue;
                    };
                    let hoisted = parent_type == self.hoist.type_name
                        && field.name == self.hoist.new_field_name;
                    let key = if hoisted {
                        self.aliases.next()
                    } else {
                        field.response_key().to_string()
                    };

                    let mut child_path = path.to_vec();
                    child_path.push(key.clone());
                    if hoisted {
                        child_path.extend(self.hoist.path[1..].iter().cloned());
                    }
                    self.expand_set(&mut field.selection_set, &child_type, &child_path);

                    if hoisted {
                        let target = field.response_key().to_string();
                        let node = std::mem::replace(field, Field::new(String::new()));
                        *field = self.chain(node, key.clone());
                        let mut chain = vec![key];
                        chain.extend(self.hoist.path[1..].iter().cloned());
                        self.records.push(Lift {
                            parent: path.to_vec(),
                            chain,
                            target,
                        });
                    }
                }
                Selection::InlineFragment(inline) => {
                    let condition = inline
                        .type_condition
                        .clone()
                        .unwrap_or_else(|| parent_type.to_string());
                    self.expand_set(&mut inline.selection_set, &condition, path);
                }
                Selection::FragmentSpread(_) => {}
            }
        }
    }

    /// Rebuilds the hoisted selection as the original path of fields.
    fn chain(&self, node: Field, alias: String) -> Field {
        let path = &self.hoist.path;
        let mut innermost = node;
        innermost.alias = None;
        innermost.name = path[path.len() - 1].clone();

        let mut current = innermost;
        for step in path[..path.len() - 1].iter().rev() {
            current = Field::new(step.as_str())
                .with_selection_set(SelectionSet::new(vec![Selection::Field(current)]));
        }
        current.alias = Some(alias);
        current
    }
}
