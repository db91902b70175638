//! Built-in execution engine.
//!
//! Runs an operation against a [`Schema`] by walking the selection set, calling
//! field resolvers and completing values against the declared field types. Fields
//! without a resolver read the property of the same name from the parent value, so
//! a plain JSON document can serve as the root of a whole graph (see
//! [`LocalExecutor`]).
//!
//! Sibling fields run concurrently, except the root fields of a mutation which run
//! in document order. A failing field becomes `null` plus an error entry, and a
//! `null` in a non-null position propagates to the closest nullable parent.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::document::{Directive, Document, Field, InputValue, OperationDefinition, Selection, SelectionSet};
use crate::error::ExecutionError;
use crate::execution::{ExecutionResult, Executor, FieldError, GraphQLError, PathSegment, Request};
use crate::schema::{FieldDef, Schema, TypeDef, TypeKind};
use crate::types::{OperationKind, TypeRef, TYPENAME_FIELD};

/// Resolve capability of a single field.
#[async_trait]
pub trait FieldResolver: Send + Sync {
    async fn resolve(
        &self,
        parent: &Value,
        args: &Map<String, Value>,
        info: &ResolveInfo<'_>,
    ) -> Result<Value, FieldError>;

    /// Whether values below this field are keyed by response key (alias) rather
    /// than by field name, as in results fetched from another service.
    fn resolves_by_response_key(&self) -> bool {
        false
    }
}

/// Everything a resolver may know about the field being resolved.
pub struct ResolveInfo<'a> {
    pub field_name: &'a str,
    pub response_key: &'a str,
    /// All nodes selecting this response key, merged across fragments.
    pub field_nodes: &'a [&'a Field],
    pub parent_type: &'a str,
    pub return_type: &'a TypeRef,
    pub path: Vec<PathSegment>,
    pub schema: &'a Arc<Schema>,
    pub document: &'a Document,
    pub operation: &'a OperationDefinition,
    /// Coerced variable values of the running operation.
    pub variables: &'a Map<String, Value>,
    pub context: &'a Value,
    pub cancellation: &'a CancellationToken,
    errors: &'a Mutex<Vec<GraphQLError>>,
}

impl ResolveInfo<'_> {
    /// Adds an error to the result without failing the field.
    pub fn report_error(&self, error: GraphQLError) {
        push_error(self.errors, error);
    }
}

/// Inputs of an execution beyond the request itself.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub root_value: Value,
    pub context_value: Value,
    pub cancellation: Option<CancellationToken>,
}

/// Executes `request` against `schema`.
///
/// Request-level problems (unknown operation, missing variables, unsupported
/// operation kind) come back as a result with errors and no data.
///
/// # Errors
///
/// Returns `ExecutionError::Cancelled` if the cancellation token fires first.
pub async fn execute(
    schema: &Arc<Schema>,
    request: &Request,
    options: &ExecuteOptions,
) -> Result<ExecutionResult, ExecutionError> {
    let operation = match request.document.operation(request.operation_name.as_deref()) {
        Ok(operation) => operation,
        Err(e) => return Ok(ExecutionResult::from_error(GraphQLError::new(e.to_string()))),
    };
    if operation.kind == OperationKind::Subscription {
        return Ok(ExecutionResult::from_error(GraphQLError::new(
            "subscriptions are not supported",
        )));
    }
    let Some(root) = schema.root_type(operation.kind) else {
        return Ok(ExecutionResult::from_error(GraphQLError::new(format!(
            "schema has no {} root type",
            operation.kind
        ))));
    };
    let variables = match coerce_variables(operation, &request.variables) {
        Ok(variables) => variables,
        Err(message) => return Ok(ExecutionResult::from_error(GraphQLError::new(message))),
    };

    let cancellation = options.cancellation.clone().unwrap_or_default();
    if cancellation.is_cancelled() {
        return Err(ExecutionError::Cancelled);
    }

    debug!(
        operation = operation.name.as_deref().unwrap_or("<anonymous>"),
        kind = %operation.kind,
        "executing operation"
    );

    let ctx = ExecutionContext {
        schema,
        document: &request.document,
        operation,
        variables,
        context: &options.context_value,
        cancellation: cancellation.clone(),
        errors: Mutex::new(Vec::new()),
    };

    let fields = collect_fields(&ctx, &root.name, [&operation.selection_set]);
    let serial = operation.kind == OperationKind::Mutation;
    let run = execute_fields(
        &ctx,
        &root.name,
        options.root_value.clone(),
        fields,
        Vec::new(),
        false,
        serial,
    );

    let data = tokio::select! {
        biased;
        _ = cancellation.cancelled() => return Err(ExecutionError::Cancelled),
        data = run => data.unwrap_or(Value::Null),
    };

    let errors = ctx.errors.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(ExecutionResult {
        data: Some(data),
        errors,
        extensions: None,
    })
}

/// Executor serving a schema from an in-memory JSON root value.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    root_value: Value,
    context_value: Value,
}

impl LocalExecutor {
    pub fn new(root_value: Value) -> Self {
        Self {
            root_value,
            context_value: Value::Null,
        }
    }

    pub fn with_context(mut self, context_value: Value) -> Self {
        self.context_value = context_value;
        self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(
        &self,
        schema: &Arc<Schema>,
        request: Request,
    ) -> Result<ExecutionResult, ExecutionError> {
        let options = ExecuteOptions {
            root_value: self.root_value.clone(),
            context_value: self.context_value.clone(),
            cancellation: None,
        };
        execute(schema, &request, &options).await
    }
}

/// Marker for a `null` that must bubble to the closest nullable position.
/// The error describing it has already been recorded.
struct Propagate;

type Fields<'a> = IndexMap<&'a str, Vec<&'a Field>>;

struct ExecutionContext<'a> {
    schema: &'a Arc<Schema>,
    document: &'a Document,
    operation: &'a OperationDefinition,
    variables: Map<String, Value>,
    context: &'a Value,
    cancellation: CancellationToken,
    errors: Mutex<Vec<GraphQLError>>,
}

impl ExecutionContext<'_> {
    fn report(&self, error: GraphQLError) {
        push_error(&self.errors, error);
    }
}

fn push_error(errors: &Mutex<Vec<GraphQLError>>, error: GraphQLError) {
    errors
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(error);
}

#[derive(Clone)]
struct FieldPosition<'a> {
    parent_type: &'a str,
    field_name: &'a str,
    nodes: Vec<&'a Field>,
    by_key: bool,
}

impl FieldPosition<'_> {
    fn coordinate(&self) -> String {
        format!("{}.{}", self.parent_type, self.field_name)
    }
}

fn coerce_variables(
    operation: &OperationDefinition,
    provided: &Map<String, Value>,
) -> Result<Map<String, Value>, String> {
    let mut coerced = Map::new();
    for definition in &operation.variables {
        match provided.get(&definition.name) {
            Some(value) if !(value.is_null() && definition.ty.is_non_null()) => {
                coerced.insert(definition.name.clone(), value.clone());
            }
            _ => {
                if let Some(default) = &definition.default_value {
                    coerced.insert(definition.name.clone(), default.to_json(&Map::new()));
                } else if definition.ty.is_non_null() {
                    return Err(format!(
                        "Variable \"${}\" of required type \"{}\" was not provided.",
                        definition.name, definition.ty
                    ));
                }
            }
        }
    }
    Ok(coerced)
}

fn coerce_arguments(
    field_def: &FieldDef,
    node: &Field,
    variables: &Map<String, Value>,
) -> Result<Map<String, Value>, String> {
    let mut args = Map::new();
    for definition in &field_def.arguments {
        let provided = node.argument(&definition.name).filter(|value| match value {
            InputValue::Variable(name) => variables.contains_key(name),
            _ => true,
        });
        match (provided, &definition.default_value) {
            (Some(value), _) => {
                args.insert(definition.name.clone(), value.to_json(variables));
            }
            (None, Some(default)) => {
                args.insert(definition.name.clone(), default.to_json(variables));
            }
            (None, None) if definition.ty.is_non_null() => {
                return Err(format!(
                    "Argument \"{}\" of required type \"{}\" was not provided.",
                    definition.name, definition.ty
                ));
            }
            (None, None) => {}
        }
    }
    Ok(args)
}

fn should_include(directives: &[Directive], variables: &Map<String, Value>) -> bool {
    let condition = |name: &str| {
        directives
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.argument("if"))
            .map(|value| value.to_json(variables) == Value::Bool(true))
    };
    condition("skip") != Some(true) && condition("include") != Some(false)
}

fn collect_fields<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &str,
    sets: impl IntoIterator<Item = &'a SelectionSet>,
) -> Fields<'a> {
    let mut fields = Fields::new();
    let mut visited = HashSet::new();
    for set in sets {
        collect_into(ctx, object_type, set, &mut fields, &mut visited);
    }
    fields
}

fn collect_into<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &str,
    set: &'a SelectionSet,
    fields: &mut Fields<'a>,
    visited: &mut HashSet<&'a str>,
) {
    for selection in &set.items {
        match selection {
            Selection::Field(field) => {
                if should_include(&field.directives, &ctx.variables) {
                    fields.entry(field.response_key()).or_default().push(field);
                }
            }
            Selection::InlineFragment(inline) => {
                let applies = inline
                    .type_condition
                    .as_deref()
                    .map_or(true, |condition| {
                        ctx.schema.type_condition_applies(condition, object_type)
                    });
                if applies && should_include(&inline.directives, &ctx.variables) {
                    collect_into(ctx, object_type, &inline.selection_set, fields, visited);
                }
            }
            Selection::FragmentSpread(spread) => {
                if !should_include(&spread.directives, &ctx.variables)
                    || !visited.insert(spread.fragment_name.as_str())
                {
                    continue;
                }
                if let Some(fragment) = ctx.document.fragment(&spread.fragment_name) {
                    if ctx
                        .schema
                        .type_condition_applies(&fragment.type_condition, object_type)
                    {
                        collect_into(ctx, object_type, &fragment.selection_set, fields, visited);
                    }
                }
            }
        }
    }
}

fn execute_fields<'a>(
    ctx: &'a ExecutionContext<'a>,
    type_name: &'a str,
    parent: Value,
    fields: Fields<'a>,
    path: Vec<PathSegment>,
    by_key: bool,
    serial: bool,
) -> BoxFuture<'a, Result<Value, Propagate>> {
    async move {
        let mut data = Map::new();
        let field_path = |key: &str| {
            let mut field_path = path.clone();
            field_path.push(PathSegment::Key(key.to_string()));
            field_path
        };

        if serial {
            for (key, nodes) in fields {
                let value =
                    execute_field(ctx, type_name, &parent, key, nodes, field_path(key), by_key)
                        .await?;
                data.insert(key.to_string(), value);
            }
        } else {
            let pending = fields.into_iter().map(|(key, nodes)| {
                let field = execute_field(ctx, type_name, &parent, key, nodes, field_path(key), by_key);
                async move { (key, field.await) }
            });
            for (key, value) in join_all(pending).await {
                data.insert(key.to_string(), value?);
            }
        }
        Ok(Value::Object(data))
    }
    .boxed()
}

fn execute_field<'a: 'b, 'b>(
    ctx: &'a ExecutionContext<'a>,
    type_name: &'a str,
    parent: &'b Value,
    key: &'a str,
    nodes: Vec<&'a Field>,
    path: Vec<PathSegment>,
    by_key: bool,
) -> BoxFuture<'b, Result<Value, Propagate>> {
    async move {
        let Some(first) = nodes.first().copied() else {
            return Ok(Value::Null);
        };
        if first.name == TYPENAME_FIELD {
            return Ok(Value::String(type_name.to_string()));
        }
        let Some(field_def) = ctx.schema.field(type_name, &first.name) else {
            ctx.report(
                GraphQLError::new(format!(
                    "Cannot query field \"{}\" on type \"{}\".",
                    first.name, type_name
                ))
                .with_path(path),
            );
            return Ok(Value::Null);
        };

        let resolved = match coerce_arguments(field_def, first, &ctx.variables) {
            Err(message) => Err(FieldError::new(message)),
            Ok(args) => match &field_def.resolver {
                Some(resolver) => {
                    let info = ResolveInfo {
                        field_name: &field_def.name,
                        response_key: key,
                        field_nodes: &nodes,
                        parent_type: type_name,
                        return_type: &field_def.ty,
                        path: path.clone(),
                        schema: ctx.schema,
                        document: ctx.document,
                        operation: ctx.operation,
                        variables: &ctx.variables,
                        context: ctx.context,
                        cancellation: &ctx.cancellation,
                        errors: &ctx.errors,
                    };
                    resolver.resolve(parent, &args, &info).await
                }
                None => Ok(default_resolve(parent, if by_key { key } else { &first.name })),
            },
        };

        let value = match resolved {
            Ok(value) => value,
            Err(error) => {
                ctx.report(GraphQLError {
                    message: error.message,
                    path,
                    extensions: error.extensions,
                });
                return if field_def.ty.is_non_null() {
                    Err(Propagate)
                } else {
                    Ok(Value::Null)
                };
            }
        };

        let position = FieldPosition {
            parent_type: type_name,
            field_name: &field_def.name,
            nodes,
            by_key: field_def
                .resolver
                .as_ref()
                .map_or(by_key, |resolver| resolver.resolves_by_response_key()),
        };
        match complete_value(ctx, position, &field_def.ty, value, path).await {
            Err(Propagate) if !field_def.ty.is_non_null() => Ok(Value::Null),
            other => other,
        }
    }
    .boxed()
}

fn default_resolve(parent: &Value, key: &str) -> Value {
    parent.get(key).cloned().unwrap_or(Value::Null)
}

fn complete_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    position: FieldPosition<'a>,
    ty: &'a TypeRef,
    value: Value,
    path: Vec<PathSegment>,
) -> BoxFuture<'a, Result<Value, Propagate>> {
    async move {
        match ty {
            TypeRef::NonNull(inner) => {
                let completed =
                    complete_value(ctx, position.clone(), inner, value, path.clone()).await?;
                if completed.is_null() {
                    ctx.report(
                        GraphQLError::new(format!(
                            "Cannot return null for non-nullable field {}.",
                            position.coordinate()
                        ))
                        .with_path(path),
                    );
                    return Err(Propagate);
                }
                Ok(completed)
            }
            _ if value.is_null() => Ok(Value::Null),
            TypeRef::List(item_ty) => {
                let Value::Array(items) = value else {
                    ctx.report(
                        GraphQLError::new(format!(
                            "Expected a list for field {}.",
                            position.coordinate()
                        ))
                        .with_path(path),
                    );
                    return Err(Propagate);
                };
                let pending = items.into_iter().enumerate().map(|(index, item)| {
                    let mut item_path = path.clone();
                    item_path.push(PathSegment::Index(index));
                    let item_position = position.clone();
                    async move {
                        match complete_value(ctx, item_position, item_ty, item, item_path).await {
                            Err(Propagate) if !item_ty.is_non_null() => Ok(Value::Null),
                            other => other,
                        }
                    }
                });
                join_all(pending)
                    .await
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeRef::Named(name) => {
                let Some(type_def) = ctx.schema.type_def(name) else {
                    ctx.report(
                        GraphQLError::new(format!("Unknown type \"{}\".", name)).with_path(path),
                    );
                    return Err(Propagate);
                };
                match &type_def.kind {
                    TypeKind::Scalar | TypeKind::Enum(_) => Ok(complete_leaf(name, value)),
                    TypeKind::Object(_) => complete_object(ctx, &position, type_def, value, path).await,
                    TypeKind::Interface(_) | TypeKind::Union(_) => {
                        match runtime_type(ctx.schema, type_def, &value) {
                            Some(object_type) => {
                                complete_object(ctx, &position, object_type, value, path).await
                            }
                            None => {
                                ctx.report(
                                    GraphQLError::new(format!(
                                        "Abstract type \"{}\" must resolve to an object type at runtime for field {}.",
                                        type_def.name,
                                        position.coordinate()
                                    ))
                                    .with_path(path),
                                );
                                Err(Propagate)
                            }
                        }
                    }
                    TypeKind::InputObject(_) => {
                        ctx.report(
                            GraphQLError::new(format!(
                                "Field {} cannot return input type \"{}\".",
                                position.coordinate(),
                                name
                            ))
                            .with_path(path),
                        );
                        Err(Propagate)
                    }
                }
            }
        }
    }
    .boxed()
}

async fn complete_object<'a>(
    ctx: &'a ExecutionContext<'a>,
    position: &FieldPosition<'a>,
    object_type: &'a TypeDef,
    value: Value,
    path: Vec<PathSegment>,
) -> Result<Value, Propagate> {
    let sets: Vec<&'a SelectionSet> = position
        .nodes
        .iter()
        .copied()
        .map(|node| &node.selection_set)
        .collect();
    let fields = collect_fields(ctx, &object_type.name, sets);
    execute_fields(
        ctx,
        &object_type.name,
        value,
        fields,
        path,
        position.by_key,
        false,
    )
    .await
}

/// Picks the concrete object type of an abstract value from its `__typename`,
/// or the only possible type when there is exactly one.
fn runtime_type<'s>(schema: &'s Schema, abstract_type: &TypeDef, value: &Value) -> Option<&'s TypeDef> {
    let possible = schema.possible_types(&abstract_type.name);
    let name = match value.get(TYPENAME_FIELD).and_then(Value::as_str) {
        Some(name) if possible.contains(&name) => name,
        Some(_) => return None,
        None if possible.len() == 1 => possible[0],
        None => return None,
    };
    schema.type_def(name)
}

fn complete_leaf(type_name: &str, value: Value) -> Value {
    match (type_name, value) {
        ("ID", Value::Number(n)) => Value::String(n.to_string()),
        (_, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SDL: &str = r#"
interface Node { id: ID! }
type Widget implements Node { id: ID! name: String tags: [String!] }
type Gadget implements Node { id: ID! size: Int! }
type Query {
  widget(id: ID!): Widget
  nodes: [Node]
  gadget: Gadget
  strict: Gadget!
  version: String
}
type Mutation { bump: Int first: Int second: Int }
"#;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::parse(SDL).unwrap())
    }

    async fn run(root: Value, query: &str) -> ExecutionResult {
        let request = Request::from_query(query).unwrap();
        let options = ExecuteOptions {
            root_value: root,
            ..ExecuteOptions::default()
        };
        execute(&schema(), &request, &options).await.unwrap()
    }

    #[tokio::test]
    async fn resolves_from_root_value() {
        let root = json!({ "widget": { "id": 1, "name": "Lamp", "extra": true }, "version": "v1" });
        let result = run(root, "{ widget(id: 1) { id name } v: version }").await;
        assert!(result.errors.is_empty());
        assert_eq!(
            result.data,
            Some(json!({ "widget": { "id": "1", "name": "Lamp" }, "v": "v1" }))
        );
    }

    #[tokio::test]
    async fn fragments_and_typename_on_abstract_list() {
        let root = json!({ "nodes": [
            { "__typename": "Widget", "id": "w1", "name": "Lamp" },
            { "__typename": "Gadget", "id": "g1", "size": 3 }
        ] });
        let result = run(
            root,
            "{ nodes { __typename id ...W ... on Gadget { size } } } fragment W on Widget { name }",
        )
        .await;
        assert_eq!(
            result.data,
            Some(json!({ "nodes": [
                { "__typename": "Widget", "id": "w1", "name": "Lamp" },
                { "__typename": "Gadget", "id": "g1", "size": 3 }
            ] }))
        );
    }

    #[tokio::test]
    async fn null_in_non_null_field_propagates_to_nullable_parent() {
        let root = json!({ "gadget": { "id": "g1", "size": null } });
        let result = run(root, "{ gadget { id size } version }").await;
        assert_eq!(result.data, Some(json!({ "gadget": null, "version": null })));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].path,
            vec![PathSegment::from("gadget"), PathSegment::from("size")]
        );
    }

    #[tokio::test]
    async fn null_propagates_to_data_through_non_null_root_field() {
        let result = run(json!({}), "{ strict { id } }").await;
        assert_eq!(result.data, Some(Value::Null));
        assert!(result.errors[0].message.contains("Query.strict"));
    }

    #[tokio::test]
    async fn non_null_list_items_null_the_list() {
        let root = json!({ "widget": { "id": "w", "tags": ["a", null] } });
        let result = run(root, "{ widget(id: 1) { tags } }").await;
        assert_eq!(result.data, Some(json!({ "widget": { "tags": null } })));
        assert_eq!(
            result.errors[0].path,
            vec!["widget".into(), "tags".into(), PathSegment::Index(1)]
        );
    }

    #[tokio::test]
    async fn skip_and_include() {
        let root = json!({ "version": "v1", "gadget": { "id": "g", "size": 1 } });
        let request = Request::from_query(
            "query($hide: Boolean!) { version @skip(if: $hide) gadget @include(if: true) { id } }",
        )
        .unwrap()
        .with_variables(json!({ "hide": true }).as_object().cloned().unwrap());
        let options = ExecuteOptions {
            root_value: root,
            ..ExecuteOptions::default()
        };
        let result = execute(&schema(), &request, &options).await.unwrap();
        assert_eq!(result.data, Some(json!({ "gadget": { "id": "g" } })));
    }

    #[tokio::test]
    async fn missing_required_variable() {
        let result = run(json!({}), "query($id: ID!) { widget(id: $id) { id } }").await;
        assert_eq!(result.data, None);
        assert!(result.errors[0].message.contains("$id"));
    }

    #[tokio::test]
    async fn resolver_errors_become_field_errors() {
        struct Failing;
        #[async_trait]
        impl FieldResolver for Failing {
            async fn resolve(
                &self,
                _parent: &Value,
                _args: &Map<String, Value>,
                info: &ResolveInfo<'_>,
            ) -> Result<Value, FieldError> {
                Err(FieldError::new(format!("cannot load {}", info.field_name)))
            }
        }

        let mut builder = Schema::parse(SDL).unwrap().into_builder();
        let query = builder.type_def_mut("Query").unwrap();
        let version = query.fields_mut().unwrap().get_mut("version").unwrap();
        version.resolver = Some(Arc::new(Failing));
        let schema = Arc::new(builder.build().unwrap());

        let request = Request::from_query("{ version gadget { id } }").unwrap();
        let options = ExecuteOptions {
            root_value: json!({ "gadget": { "id": "g" } }),
            ..ExecuteOptions::default()
        };
        let result = execute(&schema, &request, &options).await.unwrap();
        assert_eq!(
            result.data,
            Some(json!({ "version": null, "gadget": { "id": "g" } }))
        );
        assert_eq!(result.errors[0].message, "cannot load version");
        assert_eq!(result.errors[0].path, vec![PathSegment::from("version")]);
    }

    #[tokio::test]
    async fn mutation_roots_run_in_order() {
        let result = run(json!({ "first": 1, "second": 2 }), "mutation { second first }").await;
        let data = result.data.unwrap();
        let keys: Vec<&String> = data.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let options = ExecuteOptions {
            cancellation: Some(token),
            ..ExecuteOptions::default()
        };
        let request = Request::from_query("{ version }").unwrap();
        let result = execute(&schema(), &request, &options).await;
        assert_eq!(result, Err(ExecutionError::Cancelled));
    }

    #[tokio::test]
    async fn local_executor() {
        let executor = LocalExecutor::new(json!({ "version": "v2" }));
        let result = executor
            .execute(&schema(), Request::from_query("{ version }").unwrap())
            .await
            .unwrap();
        assert_eq!(result.data, Some(json!({ "version": "v2" })));
    }
}
