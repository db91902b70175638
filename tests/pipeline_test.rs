//! Integration tests for the wrap and delegation pipeline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gql_wrap::schema::FieldDef;
use gql_wrap::{
    delegate_request, execute, wrap_schema, DelegationContext, DelegationError, ExecuteOptions,
    ExecutionError, ExecutionResult, Executor, GraphQLError, LocalExecutor, OperationKind,
    PathSegment, Phase, Request, Schema, SchemaError, SubschemaConfig, Transform, TransformError,
    TransformState, TypeRef, WrapError,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const HELLO_SDL: &str = "type Query { hello: String }";

/// Upstream that records every request it receives and may answer slowly.
struct Recording {
    inner: Arc<dyn Executor>,
    seen: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl Recording {
    fn new(inner: impl Executor + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            seen: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Executor for Recording {
    async fn execute(
        &self,
        schema: &Arc<Schema>,
        request: Request,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.seen.lock().unwrap().push(request.document.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.execute(schema, request).await
    }
}

/// Upstream answering every request with the same result.
struct Canned(ExecutionResult);

#[async_trait]
impl Executor for Canned {
    async fn execute(
        &self,
        _schema: &Arc<Schema>,
        _request: Request,
    ) -> Result<ExecutionResult, ExecutionError> {
        Ok(self.0.clone())
    }
}

/// Logs each phase it runs.
struct Tagger {
    tag: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Transform for Tagger {
    fn name(&self) -> &str {
        self.tag
    }

    fn transform_request(
        &self,
        request: Request,
        _context: &DelegationContext,
        _state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        self.log.lock().unwrap().push(format!("{}:request", self.tag));
        Ok(request)
    }

    fn transform_result(
        &self,
        result: ExecutionResult,
        _context: &DelegationContext,
        _state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        self.log.lock().unwrap().push(format!("{}:result", self.tag));
        Ok(result)
    }
}

struct Identity;

impl Transform for Identity {
    fn name(&self) -> &str {
        "Identity"
    }
}

/// Copies the `id` argument of the delegated field into the result's `tag`
/// through its per-operation state.
struct EchoId;

impl Transform for EchoId {
    fn name(&self) -> &str {
        "EchoId"
    }

    fn transform_request(
        &self,
        request: Request,
        _context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        let id = request.document.operations[0]
            .selection_set
            .fields()
            .next()
            .and_then(|field| field.argument("id"))
            .map(|value| value.to_json(&request.variables))
            .unwrap_or(Value::Null);
        state.insert(id);
        Ok(request)
    }

    fn transform_result(
        &self,
        mut result: ExecutionResult,
        context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        let id: Value = state.require(self.name(), "requested id")?;
        if let Some(Value::Object(item)) = result
            .data
            .as_mut()
            .and_then(|data| data.get_mut(&context.response_key))
        {
            item.insert("tag".into(), id);
        }
        Ok(result)
    }
}

struct Broken;

impl Transform for Broken {
    fn name(&self) -> &str {
        "Broken"
    }

    fn transform_request(
        &self,
        _request: Request,
        _context: &DelegationContext,
        _state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        Err(TransformError::new(self.name(), Phase::Request, "no way"))
    }
}

/// Expects state its request phase never stored.
struct Forgetful;

impl Transform for Forgetful {
    fn name(&self) -> &str {
        "Forgetful"
    }

    fn transform_result(
        &self,
        result: ExecutionResult,
        _context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        let _: u32 = state.require(self.name(), "counter")?;
        Ok(result)
    }
}

/// Adds a root field nothing resolves.
struct AddUnresolvedRoot;

impl Transform for AddUnresolvedRoot {
    fn name(&self) -> &str {
        "AddUnresolvedRoot"
    }

    fn transform_schema(
        &self,
        schema: Schema,
        _subschema: &Arc<SubschemaConfig>,
        _transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        let mut builder = schema.into_builder();
        if let Some(fields) = builder.type_def_mut("Query").and_then(|t| t.fields_mut()) {
            fields.insert(
                "extra".into(),
                FieldDef::new("extra", TypeRef::named("String")),
            );
        }
        builder
            .build()
            .map_err(|e| TransformError::schema(self.name(), e))
    }
}

fn hello_upstream() -> LocalExecutor {
    LocalExecutor::new(json!({ "hello": "world" }))
}

async fn run(gateway: &Arc<Schema>, query: &str) -> ExecutionResult {
    let request = Request::from_query(query).unwrap();
    execute(gateway, &request, &ExecuteOptions::default())
        .await
        .unwrap()
}

mod phase_order {
    use super::*;

    #[tokio::test]
    async fn request_runs_in_reverse_and_result_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let subschema =
            SubschemaConfig::new(Schema::parse(HELLO_SDL).unwrap(), Arc::new(hello_upstream()))
                .with_transform(Tagger {
                    tag: "T1",
                    log: log.clone(),
                })
                .with_transform(Tagger {
                    tag: "T2",
                    log: log.clone(),
                })
                .with_transform(Tagger {
                    tag: "T3",
                    log: log.clone(),
                });
        let gateway = wrap_schema(subschema).unwrap();

        let result = run(&gateway, "{ hello }").await;
        assert_eq!(result.data, Some(json!({ "hello": "world" })));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["T3:request", "T2:request", "T1:request", "T1:result", "T2:result", "T3:result"]
        );
    }

    #[test]
    fn wrap_records_one_stage_per_transform() {
        let subschema = Arc::new(
            SubschemaConfig::new(Schema::parse(HELLO_SDL).unwrap(), Arc::new(hello_upstream()))
                .with_transform(Identity)
                .with_transform(Identity),
        );
        assert!(subschema.stages().is_none());
        wrap_schema(subschema.clone()).unwrap();
        assert_eq!(subschema.stages().map(|stages| stages.len()), Some(3));
    }
}

mod identity {
    use super::*;

    const SDL: &str = r#"
        type Query {
          users(limit: Int = 10): [User!]!
          node(id: ID!): Node
        }
        interface Node { id: ID! }
        type User implements Node {
          id: ID!
          name: String
          friends: [User!]!
        }
        type Robot implements Node {
          id: ID!
          model: String
        }
    "#;

    fn data() -> Value {
        json!({
            "users": [
                { "id": "1", "name": "Ada", "friends": [{ "id": "2", "name": "Grace", "friends": [] }] },
                { "id": "2", "name": "Grace", "friends": [] }
            ],
            "node": { "__typename": "Robot", "id": "r2", "model": "astromech" }
        })
    }

    #[tokio::test]
    async fn identity_pipeline_matches_direct_execution() {
        let query = r#"
            query Everything($limit: Int) {
              users(limit: $limit) { id ...Named friends { ...Named } }
              node(id: "r2") { id ... on Robot { model } ... on User { name } }
            }
            fragment Named on User { name }
        "#;
        let mut variables = serde_json::Map::new();
        variables.insert("limit".into(), json!(5));
        let request = Request::from_query(query).unwrap().with_variables(variables);

        let original = Arc::new(Schema::parse(SDL).unwrap());
        let direct = execute(
            &original,
            &request,
            &ExecuteOptions {
                root_value: data(),
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap();

        let subschema =
            SubschemaConfig::new(original.clone(), Arc::new(LocalExecutor::new(data())))
                .with_transform(Identity);
        let gateway = wrap_schema(subschema).unwrap();
        let wrapped = execute(&gateway, &request, &ExecuteOptions::default())
            .await
            .unwrap();

        assert!(direct.errors.is_empty(), "{:?}", direct.errors);
        assert_eq!(wrapped, direct);
    }
}

mod state {
    use super::*;

    const SDL: &str = "type Query { item(id: ID!): Item } type Item { id: ID! tag: String }";

    fn gateway() -> Arc<Schema> {
        let upstream = Recording::new(LocalExecutor::new(json!({
            "item": { "id": "x", "tag": null }
        })))
        .with_delay(Duration::from_millis(10));
        let subschema = SubschemaConfig::new(Schema::parse(SDL).unwrap(), Arc::new(upstream))
            .with_transform(EchoId);
        wrap_schema(subschema).unwrap()
    }

    #[tokio::test]
    async fn sibling_delegations_get_separate_state() {
        let gateway = gateway();
        let result = run(
            &gateway,
            r#"{ a: item(id: "1") { tag } b: item(id: "2") { tag } }"#,
        )
        .await;
        assert_eq!(
            result.data,
            Some(json!({ "a": { "tag": "1" }, "b": { "tag": "2" } }))
        );
    }

    #[tokio::test]
    async fn concurrent_operations_do_not_share_state() {
        let gateway = gateway();
        let requests: Vec<String> = (0..8)
            .map(|i| format!(r#"{{ item(id: "{}") {{ tag }} }}"#, i))
            .collect();
        let results =
            futures::future::join_all(requests.iter().map(|query| run(&gateway, query))).await;
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(
                result.data,
                Some(json!({ "item": { "tag": i.to_string() } }))
            );
        }
    }

    #[tokio::test]
    async fn missing_state_is_a_delegation_fault() {
        let subschema =
            SubschemaConfig::new(Schema::parse(HELLO_SDL).unwrap(), Arc::new(hello_upstream()))
                .with_transform(Forgetful);
        let gateway = wrap_schema(subschema).unwrap();

        let result = run(&gateway, "{ hello }").await;
        assert_eq!(result.data, Some(json!({ "hello": null })));
        assert_eq!(
            result.errors[0].message,
            "delegation state error: transform Forgetful found no counter state from its request phase"
        );
    }
}

mod errors {
    use super::*;

    #[tokio::test]
    async fn upstream_errors_survive_transforms() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let upstream = Canned(ExecutionResult {
            data: Some(json!({ "hello": null })),
            errors: vec![GraphQLError::new("upstream broke").with_path(vec!["hello".into()])],
            extensions: None,
        });
        let subschema = SubschemaConfig::new(Schema::parse(HELLO_SDL).unwrap(), Arc::new(upstream))
            .with_transform(Tagger {
                tag: "T1",
                log: log.clone(),
            });
        let gateway = wrap_schema(subschema).unwrap();

        let result = run(&gateway, "{ hello }").await;
        assert_eq!(result.data, Some(json!({ "hello": null })));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "upstream broke");
        assert_eq!(result.errors[0].path, vec![PathSegment::from("hello")]);
        // The result phase still ran.
        assert!(log.lock().unwrap().contains(&"T1:result".to_string()));
    }

    #[tokio::test]
    async fn nested_upstream_errors_keep_partial_data() {
        let sdl = "type Query { user: User } type User { id: ID! name: String }";
        let upstream = Canned(ExecutionResult {
            data: Some(json!({ "user": { "id": "1", "name": null } })),
            errors: vec![GraphQLError::new("name unavailable")
                .with_path(vec!["user".into(), "name".into()])],
            extensions: None,
        });
        let subschema = SubschemaConfig::new(Schema::parse(sdl).unwrap(), Arc::new(upstream))
            .with_transform(Identity);
        let gateway = wrap_schema(subschema).unwrap();

        let result = run(&gateway, "{ user { id name } }").await;
        assert_eq!(
            result.data,
            Some(json!({ "user": { "id": "1", "name": null } }))
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].path,
            vec![PathSegment::from("user"), PathSegment::from("name")]
        );
    }

    #[tokio::test]
    async fn transform_fault_becomes_field_error() {
        let upstream = Recording::new(hello_upstream());
        let seen = upstream.seen.clone();
        let subschema = SubschemaConfig::new(Schema::parse(HELLO_SDL).unwrap(), Arc::new(upstream))
            .with_transform(Broken);
        let gateway = wrap_schema(subschema).unwrap();

        let result = run(&gateway, "{ hello }").await;
        assert_eq!(result.data, Some(json!({ "hello": null })));
        assert_eq!(
            result.errors[0].message,
            "transform Broken failed in request phase: no way"
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_original_root_type_is_a_delegation_fault() {
        let upstream = Recording::new(hello_upstream());
        let seen = upstream.seen.clone();
        let subschema = Arc::new(SubschemaConfig::new(
            Schema::parse(HELLO_SDL).unwrap(),
            Arc::new(upstream),
        ));
        let gateway = wrap_schema(subschema.clone()).unwrap();
        let context = DelegationContext {
            subschema,
            gateway_schema: gateway,
            operation: OperationKind::Mutation,
            field_name: "hello".into(),
            response_key: "hello".into(),
            return_type: TypeRef::named("String"),
        };

        let err = delegate_request(
            &context,
            Request::from_query("mutation { hello }").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            DelegationError::MissingRootType {
                operation: "mutation"
            }
        );
        assert_eq!(err.to_string(), "original schema has no mutation root type");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unresolved_root_field_fails_wrap() {
        let subschema =
            SubschemaConfig::new(Schema::parse(HELLO_SDL).unwrap(), Arc::new(hello_upstream()))
                .with_transform(AddUnresolvedRoot);
        let err = wrap_schema(subschema).unwrap_err();
        assert_eq!(
            err,
            WrapError::Schema(SchemaError::NotExecutable {
                type_name: "Query".into(),
                field_name: "extra".into(),
            })
        );
    }
}

mod cancellation {
    use super::*;

    fn slow_subschema() -> Arc<SubschemaConfig> {
        let upstream = Recording::new(hello_upstream()).with_delay(Duration::from_secs(30));
        Arc::new(
            SubschemaConfig::new(Schema::parse(HELLO_SDL).unwrap(), Arc::new(upstream))
                .with_transform(Identity),
        )
    }

    #[tokio::test]
    async fn cancelling_the_gateway_operation_stops_delegation() {
        let gateway = wrap_schema(slow_subschema()).unwrap();
        let token = CancellationToken::new();
        let options = ExecuteOptions {
            cancellation: Some(token.clone()),
            ..ExecuteOptions::default()
        };
        let request = Request::from_query("{ hello }").unwrap();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            execute(&gateway, &request, &options),
        )
        .await
        .expect("cancellation should end the operation");
        canceller.await.unwrap();

        assert_eq!(result, Err(ExecutionError::Cancelled));
    }

    #[tokio::test]
    async fn delegate_request_reports_cancellation() {
        let subschema = slow_subschema();
        let gateway = wrap_schema(subschema.clone()).unwrap();
        let context = DelegationContext {
            subschema,
            gateway_schema: gateway,
            operation: OperationKind::Query,
            field_name: "hello".into(),
            response_key: "hello".into(),
            return_type: TypeRef::named("String"),
        };
        let token = CancellationToken::new();
        token.cancel();

        let result = delegate_request(
            &context,
            Request::from_query("{ hello }").unwrap(),
            &token,
        )
        .await;
        assert_eq!(
            result,
            Err(DelegationError::Cancelled {
                field: "hello".into()
            })
        );
    }

    #[tokio::test]
    async fn delegate_request_without_cancellation() {
        let subschema = Arc::new(SubschemaConfig::new(
            Schema::parse(HELLO_SDL).unwrap(),
            Arc::new(hello_upstream()),
        ));
        let gateway = wrap_schema(subschema.clone()).unwrap();
        let context = DelegationContext {
            subschema,
            gateway_schema: gateway,
            operation: OperationKind::Query,
            field_name: "hello".into(),
            response_key: "hello".into(),
            return_type: TypeRef::named("String"),
        };

        let result = delegate_request(
            &context,
            Request::from_query("{ hello }").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result.data, Some(json!({ "hello": "world" })));
    }
}
