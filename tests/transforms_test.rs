//! End-to-end tests for the built-in transforms.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gql_wrap::document::{Field, InputValue, SelectionSet};
use gql_wrap::transforms::{
    ExtractField, FieldTransform, FilterInterfaceFields, FilterObjectFields, FilterRootFields,
    FilterTypes, HoistField, PruneOptions, PruneSchema, RemoveObjectFieldsWithDeprecation,
    RenameInputObjectFields, RenameInterfaceFields, RenameObjectFieldArguments,
    RenameObjectFields, RenameRootFields, RenameTypes, TransformInterfaceFields,
    TransformObjectFields, WrapFields, WrapQuery, WrapType,
};
use gql_wrap::{
    delegate_request, execute, wrap_schema, DelegationContext, ExecuteOptions, ExecutionError,
    ExecutionResult, Executor, LocalExecutor, OperationKind, PathSegment, Request, Schema,
    SubschemaConfig, Transform, TypeRef, WrapConfig,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Local upstream that records the documents it is sent.
struct Recording {
    inner: LocalExecutor,
    seen: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    fn new(data: Value) -> Self {
        Self {
            inner: LocalExecutor::new(data),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
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
        self.inner.execute(schema, request).await
    }
}

struct Gateway {
    schema: Arc<Schema>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl Gateway {
    fn new(sdl: &str, data: Value, transforms: Vec<Arc<dyn Transform>>) -> Self {
        let upstream = Recording::new(data);
        let seen = upstream.seen.clone();
        let subschema = SubschemaConfig::new(Schema::parse(sdl).unwrap(), Arc::new(upstream))
            .with_transforms(transforms);
        Self {
            schema: wrap_schema(subschema).unwrap(),
            seen,
        }
    }

    async fn run(&self, query: &str) -> ExecutionResult {
        let request = Request::from_query(query).unwrap();
        execute(&self.schema, &request, &ExecuteOptions::default())
            .await
            .unwrap()
    }

    fn last_upstream(&self) -> String {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

/// Runs `query` through the subschema's transforms straight into the
/// upstream, skipping gateway validation.
async fn delegate(
    subschema: SubschemaConfig,
    field: &str,
    query: &str,
) -> ExecutionResult {
    let subschema = Arc::new(subschema);
    let gateway = wrap_schema(subschema.clone()).unwrap();
    let return_type = gateway
        .field("Query", field)
        .map(|def| def.ty.clone())
        .unwrap_or_else(|| TypeRef::named("String"));
    let context = DelegationContext {
        subschema,
        gateway_schema: gateway,
        operation: OperationKind::Query,
        field_name: field.into(),
        response_key: field.into(),
        return_type,
    };
    delegate_request(
        &context,
        Request::from_query(query).unwrap(),
        &CancellationToken::new(),
    )
    .await
    .unwrap()
}

mod rename {
    use super::*;

    const WIDGET_SDL: &str = "type Query { widget: Widget } type Widget { id: ID! name: String }";

    #[tokio::test]
    async fn renamed_type_round_trips_type_conditions() {
        let gateway = Gateway::new(
            WIDGET_SDL,
            json!({ "widget": { "id": "1", "name": "Lamp", "__typename": "Widget" } }),
            vec![Arc::new(RenameTypes::new(|name| {
                (name == "Widget").then(|| "NewWidget".to_string())
            }))],
        );

        assert_eq!(
            gateway.schema.field("Query", "widget").unwrap().ty.to_string(),
            "NewWidget"
        );
        assert!(gateway.schema.type_def("Widget").is_none());
        assert_eq!(
            gateway.schema.field("NewWidget", "id").unwrap().ty.to_string(),
            "ID!"
        );

        let result = gateway.run("{ widget { id ... on NewWidget { name } } }").await;
        assert_eq!(
            result.data,
            Some(json!({ "widget": { "id": "1", "name": "Lamp" } }))
        );
        assert!(gateway.last_upstream().contains("... on Widget"));
    }

    #[tokio::test]
    async fn typename_discriminates_renamed_implementations() {
        let sdl = r#"
            type Query { node(id: ID!): Node }
            interface Node { id: ID! }
            type User implements Node { id: ID! name: String }
            type Robot implements Node { id: ID! model: String }
        "#;
        let gateway = Gateway::new(
            sdl,
            json!({ "node": { "__typename": "User", "id": "1", "name": "Ada" } }),
            vec![Arc::new(RenameTypes::new(|name| {
                (name != "Query").then(|| format!("Up_{}", name))
            }))],
        );

        let result = gateway
            .run(r#"{ node(id: "1") { __typename ... on Up_User { name } ... on Up_Robot { model } } }"#)
            .await;
        assert_eq!(
            result.data,
            Some(json!({ "node": { "__typename": "Up_User", "name": "Ada" } }))
        );
    }

    #[tokio::test]
    async fn renamed_fields_are_aliased_upstream() {
        let sdl = "type Query { user: User } type User { id: ID! name: String }";
        let gateway = Gateway::new(
            sdl,
            json!({ "user": { "id": "1", "name": "Ada" } }),
            vec![
                Arc::new(RenameObjectFields::new(|type_name, field_name, _| {
                    (type_name == "User" && field_name == "name").then(|| "fullName".to_string())
                })),
                Arc::new(RenameRootFields::new(|_, field_name, _| {
                    Some(format!("up_{}", field_name))
                })),
            ],
        );

        let result = gateway.run("{ up_user { id fullName } }").await;
        assert_eq!(
            result.data,
            Some(json!({ "up_user": { "id": "1", "fullName": "Ada" } }))
        );
        let upstream = gateway.last_upstream();
        assert!(upstream.contains("up_user: user {"), "{}", upstream);
        assert!(upstream.contains("fullName: name"), "{}", upstream);
    }

    #[tokio::test]
    async fn renamed_arguments_map_back() {
        let sdl = "type Query { user(id: ID!): User } type User { id: ID! }";
        let gateway = Gateway::new(
            sdl,
            json!({ "user": { "id": "1" } }),
            vec![Arc::new(RenameObjectFieldArguments::new(
                |type_name, field_name, argument| {
                    (type_name == "Query" && field_name == "user" && argument == "id")
                        .then(|| "userId".to_string())
                },
            ))],
        );

        assert!(gateway
            .schema
            .field("Query", "user")
            .unwrap()
            .argument("userId")
            .is_some());
        let result = gateway.run(r#"{ user(userId: "1") { id } }"#).await;
        assert_eq!(result.data, Some(json!({ "user": { "id": "1" } })));
        assert!(gateway.last_upstream().contains(r#"user(id: "1")"#));
    }

    #[tokio::test]
    async fn renamed_input_fields_map_back() {
        let sdl = r#"
            input Filter { minAge: Int }
            type Query { users(filter: Filter): [User!]! }
            type User { id: ID! }
        "#;
        let gateway = Gateway::new(
            sdl,
            json!({ "users": [{ "id": "1" }] }),
            vec![Arc::new(RenameInputObjectFields::new(
                |type_name, field_name, _| {
                    (type_name == "Filter" && field_name == "minAge")
                        .then(|| "olderThan".to_string())
                },
            ))],
        );

        let result = gateway.run("{ users(filter: {olderThan: 3}) { id } }").await;
        assert_eq!(result.data, Some(json!({ "users": [{ "id": "1" }] })));
        assert!(gateway.last_upstream().contains("users(filter: {minAge: 3})"));
    }
}

mod interfaces {
    use super::*;

    const NODE_SDL: &str = r#"
        interface Node { id: ID! secret: String }
        type Widget implements Node { id: ID! secret: String name: String }
        type Query { node: Node }
    "#;

    fn data() -> Value {
        json!({ "node": { "__typename": "Widget", "id": "w1", "secret": "s", "name": "Lamp" } })
    }

    #[tokio::test]
    async fn renamed_interface_field_resolves_on_implementations() {
        let gateway = Gateway::new(
            NODE_SDL,
            data(),
            vec![Arc::new(RenameInterfaceFields::new(|type_name, field_name, _| {
                (type_name == "Node" && field_name == "id").then(|| "key".to_string())
            }))],
        );
        assert!(gateway.schema.field("Widget", "key").is_some());

        let result = gateway.run("{ node { key ... on Widget { name } } }").await;
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(
            result.data,
            Some(json!({ "node": { "key": "w1", "name": "Lamp" } }))
        );
        let upstream = gateway.last_upstream();
        assert!(upstream.contains("key: id"), "{}", upstream);
    }

    #[tokio::test]
    async fn renamed_field_maps_back_inside_object_fragments() {
        let gateway = Gateway::new(
            NODE_SDL,
            data(),
            vec![Arc::new(TransformInterfaceFields::new(|_, field_name, field| {
                if field_name == "id" {
                    FieldTransform::Rename("nodeId".into(), field.clone())
                } else {
                    FieldTransform::Unchanged
                }
            }))],
        );

        let result = gateway.run("{ node { ... on Widget { nodeId } } }").await;
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.data, Some(json!({ "node": { "nodeId": "w1" } })));
        assert!(gateway.last_upstream().contains("nodeId: id"));
    }

    #[tokio::test]
    async fn filtered_interface_field_stays_on_implementations() {
        let gateway = Gateway::new(
            NODE_SDL,
            data(),
            vec![Arc::new(FilterInterfaceFields::new(|_, field_name, _| {
                field_name != "secret"
            }))],
        );
        assert!(gateway.schema.field("Node", "secret").is_none());

        let result = gateway.run("{ node { id ... on Widget { secret } } }").await;
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(
            result.data,
            Some(json!({ "node": { "id": "w1", "secret": "s" } }))
        );
    }
}

mod filter_and_prune {
    use super::*;

    const SDL: &str = r#"
        type Query { a: A b: String secret: String }
        type A { x: X y: Int }
        type X { v: Int }
    "#;

    fn config() -> Arc<SubschemaConfig> {
        Arc::new(SubschemaConfig::new(
            Schema::parse(SDL).unwrap(),
            Arc::new(LocalExecutor::default()),
        ))
    }

    #[test]
    fn filtering_then_pruning_is_a_fixed_point() {
        let subschema = SubschemaConfig::new(
            Schema::parse(SDL).unwrap(),
            Arc::new(LocalExecutor::default()),
        )
        .with_transform(FilterObjectFields::new(|_, _, field| field.ty.name() != "X"))
        .with_transform(PruneSchema::default());
        let gateway = wrap_schema(subschema).unwrap();

        assert!(gateway.type_def("X").is_none());
        assert!(gateway.field("A", "y").is_some());

        let again = PruneSchema::default()
            .transform_schema(gateway.as_ref().clone(), &config(), None)
            .unwrap();
        assert_eq!(again.to_sdl(), gateway.to_sdl());
    }

    #[test]
    fn skip_pruning_keeps_unreachable_type() {
        let subschema = SubschemaConfig::new(
            Schema::parse(SDL).unwrap(),
            Arc::new(LocalExecutor::default()),
        )
        .with_transform(FilterObjectFields::new(|_, _, field| field.ty.name() != "X"))
        .with_transform(PruneSchema::new(
            PruneOptions::default().skip_pruning(|type_def| type_def.name == "X"),
        ));
        let gateway = wrap_schema(subschema).unwrap();
        assert!(gateway.type_def("X").is_some());
    }

    #[tokio::test]
    async fn filtered_root_fields_are_not_delegated() {
        let gateway = Gateway::new(
            SDL,
            json!({ "b": "bee", "secret": "hidden" }),
            vec![
                Arc::new(FilterRootFields::new(|_, name, _| name != "secret")),
                Arc::new(FilterTypes::new(|type_def| type_def.name != "X")),
            ],
        );
        assert!(gateway.schema.field("Query", "secret").is_none());
        assert!(gateway.schema.field("A", "x").is_none());

        let result = gateway.run("{ b }").await;
        assert_eq!(result.data, Some(json!({ "b": "bee" })));

        let result = gateway.run("{ secret }").await;
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn deprecated_fields_are_groomed() {
        let sdl = r#"
            type Query { user: User }
            type User { name: String old: String @deprecated(reason: "use name") }
        "#;
        let subschema = SubschemaConfig::new(
            Schema::parse(sdl).unwrap(),
            Arc::new(LocalExecutor::default()),
        )
        .with_transform(RemoveObjectFieldsWithDeprecation::new("use name"));
        let gateway = wrap_schema(subschema).unwrap();
        assert!(gateway.field("User", "old").is_none());
        assert!(gateway.field("User", "name").is_some());
    }
}

mod restructure {
    use super::*;

    #[tokio::test]
    async fn wrapped_root_fields_resolve_through_wrapper() {
        let sdl = "type Query { user(id: ID!): User version: String } type User { id: ID! name: String }";
        let gateway = Gateway::new(
            sdl,
            json!({ "user": { "id": "1", "name": "Ada" }, "version": "1.0" }),
            vec![Arc::new(WrapType::new("Query", "UserQueries", "users"))],
        );

        assert_eq!(
            gateway.schema.field("Query", "users").unwrap().ty.to_string(),
            "UserQueries!"
        );
        assert!(gateway.schema.field("Query", "version").is_none());

        let result = gateway
            .run(r#"{ users { __typename user(id: "1") { name } version } }"#)
            .await;
        assert_eq!(
            result.data,
            Some(json!({
                "users": { "__typename": "UserQueries", "user": { "name": "Ada" }, "version": "1.0" }
            }))
        );
    }

    #[tokio::test]
    async fn nested_wrappers_with_field_selection() {
        let sdl = "type Query { alpha: String beta: String gamma: String }";
        let gateway = Gateway::new(
            sdl,
            json!({ "alpha": "a", "beta": "b", "gamma": "c" }),
            vec![Arc::new(WrapFields::new(
                "Query",
                vec!["outer".into(), "inner".into()],
                vec!["Outer".into(), "Inner".into()],
                Some(vec!["alpha".into(), "beta".into()]),
            ))],
        );

        assert!(gateway.schema.field("Query", "gamma").is_some());
        assert!(gateway.schema.field("Inner", "alpha").is_some());

        let result = gateway
            .run("{ outer { inner { first: alpha beta } } gamma }")
            .await;
        assert_eq!(
            result.data,
            Some(json!({ "outer": { "inner": { "first": "a", "beta": "b" } }, "gamma": "c" }))
        );
    }

    #[tokio::test]
    async fn hoisted_field_is_fetched_through_its_path() {
        let sdl = r#"
            type Query { viewer: Viewer! }
            type Viewer { id: ID profile(size: Int): Profile }
            type Profile { name: String }
        "#;
        let gateway = Gateway::new(
            sdl,
            json!({ "viewer": { "id": "v1", "profile": { "name": "Ada" } } }),
            vec![Arc::new(HoistField::new(
                "Query",
                vec!["viewer".into(), "profile".into()],
                "profile",
            ))],
        );

        assert!(gateway.schema.field("Viewer", "profile").is_none());
        let result = gateway.run("{ me: profile(size: 2) { name } viewer { id } }").await;
        assert_eq!(
            result.data,
            Some(json!({ "me": { "name": "Ada" }, "viewer": { "id": "v1" } }))
        );
        let seen = gateway.seen.lock().unwrap();
        assert!(seen.iter().any(|document| document.contains("viewer {\n    profile(size: 2)")));
    }

    #[tokio::test]
    async fn wrap_query_unwraps_the_extracted_value() {
        let sdl = r#"
            type Query { userById(id: Int): User }
            type User { id: ID address: Address }
            type Address { street: String }
        "#;
        let upstream = Recording::new(json!({ "userById": { "address": { "street": "Main St" } } }));
        let seen = upstream.seen.clone();
        let subschema = SubschemaConfig::new(Schema::parse(sdl).unwrap(), Arc::new(upstream))
            .with_transform(WrapQuery::new(
                vec!["userById".into()],
                |selections| {
                    SelectionSet::new(vec![Field::new("address")
                        .with_selection_set(selections)
                        .into()])
                },
                |mut value| {
                    value
                        .get_mut("address")
                        .map(Value::take)
                        .unwrap_or(Value::Null)
                },
            ));

        let result = delegate(subschema, "userById", "{ userById(id: 1) { street } }").await;
        assert_eq!(
            seen.lock().unwrap()[0],
            "{\n  userById(id: 1) {\n    address {\n      street\n    }\n  }\n}"
        );
        assert_eq!(
            result.data,
            Some(json!({ "userById": { "street": "Main St" } }))
        );
    }

    #[tokio::test]
    async fn extracted_field_moves_back() {
        let sdl = r#"
            type Query { user: User }
            type User { id: ID address: Address }
            type Address { street: String }
        "#;
        let subschema = SubschemaConfig::new(
            Schema::parse(sdl).unwrap(),
            Arc::new(LocalExecutor::new(json!({
                "user": { "id": "1", "address": { "street": "Main St" } }
            }))),
        )
        .with_transform(ExtractField::new(
            vec!["user".into(), "street".into()],
            vec!["user".into(), "address".into(), "street".into()],
        ));

        let result = delegate(subschema, "user", "{ user { id street } }").await;
        assert_eq!(
            result.data,
            Some(json!({ "user": { "id": "1", "street": "Main St" } }))
        );
    }

    #[tokio::test]
    async fn node_transformer_rewrites_request() {
        let sdl = "type Query { user(id: ID): User } type User { id: ID name: String }";
        let transform = TransformObjectFields::new(|type_name, field_name, field| {
            if type_name == "Query" && field_name == "user" {
                let mut field = field.clone();
                field.arguments.clear();
                FieldTransform::Replace(field)
            } else {
                FieldTransform::Unchanged
            }
        })
        .with_node_transformer(|_, _, node| node.with_argument("id", InputValue::String("me".into())));
        let gateway = Gateway::new(
            sdl,
            json!({ "user": { "id": "me", "name": "Ada" } }),
            vec![Arc::new(transform)],
        );

        assert!(gateway.schema.field("Query", "user").unwrap().arguments.is_empty());
        let result = gateway.run("{ user { name } }").await;
        assert_eq!(result.data, Some(json!({ "user": { "name": "Ada" } })));
        assert!(gateway.last_upstream().contains(r#"user(id: "me")"#));
    }
}

mod errors {
    use super::*;
    use gql_wrap::GraphQLError;

    struct Failing;

    #[async_trait]
    impl Executor for Failing {
        async fn execute(
            &self,
            _schema: &Arc<Schema>,
            _request: Request,
        ) -> Result<ExecutionResult, ExecutionError> {
            Ok(ExecutionResult {
                data: Some(json!({ "__gqlwrap__0_0": { "street": null } })),
                errors: vec![GraphQLError::new("no street")
                    .with_path(vec!["__gqlwrap__0_0".into(), "street".into()])],
                extensions: None,
            })
        }
    }

    #[tokio::test]
    async fn hoisted_error_paths_are_relocated() {
        let sdl = r#"
            type Query { viewer: Viewer }
            type Viewer { id: ID street: String }
        "#;
        let subschema = SubschemaConfig::new(Schema::parse(sdl).unwrap(), Arc::new(Failing))
            .with_transform(HoistField::new(
                "Query",
                vec!["viewer".into(), "street".into()],
                "street",
            ));

        let result = delegate(subschema, "street", "{ street }").await;
        assert_eq!(result.data, Some(json!({ "street": null })));
        assert_eq!(result.errors[0].path, vec![PathSegment::from("street")]);
    }
}

mod config {
    use super::*;

    #[tokio::test]
    async fn configured_transforms_build_a_working_gateway() {
        let config = WrapConfig::from_json_str(
            r#"{
                "transforms": [
                    { "kind": "rename_types", "map": { "User": "Person" } },
                    { "kind": "rename_object_fields", "map": { "Person.name": "displayName" } },
                    { "kind": "filter_root_fields", "exclude": [{ "regex": "^internal" }] },
                    { "kind": "prune_schema" }
                ]
            }"#,
        )
        .unwrap();
        let sdl = r#"
            type Query { user: User internalStats: Stats }
            type User { id: ID! name: String }
            type Stats { count: Int }
        "#;
        let gateway = Gateway::new(
            sdl,
            json!({ "user": { "id": "1", "name": "Ada" } }),
            config.build_transforms().unwrap(),
        );

        assert!(gateway.schema.type_def("Stats").is_none());
        assert!(gateway.schema.field("Person", "displayName").is_some());
        let result = gateway.run("{ user { id displayName } }").await;
        assert_eq!(
            result.data,
            Some(json!({ "user": { "id": "1", "displayName": "Ada" } }))
        );
    }
}
