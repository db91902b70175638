//! GraphQL schema wrapping and delegation
//!
//! Derives a gateway schema from an original schema and an ordered list of
//! transforms, and resolves gateway root fields by delegating to the original
//! service through the same transforms run in reverse.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use gql_wrap::transforms::RenameTypes;
//! use gql_wrap::{execute, wrap_schema, ExecuteOptions, LocalExecutor, Request, Schema, SubschemaConfig};
//! use serde_json::json;
//!
//! let original = Schema::parse("type Query { widget: Widget } type Widget { id: ID! name: String }").unwrap();
//! let upstream = LocalExecutor::new(json!({ "widget": { "id": "1", "name": "Lamp" } }));
//!
//! let subschema = SubschemaConfig::new(original, Arc::new(upstream))
//!     .with_transform(RenameTypes::new(|name| (name == "Widget").then(|| "NewWidget".to_string())));
//! let gateway = wrap_schema(subschema).unwrap();
//! assert!(gateway.type_def("NewWidget").is_some());
//!
//! let request = Request::from_query("{ widget { id ... on NewWidget { name } } }").unwrap();
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let result = runtime
//!     .block_on(execute(&gateway, &request, &ExecuteOptions::default()))
//!     .unwrap();
//! assert_eq!(result.data, Some(json!({ "widget": { "id": "1", "name": "Lamp" } })));
//! ```
//!
//! # Phases
//!
//! | Phase | Order | Input | Output |
//! |-------|-------|-------|--------|
//! | schema | `T1..Tn` | original schema | gateway schema |
//! | request | `Tn..T1` | gateway request | original request |
//! | result | `T1..Tn` | original result | gateway result |
//!
//! Each delegated operation gets fresh [`TransformState`] per transform,
//! shared only between that transform's request and result phases.

pub mod config;
mod delegate;
pub mod document;
mod error;
mod execute;
pub mod execution;
mod loader;
mod pipeline;
pub mod schema;
mod sdl;
mod transform;
pub mod transforms;
mod types;
mod visit;

pub use config::{TransformConfig, WrapConfig};
pub use delegate::{delegate_request, finalize_request, DelegatingResolver, DelegationContext};
pub use document::Document;
pub use error::{
    ConfigError, DelegationError, DocumentError, ExecutionError, LoadError, SchemaError,
    TransformError, WrapError,
};
pub use execute::{execute, ExecuteOptions, FieldResolver, LocalExecutor, ResolveInfo};
pub use execution::{ExecutionResult, Executor, FieldError, GraphQLError, PathSegment, Request};
pub use loader::{
    is_url, load_config, load_document, load_json, load_schema, load_schema_auto, load_schema_str,
};
pub use pipeline::{wrap_schema, SubschemaConfig};
pub use schema::{Schema, SchemaBuilder};
pub use transform::{Transform, TransformState};
pub use types::{OperationKind, Phase, TypeRef};

#[cfg(feature = "remote")]
pub use loader::load_schema_url;
