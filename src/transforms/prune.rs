//! Removal of schema elements nothing can reach.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::TransformError;
use crate::pipeline::SubschemaConfig;
use crate::schema::{Schema, SchemaBuilder, TypeDef, TypeKind};
use crate::transform::Transform;
use crate::types::OperationKind;

type SkipFn = dyn Fn(&TypeDef) -> bool + Send + Sync;

/// What [`PruneSchema`] is allowed to remove.
#[derive(Clone, Default)]
pub struct PruneOptions {
    /// Keep object, interface, union and input types that have no members.
    pub skip_empty_composite_type_pruning: bool,
    /// Keep interfaces no object implements.
    pub skip_unimplemented_interfaces_pruning: bool,
    /// Keep types unreachable from the roots.
    pub skip_unused_types_pruning: bool,
    /// Types for which this returns `true` are never pruned.
    pub skip_pruning: Option<Arc<SkipFn>>,
}

impl PruneOptions {
    pub fn skip_empty_composite_type_pruning(mut self, value: bool) -> Self {
        self.skip_empty_composite_type_pruning = value;
        self
    }

    pub fn skip_unimplemented_interfaces_pruning(mut self, value: bool) -> Self {
        self.skip_unimplemented_interfaces_pruning = value;
        self
    }

    pub fn skip_unused_types_pruning(mut self, value: bool) -> Self {
        self.skip_unused_types_pruning = value;
        self
    }

    pub fn skip_pruning(mut self, skip: impl Fn(&TypeDef) -> bool + Send + Sync + 'static) -> Self {
        self.skip_pruning = Some(Arc::new(skip));
        self
    }

    fn protected(&self, type_def: &TypeDef) -> bool {
        self.skip_pruning.as_ref().is_some_and(|skip| skip(type_def))
    }
}

impl fmt::Debug for PruneOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PruneOptions")
            .field("skip_empty_composite_type_pruning", &self.skip_empty_composite_type_pruning)
            .field(
                "skip_unimplemented_interfaces_pruning",
                &self.skip_unimplemented_interfaces_pruning,
            )
            .field("skip_unused_types_pruning", &self.skip_unused_types_pruning)
            .field("skip_pruning", &self.skip_pruning.is_some())
            .finish()
    }
}

/// Removes empty composite types, unimplemented interfaces and types that are
/// unreachable from any root, repeating until nothing changes. Root types are
/// never removed. Applying it twice is the same as applying it once.
#[derive(Debug, Clone, Default)]
pub struct PruneSchema {
    options: PruneOptions,
}

impl PruneSchema {
    pub fn new(options: PruneOptions) -> Self {
        Self { options }
    }
}

impl Transform for PruneSchema {
    fn name(&self) -> &str {
        "PruneSchema"
    }

    fn transform_schema(
        &self,
        schema: Schema,
        _subschema: &Arc<SubschemaConfig>,
        _transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        let before = schema.types().count();
        let mut builder = schema.into_builder();
        loop {
            let count = builder.types.len();
            let roots = root_names(&builder);
            if !self.options.skip_empty_composite_type_pruning {
                builder.types.retain(|t| {
                    roots.contains(&t.name) || self.options.protected(t) || !is_empty(t)
                });
                builder.remove_dangling();
            }
            if !self.options.skip_unimplemented_interfaces_pruning {
                let implemented = implemented_interfaces(&builder);
                builder.types.retain(|t| {
                    !matches!(t.kind, TypeKind::Interface(_))
                        || implemented.contains(&t.name)
                        || self.options.protected(t)
                });
                builder.remove_dangling();
            }
            if !self.options.skip_unused_types_pruning {
                let reachable = reachable_types(&builder);
                builder
                    .types
                    .retain(|t| reachable.contains(&t.name) || self.options.protected(t));
                builder.remove_dangling();
            }
            if builder.types.len() == count {
                break;
            }
        }
        let schema = builder
            .build()
            .map_err(|e| TransformError::schema(self.name(), e))?;
        debug!(removed = before.saturating_sub(schema.types().count()), "pruned schema");
        Ok(schema)
    }
}

fn root_names(builder: &SchemaBuilder) -> HashSet<String> {
    OperationKind::ALL
        .into_iter()
        .filter_map(|kind| builder.root(kind).map(str::to_string))
        .collect()
}

fn is_empty(type_def: &TypeDef) -> bool {
    match &type_def.kind {
        TypeKind::Object(body) | TypeKind::Interface(body) => body.fields.is_empty(),
        TypeKind::Union(members) => members.is_empty(),
        TypeKind::InputObject(fields) => fields.is_empty(),
        TypeKind::Scalar | TypeKind::Enum(_) => false,
    }
}

fn implemented_interfaces(builder: &SchemaBuilder) -> HashSet<String> {
    builder
        .types
        .iter()
        .filter_map(|t| match &t.kind {
            TypeKind::Object(body) => Some(body.interfaces.iter().cloned()),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Names reachable from the roots and from directive arguments. Objects
/// implementing a reachable interface are reachable too.
fn reachable_types(builder: &SchemaBuilder) -> HashSet<String> {
    let mut reachable = HashSet::new();
    let mut pending: Vec<String> = root_names(builder).into_iter().collect();
    pending.extend(
        builder
            .directives
            .iter()
            .flat_map(|d| d.arguments.iter().map(|arg| arg.ty.name().to_string())),
    );

    while let Some(name) = pending.pop() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        let Some(type_def) = builder.types.iter().find(|t| t.name == name) else {
            continue;
        };
        match &type_def.kind {
            TypeKind::Object(body) | TypeKind::Interface(body) => {
                pending.extend(body.interfaces.iter().cloned());
                for field in body.fields.values() {
                    pending.push(field.ty.name().to_string());
                    pending.extend(field.arguments.iter().map(|arg| arg.ty.name().to_string()));
                }
                if matches!(type_def.kind, TypeKind::Interface(_)) {
                    pending.extend(
                        builder
                            .types
                            .iter()
                            .filter(|t| match &t.kind {
                                TypeKind::Object(body) | TypeKind::Interface(body) => {
                                    body.interfaces.contains(&name)
                                }
                                _ => false,
                            })
                            .map(|t| t.name.clone()),
                    );
                }
            }
            TypeKind::Union(members) => pending.extend(members.iter().cloned()),
            TypeKind::InputObject(fields) => {
                pending.extend(fields.values().map(|f| f.ty.name().to_string()))
            }
            TypeKind::Scalar | TypeKind::Enum(_) => {}
        }
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::LocalExecutor;

    const SDL: &str = r#"
        type Query { user: User search: SearchResult }
        type User implements Node { id: ID! tags: [Tag] }
        type Tag { label: String }
        interface Node { id: ID! }
        interface Orphan { id: ID! }
        union SearchResult = User
        type Unused { value: String }
        input UnusedInput { value: String }
        enum Color { RED }
    "#;

    fn prune(options: PruneOptions, schema: Schema) -> Schema {
        let config = Arc::new(SubschemaConfig::new(
            schema.clone(),
            Arc::new(LocalExecutor::default()),
        ));
        PruneSchema::new(options)
            .transform_schema(schema, &config, None)
            .unwrap()
    }

    #[test]
    fn removes_unreachable_types() {
        let schema = prune(PruneOptions::default(), Schema::parse(SDL).unwrap());
        for kept in ["Query", "User", "Tag", "Node", "SearchResult"] {
            assert!(schema.type_def(kept).is_some(), "{} should be kept", kept);
        }
        for removed in ["Orphan", "Unused", "UnusedInput", "Color"] {
            assert!(schema.type_def(removed).is_none(), "{} should be pruned", removed);
        }
    }

    #[test]
    fn options_keep_types() {
        let options = PruneOptions::default()
            .skip_unused_types_pruning(true)
            .skip_unimplemented_interfaces_pruning(true);
        let schema = prune(options, Schema::parse(SDL).unwrap());
        assert!(schema.type_def("Orphan").is_some());
        assert!(schema.type_def("Unused").is_some());

        let options = PruneOptions::default().skip_pruning(|t| t.name == "Color");
        let schema = prune(options, Schema::parse(SDL).unwrap());
        assert!(schema.type_def("Color").is_some());
    }

    #[test]
    fn emptied_types_cascade() {
        let schema = Schema::parse(
            "type Query { box: Box other: Int } type Box { inner: Inner } type Inner { gone: Gone } type Gone { x: Int }",
        )
        .unwrap();
        let mut builder = schema.into_builder();
        builder.types.retain(|t| t.name != "Gone");
        builder.remove_dangling();
        let schema = prune(PruneOptions::default(), builder.build().unwrap());

        assert!(schema.type_def("Inner").is_none());
        assert!(schema.type_def("Box").is_none());
        assert!(schema.field("Query", "box").is_none());
        assert!(schema.field("Query", "other").is_some());
    }

    #[test]
    fn pruning_is_idempotent() {
        let once = prune(PruneOptions::default(), Schema::parse(SDL).unwrap());
        let twice = prune(PruneOptions::default(), once.clone());
        assert_eq!(once, twice);
    }
}
