//! Deriving a gateway schema from a subschema and its transforms.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::delegate::DelegatingResolver;
use crate::error::{SchemaError, WrapError};
use crate::execution::Executor;
use crate::schema::{Resolver, Schema};
use crate::transform::Transform;
use crate::types::OperationKind;

/// An original schema, the capability that executes against it, and the
/// transforms that turn it into a gateway schema.
pub struct SubschemaConfig {
    pub name: Option<String>,
    pub schema: Arc<Schema>,
    pub executor: Arc<dyn Executor>,
    pub transforms: Vec<Arc<dyn Transform>>,
    stages: OnceLock<Vec<Arc<Schema>>>,
}

impl SubschemaConfig {
    pub fn new(schema: impl Into<Arc<Schema>>, executor: Arc<dyn Executor>) -> Self {
        Self {
            name: None,
            schema: schema.into(),
            executor,
            transforms: Vec::new(),
            stages: OnceLock::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn with_transforms(mut self, transforms: Vec<Arc<dyn Transform>>) -> Self {
        self.transforms.extend(transforms);
        self
    }

    /// Schema after each step of the final wrap: index 0 is the original
    /// shape, index `i + 1` the output of transform `i`. Resolvers are stripped.
    ///
    /// `None` until [`wrap_schema`] has run for this configuration.
    pub fn stages(&self) -> Option<&[Arc<Schema>]> {
        self.stages.get().map(Vec::as_slice)
    }
}

impl fmt::Debug for SubschemaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transforms: Vec<&str> = self.transforms.iter().map(|t| t.name()).collect();
        f.debug_struct("SubschemaConfig")
            .field("name", &self.name)
            .field("transforms", &transforms)
            .field("wrapped", &self.stages.get().is_some())
            .finish()
    }
}

/// Derives the executable gateway schema for `subschema`.
///
/// The transform list is folded over the schema twice. The first pass starts
/// from a copy of the original schema whose root fields delegate to the
/// subschema. The second pass repeats the fold, handing every transform the
/// first-pass result so it can wire delegation for fields it introduces.
///
/// # Errors
///
/// Returns `WrapError` if a transform fails or rebuilds an invalid schema, or if
/// a gateway root field is left without a resolver.
pub fn wrap_schema(subschema: impl Into<Arc<SubschemaConfig>>) -> Result<Arc<Schema>, WrapError> {
    let subschema = subschema.into();
    info!(
        subschema = subschema.name.as_deref().unwrap_or("<unnamed>"),
        transforms = subschema.transforms.len(),
        "wrapping schema"
    );

    let base = proxying_schema(&subschema)?;

    let first_pass = apply_transforms(&subschema, base.clone(), None, None)?;
    let hint = Arc::new(first_pass);

    let mut stages = vec![Arc::new(base.without_resolvers())];
    let gateway = apply_transforms(&subschema, base, Some(&hint), Some(&mut stages))?;

    if let Some((type_name, field_name)) = gateway.unresolved_root_fields().into_iter().next() {
        return Err(SchemaError::NotExecutable {
            type_name,
            field_name,
        }
        .into());
    }

    if subschema.stages.set(stages).is_err() {
        debug!("subschema already wrapped, keeping the first stage list");
    }
    Ok(Arc::new(gateway))
}

/// Copy of the original schema with a delegating resolver on every root field.
/// Resolvers below the roots are cleared: their values come from the delegated
/// result.
fn proxying_schema(subschema: &Arc<SubschemaConfig>) -> Result<Schema, SchemaError> {
    let mut builder = subschema.schema.as_ref().clone().into_builder();
    let roots: Vec<(OperationKind, String)> = OperationKind::ALL
        .into_iter()
        .filter_map(|kind| builder.root(kind).map(|name| (kind, name.to_string())))
        .collect();

    for type_def in &mut builder.types {
        let root_kind = roots
            .iter()
            .find(|(_, name)| *name == type_def.name)
            .map(|(kind, _)| *kind);
        if let Some(fields) = type_def.fields_mut() {
            for field in fields.values_mut() {
                field.resolver = root_kind.map(|kind| {
                    Arc::new(DelegatingResolver::new(subschema.clone(), kind)) as Resolver
                });
            }
        }
    }
    builder.build()
}

fn apply_transforms(
    subschema: &Arc<SubschemaConfig>,
    mut schema: Schema,
    hint: Option<&Arc<Schema>>,
    mut stages: Option<&mut Vec<Arc<Schema>>>,
) -> Result<Schema, WrapError> {
    let pass = if hint.is_some() { 2 } else { 1 };
    for transform in &subschema.transforms {
        debug!(transform = transform.name(), pass, "applying schema transform");
        schema = transform.transform_schema(schema, subschema, hint)?;
        if let Some(stages) = stages.as_mut() {
            stages.push(Arc::new(schema.without_resolvers()));
        }
    }
    Ok(schema)
}
