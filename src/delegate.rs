//! Delegating one gateway operation to the original schema.
//!
//! A delegated operation folds the request phases of the transform list in
//! reverse order, finalizes the request against the original schema, executes
//! it, then folds the result phases in list order. Each transform gets one
//! [`TransformState`] shared by its two phases.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, warn, Instrument};

use crate::document::{Document, Field, OperationDefinition, Selection, SelectionSet};
use crate::error::{DelegationError, ExecutionError};
use crate::execute::{FieldResolver, ResolveInfo};
use crate::execution::{ExecutionResult, FieldError, GraphQLError, PathSegment, Request};
use crate::pipeline::SubschemaConfig;
use crate::schema::Schema;
use crate::transform::{Transform, TransformState};
use crate::types::{OperationKind, TypeRef, TYPENAME_FIELD};
use crate::visit::{walk_document, SelectionVisitor};

/// Read-only facts about one delegated operation, shared by every transform phase.
pub struct DelegationContext {
    pub subschema: Arc<SubschemaConfig>,
    pub gateway_schema: Arc<Schema>,
    pub operation: OperationKind,
    /// Gateway root field being delegated.
    pub field_name: String,
    pub response_key: String,
    pub return_type: TypeRef,
}

impl DelegationContext {
    pub fn original_schema(&self) -> &Arc<Schema> {
        &self.subschema.schema
    }

    pub fn transforms(&self) -> &[Arc<dyn Transform>] {
        &self.subschema.transforms
    }

    /// Schema produced by the transform owning `state`: the shape its request
    /// phase receives.
    pub fn transformed_schema(&self, state: &TransformState) -> &Schema {
        self.stage(state.position() + 1).unwrap_or(&self.gateway_schema)
    }

    /// Schema the transform owning `state` was applied to: the shape its
    /// request phase must produce.
    pub fn target_schema(&self, state: &TransformState) -> &Schema {
        self.stage(state.position())
            .unwrap_or(&self.subschema.schema)
    }

    fn stage(&self, index: usize) -> Option<&Schema> {
        self.subschema
            .stages()
            .and_then(|stages| stages.get(index))
            .map(Arc::as_ref)
    }
}

/// Runs `request` through the transform pipeline and the subschema executor.
///
/// Upstream errors do not stop the result phase. A fault raised by a transform
/// aborts the operation.
///
/// # Errors
///
/// Returns `DelegationError` for transform faults, phase-pairing faults,
/// cancellation, and an original schema without a root type for the operation.
pub async fn delegate_request(
    context: &DelegationContext,
    request: Request,
    cancellation: &CancellationToken,
) -> Result<ExecutionResult, DelegationError> {
    let span = info_span!(
        "delegate",
        field = %context.field_name,
        operation = %context.operation,
    );
    run_pipeline(context, request, cancellation)
        .instrument(span)
        .await
}

async fn run_pipeline(
    context: &DelegationContext,
    mut request: Request,
    cancellation: &CancellationToken,
) -> Result<ExecutionResult, DelegationError> {
    if context.original_schema().root_type(context.operation).is_none() {
        return Err(DelegationError::MissingRootType {
            operation: context.operation.as_str(),
        });
    }

    let transforms = context.transforms();
    let mut states: Vec<TransformState> = (0..transforms.len()).map(TransformState::new).collect();

    for (transform, state) in transforms.iter().zip(states.iter_mut()).rev() {
        trace!(transform = transform.name(), "request phase");
        request = transform
            .transform_request(request, context, state)
            .map_err(|e| fault(transform.as_ref(), e.into()))?;
    }

    let request = finalize_request(request, context.original_schema());
    debug!(document = %request.document, "executing against subschema");

    let executed = tokio::select! {
        biased;
        _ = cancellation.cancelled() => None,
        executed = context.subschema.executor.execute(context.original_schema(), request) => Some(executed),
    };
    let mut result = match executed {
        None | Some(Err(ExecutionError::Cancelled)) => {
            return Err(DelegationError::Cancelled {
                field: context.field_name.clone(),
            })
        }
        Some(Ok(result)) => result,
        Some(Err(e)) => ExecutionResult::from_error(GraphQLError::new(e.to_string())),
    };
    if !result.errors.is_empty() {
        debug!(errors = result.errors.len(), "subschema returned errors");
    }

    for (transform, state) in transforms.iter().zip(states.iter_mut()) {
        if cancellation.is_cancelled() {
            return Err(DelegationError::Cancelled {
                field: context.field_name.clone(),
            });
        }
        trace!(transform = transform.name(), "result phase");
        result = transform
            .transform_result(result, context, state)
            .map_err(|e| fault(transform.as_ref(), e.into()))?;
    }
    Ok(result)
}

fn fault(transform: &dyn Transform, error: DelegationError) -> DelegationError {
    warn!(transform = transform.name(), error = %error, "transform fault");
    error
}

/// Makes a transformed request valid against the original schema.
///
/// Adds `__typename` under abstract types, drops fields and arguments the
/// original schema does not define, drops selections left empty, and removes
/// fragments and variables nothing uses anymore.
pub fn finalize_request(mut request: Request, schema: &Schema) -> Request {
    let document = &mut request.document;

    document
        .fragments
        .retain(|fragment| schema.type_def(&fragment.type_condition).is_some());
    walk_document(document, schema, &mut Finalizer { schema });

    let empty: HashSet<String> = document
        .fragments
        .iter()
        .filter(|fragment| fragment.selection_set.is_empty())
        .map(|fragment| fragment.name.clone())
        .collect();
    let defined: HashSet<String> = document
        .fragments
        .iter()
        .filter(|fragment| !empty.contains(&fragment.name))
        .map(|fragment| fragment.name.clone())
        .collect();
    for operation in &mut document.operations {
        remove_spreads(&mut operation.selection_set, &defined);
    }
    for fragment in &mut document.fragments {
        remove_spreads(&mut fragment.selection_set, &defined);
    }

    let used_fragments = document.used_fragments();
    document
        .fragments
        .retain(|fragment| used_fragments.contains(&fragment.name));

    let used_variables = document.used_variables();
    for operation in &mut document.operations {
        operation
            .variables
            .retain(|variable| used_variables.contains(&variable.name));
    }
    request
        .variables
        .retain(|name, _| used_variables.contains(name));
    request
}

struct Finalizer<'s> {
    schema: &'s Schema,
}

impl SelectionVisitor for Finalizer<'_> {
    fn leave_field(&mut self, parent_type: &str, field: &mut Field) -> bool {
        if field.name == TYPENAME_FIELD {
            return true;
        }
        let Some(definition) = self.schema.field(parent_type, &field.name) else {
            return false;
        };
        field
            .arguments
            .retain(|(name, _)| definition.argument(name).is_some());
        let composite = self
            .schema
            .type_def(definition.ty.name())
            .is_some_and(|t| t.is_composite());
        !(composite && field.selection_set.is_empty())
    }

    fn leave_selection_set(&mut self, parent_type: &str, set: &mut SelectionSet) {
        set.items.retain(|selection| match selection {
            Selection::InlineFragment(inline) => {
                !inline.selection_set.is_empty()
                    && inline
                        .type_condition
                        .as_deref()
                        .map_or(true, |condition| self.schema.type_def(condition).is_some())
            }
            _ => true,
        });
        if !set.is_empty() && self.schema.is_abstract(parent_type) && !set.selects(TYPENAME_FIELD) {
            set.push(Field::new(TYPENAME_FIELD));
        }
    }
}

fn remove_spreads(set: &mut SelectionSet, defined: &HashSet<String>) {
    set.items.retain_mut(|selection| match selection {
        Selection::FragmentSpread(spread) => defined.contains(&spread.fragment_name),
        Selection::Field(field) => {
            remove_spreads(&mut field.selection_set, defined);
            true
        }
        Selection::InlineFragment(inline) => {
            remove_spreads(&mut inline.selection_set, defined);
            true
        }
    });
}

/// Resolver of a gateway field that delegates to the subschema.
pub struct DelegatingResolver {
    subschema: Arc<SubschemaConfig>,
    operation: OperationKind,
}

impl DelegatingResolver {
    pub fn new(subschema: Arc<SubschemaConfig>, operation: OperationKind) -> Self {
        Self {
            subschema,
            operation,
        }
    }

    /// Builds the gateway-side request for the field being resolved.
    fn request_for(&self, info: &ResolveInfo<'_>) -> Request {
        let selection_set = SelectionSet::new(
            info.field_nodes
                .iter()
                .map(|node| Selection::Field((*node).clone()))
                .collect(),
        );
        let operation = OperationDefinition {
            kind: self.operation,
            name: info.operation.name.clone(),
            variables: info.operation.variables.clone(),
            directives: Vec::new(),
            selection_set,
        };
        Request {
            document: Document {
                operations: vec![operation],
                fragments: info.document.fragments.clone(),
            },
            operation_name: info.operation.name.clone(),
            variables: info.variables.clone(),
            extensions: None,
        }
    }
}

#[async_trait]
impl FieldResolver for DelegatingResolver {
    async fn resolve(
        &self,
        _parent: &Value,
        _args: &Map<String, Value>,
        info: &ResolveInfo<'_>,
    ) -> Result<Value, FieldError> {
        let context = DelegationContext {
            subschema: self.subschema.clone(),
            gateway_schema: info.schema.clone(),
            operation: self.operation,
            field_name: info.field_name.to_string(),
            response_key: info.response_key.to_string(),
            return_type: info.return_type.clone(),
        };
        let request = self.request_for(info);
        let result = delegate_request(&context, request, info.cancellation)
            .await
            .map_err(|e| FieldError::new(e.to_string()))?;

        let value = result
            .data
            .as_ref()
            .and_then(|data| data.get(info.response_key))
            .cloned()
            .unwrap_or(Value::Null);

        let mut errors = result
            .errors
            .into_iter()
            .map(|error| rebase_error(error, info.response_key, &info.path));
        if value.is_null() {
            if let Some(first) = errors.next() {
                errors.for_each(|error| info.report_error(error));
                return Err(FieldError::from(first));
            }
        }
        errors.for_each(|error| info.report_error(error));
        Ok(value)
    }

    fn resolves_by_response_key(&self) -> bool {
        true
    }
}

/// Moves an upstream error path under the gateway path of the delegated field.
fn rebase_error(mut error: GraphQLError, response_key: &str, base: &[PathSegment]) -> GraphQLError {
    let mut path = base.to_vec();
    if error.path.first().and_then(PathSegment::as_key) == Some(response_key) {
        path.extend(error.path.drain(1..));
    }
    error.path = path;
    error
}
