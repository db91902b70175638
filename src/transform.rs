//! The transform protocol.
//!
//! A transform has three independent phases. Each defaults to the identity, so
//! an implementation only overrides what it changes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::delegate::DelegationContext;
use crate::error::TransformError;
use crate::execution::{ExecutionResult, Request};
use crate::pipeline::SubschemaConfig;
use crate::schema::Schema;

/// A reversible rewrite between the original and the gateway schema.
///
/// `transform_schema` must be pure: wrapping runs it twice and expects the same
/// output both times. The request and result phases of one delegated operation
/// share a private [`TransformState`].
pub trait Transform: Send + Sync {
    /// Identifies the transform in errors and logs.
    fn name(&self) -> &str;

    /// Rewrites the schema on its way from the original to the gateway.
    ///
    /// `transformed_schema` is `None` on the first pass. On the second pass it is
    /// the complete first-pass gateway schema.
    fn transform_schema(
        &self,
        schema: Schema,
        _subschema: &Arc<SubschemaConfig>,
        _transformed_schema: Option<&Arc<Schema>>,
    ) -> Result<Schema, TransformError> {
        Ok(schema)
    }

    /// Rewrites a gateway-facing request towards the original schema.
    fn transform_request(
        &self,
        request: Request,
        _context: &DelegationContext,
        _state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        Ok(request)
    }

    /// Rewrites an original-schema result towards the gateway schema.
    fn transform_result(
        &self,
        result: ExecutionResult,
        _context: &DelegationContext,
        _state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        Ok(result)
    }
}

/// Scratch slot owned by one transform for one delegated operation.
///
/// Created empty before the transform's request phase and handed back, as the
/// same instance, to its result phase.
pub struct TransformState {
    position: usize,
    slot: Option<Box<dyn Any + Send + Sync>>,
}

impl TransformState {
    pub(crate) fn new(position: usize) -> Self {
        Self {
            position,
            slot: None,
        }
    }

    /// Index of the owning transform in the subschema's transform list.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.slot = Some(Box::new(value));
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.slot.as_ref()?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.slot.as_mut()?.downcast_mut()
    }

    /// Removes and returns the stored value if it has type `T`.
    pub fn take<T: Any>(&mut self) -> Option<T> {
        let slot = self.slot.take()?;
        match slot.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(slot) => {
                self.slot = Some(slot);
                None
            }
        }
    }

    /// Like [`take`](Self::take), but a missing value is a phase-pairing fault.
    pub fn require<T: Any>(
        &mut self,
        transform: &str,
        expected: &'static str,
    ) -> Result<T, TransformError> {
        self.take().ok_or_else(|| TransformError::MissingState {
            transform: transform.to_string(),
            expected,
        })
    }
}

impl fmt::Debug for TransformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformState")
            .field("position", &self.position)
            .field("occupied", &self.slot.is_some())
            .finish()
    }
}
