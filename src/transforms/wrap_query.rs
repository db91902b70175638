//! Rewriting the selection at a path and unwrapping its result.

use serde_json::Value;

use crate::delegate::DelegationContext;
use crate::document::{Selection, SelectionSet};
use crate::error::TransformError;
use crate::execution::{ExecutionResult, Request};
use crate::transform::{Transform, TransformState};

use super::paths::{for_each_value_at, inline_fragment_spreads};

type Wrapper = dyn Fn(SelectionSet) -> SelectionSet + Send + Sync;
type Extractor = dyn Fn(Value) -> Value + Send + Sync;

/// Replaces the selections of every field at `path` with `wrapper(selections)`
/// and passes each result value found there through `extractor`.
///
/// `path` names fields from the root type. List values at the path are
/// unwrapped element by element; nulls are left alone.
///
/// ```
/// use gql_wrap::document::{Field, SelectionSet};
/// use gql_wrap::transforms::WrapQuery;
///
/// let transform = WrapQuery::new(
///     vec!["userById".into()],
///     |selections| {
///         SelectionSet::new(vec![Field::new("address").with_selection_set(selections).into()])
///     },
///     |mut value| value.get_mut("address").map(serde_json::Value::take).unwrap_or_default(),
/// );
/// # let _ = transform;
/// ```
pub struct WrapQuery {
    path: Vec<String>,
    wrapper: Box<Wrapper>,
    extractor: Box<Extractor>,
}

impl WrapQuery {
    pub fn new(
        path: Vec<String>,
        wrapper: impl Fn(SelectionSet) -> SelectionSet + Send + Sync + 'static,
        extractor: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            path,
            wrapper: Box::new(wrapper),
            extractor: Box::new(extractor),
        }
    }

    /// Wraps matching fields below `set`, collecting their response-key paths.
    fn wrap(
        &self,
        set: &mut SelectionSet,
        depth: usize,
        keys: &mut Vec<String>,
        found: &mut Vec<Vec<String>>,
    ) {
        let Some(name) = self.path.get(depth) else {
            return;
        };
        for selection in &mut set.items {
            match selection {
                Selection::Field(field) if field.name == *name => {
                    keys.push(field.response_key().to_string());
                    if depth + 1 == self.path.len() {
                        let selections = std::mem::take(&mut field.selection_set);
                        field.selection_set = (self.wrapper)(selections);
                        if !found.contains(keys) {
                            found.push(keys.clone());
                        }
                    } else {
                        self.wrap(&mut field.selection_set, depth + 1, keys, found);
                    }
                    keys.pop();
                }
                Selection::InlineFragment(inline) => {
                    self.wrap(&mut inline.selection_set, depth, keys, found)
                }
                _ => {}
            }
        }
    }
}

impl Transform for WrapQuery {
    fn name(&self) -> &str {
        "WrapQuery"
    }

    fn transform_request(
        &self,
        mut request: Request,
        _context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        inline_fragment_spreads(&mut request.document);
        let mut found = Vec::new();
        for operation in &mut request.document.operations {
            self.wrap(&mut operation.selection_set, 0, &mut Vec::new(), &mut found);
        }
        state.insert(found);
        Ok(request)
    }

    fn transform_result(
        &self,
        mut result: ExecutionResult,
        _context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        let found: Vec<Vec<String>> = state.require(self.name(), "wrapped query paths")?;
        if let Some(data) = &mut result.data {
            for keys in &found {
                for_each_value_at(data, keys, &mut |value| {
                    *value = (self.extractor)(value.take());
                });
            }
        }
        Ok(result)
    }
}
