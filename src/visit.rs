//! Schema-aware traversal of operation documents.

use crate::document::{Document, Field, Selection, SelectionSet};
use crate::schema::Schema;

/// Callbacks for [`walk_document`]. Children are visited before their parent.
pub trait SelectionVisitor {
    /// Called once a field's own selections were walked. Returning `false`
    /// removes the field from its selection set.
    fn leave_field(&mut self, _parent_type: &str, _field: &mut Field) -> bool {
        true
    }

    /// Called after every selection in `set` was visited.
    fn leave_selection_set(&mut self, _parent_type: &str, _set: &mut SelectionSet) {}
}

/// Walks every operation and fragment of `document`, tracking the parent type
/// of each selection set against `schema`.
///
/// The child type of a field is looked up before `leave_field` runs, so a
/// visitor may rename the field in place. Fields unknown to `schema` are
/// visited but their selections are not descended into.
pub fn walk_document(document: &mut Document, schema: &Schema, visitor: &mut impl SelectionVisitor) {
    for operation in &mut document.operations {
        if let Some(root) = schema.root_type_name(operation.kind) {
            walk_selection_set(&mut operation.selection_set, root, schema, &mut *visitor);
        }
    }
    for fragment in &mut document.fragments {
        let type_condition = fragment.type_condition.clone();
        walk_selection_set(&mut fragment.selection_set, &type_condition, schema, &mut *visitor);
    }
}

/// Walks one selection set whose parent type is `parent_type`.
pub fn walk_selection_set(
    set: &mut SelectionSet,
    parent_type: &str,
    schema: &Schema,
    visitor: &mut impl SelectionVisitor,
) {
    set.items.retain_mut(|selection| match selection {
        Selection::Field(field) => {
            let child_type = schema
                .field(parent_type, &field.name)
                .map(|def| def.ty.name().to_string());
            if let Some(child_type) = child_type {
                walk_selection_set(&mut field.selection_set, &child_type, schema, &mut *visitor);
            }
            visitor.leave_field(parent_type, field)
        }
        Selection::InlineFragment(inline) => {
            let condition = inline
                .type_condition
                .clone()
                .unwrap_or_else(|| parent_type.to_string());
            walk_selection_set(&mut inline.selection_set, &condition, schema, &mut *visitor);
            true
        }
        Selection::FragmentSpread(_) => true,
    });
    visitor.leave_selection_set(parent_type, set);
}
