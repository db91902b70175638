//! Moving a selection to another place in the request.

use serde_json::{Map, Value};

use crate::delegate::DelegationContext;
use crate::document::{Field, Selection, SelectionSet};
use crate::error::TransformError;
use crate::execution::{ExecutionResult, Request};
use crate::transform::{Transform, TransformState};
use crate::types::Phase;

use super::paths::{
    for_each_object_at, inline_fragment_spreads, insert_at, relocate_keys, take_at, Aliases,
};

/// Moves the selection at field path `from` to field path `to` in requests,
/// and moves the matching result value from `to` back to `from`.
///
/// Both paths start at the root type and name fields, not response keys.
/// Missing intermediate fields along `to` are created; existing ones without
/// alias or arguments are reused.
///
/// ```
/// use gql_wrap::transforms::ExtractField;
///
/// // clients select `user { street }`, upstream expects `user { address { street } }`
/// let transform = ExtractField::new(
///     vec!["user".into(), "street".into()],
///     vec!["user".into(), "address".into(), "street".into()],
/// );
/// # let _ = transform;
/// ```
#[derive(Debug, Clone)]
pub struct ExtractField {
    from: Vec<String>,
    to: Vec<String>,
}

impl ExtractField {
    pub fn new(from: Vec<String>, to: Vec<String>) -> Self {
        Self { from, to }
    }

    /// Depth of the selection set both paths share.
    fn common_depth(&self) -> usize {
        let limit = self.from.len().min(self.to.len()) - 1;
        self.from
            .iter()
            .zip(&self.to)
            .take(limit)
            .take_while(|(a, b)| a == b)
            .count()
    }
}

/// The value at `to_keys` under `parent` answers the selection at `from_keys`.
/// `created` is the index in `to_keys` of the first field the transform added.
#[derive(Debug)]
struct Move {
    parent: Vec<String>,
    from_keys: Vec<String>,
    to_keys: Vec<String>,
    created: Option<usize>,
}

impl Move {
    fn apply(&self, object: &mut Map<String, Value>) {
        let value = take_at(object, &self.to_keys).unwrap_or(Value::Null);
        if let Some(index) = self.created {
            take_at(object, &self.to_keys[..=index]);
        }
        insert_at(object, &self.from_keys, value);
    }
}

impl Transform for ExtractField {
    fn name(&self) -> &str {
        "ExtractField"
    }

    fn transform_request(
        &self,
        mut request: Request,
        _context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<Request, TransformError> {
        if self.from.is_empty() || self.to.is_empty() {
            return Err(TransformError::new(
                self.name(),
                Phase::Request,
                "both `from` and `to` must name at least one field",
            ));
        }
        inline_fragment_spreads(&mut request.document);
        let mut mover = Mover {
            extract: self,
            depth: self.common_depth(),
            aliases: Aliases::new(state.position()),
            moves: Vec::new(),
        };
        for operation in &mut request.document.operations {
            mover.descend(&mut operation.selection_set, 0, &mut Vec::new());
        }
        state.insert(mover.moves);
        Ok(request)
    }

    fn transform_result(
        &self,
        mut result: ExecutionResult,
        _context: &DelegationContext,
        state: &mut TransformState,
    ) -> Result<ExecutionResult, TransformError> {
        let moves: Vec<Move> = state.require(self.name(), "extracted field records")?;
        for record in moves.iter().rev() {
            if let Some(data) = &mut result.data {
                for_each_object_at(data, &record.parent, &mut |object| record.apply(object));
            }
            for error in &mut result.errors {
                relocate_keys(&mut error.path, &record.parent, &record.to_keys, &record.from_keys);
            }
        }
        Ok(result)
    }
}

struct Mover<'a> {
    extract: &'a ExtractField,
    depth: usize,
    aliases: Aliases,
    moves: Vec<Move>,
}

impl Mover<'_> {
    /// Follows the shared part of the paths down to the selection sets where
    /// the move happens.
    fn descend(&mut self, set: &mut SelectionSet, level: usize, path: &mut Vec<String>) {
        if level == self.depth {
            self.relocate(set, path);
            return;
        }
        let extract = self.extract;
        let name = &extract.from[level];
        for selection in &mut set.items {
            match selection {
                Selection::Field(field) if field.name == *name => {
                    path.push(field.response_key().to_string());
                    self.descend(&mut field.selection_set, level + 1, path);
                    path.pop();
                }
                Selection::InlineFragment(inline) => {
                    self.descend(&mut inline.selection_set, level, path)
                }
                _ => {}
            }
        }
    }

    fn relocate(&mut self, set: &mut SelectionSet, path: &[String]) {
        let extract = self.extract;
        let mut taken = Vec::new();
        detach(set, &extract.from[self.depth..], &mut Vec::new(), &mut taken);

        let to = &extract.to[self.depth..];
        let Some((leaf, intermediate)) = to.split_last() else {
            return;
        };
        for (from_keys, mut node) in taken {
            let mut to_keys = Vec::new();
            let mut created = None;
            let mut current: &mut SelectionSet = set;
            for name in intermediate {
                let reusable = current.items.iter().position(|selection| {
                    matches!(selection, Selection::Field(f)
                        if f.name == *name && f.alias.is_none() && f.arguments.is_empty())
                });
                let index = match reusable {
                    Some(index) => {
                        to_keys.push(name.clone());
                        index
                    }
                    None => {
                        let alias = self.aliases.next();
                        created.get_or_insert(to_keys.len());
                        to_keys.push(alias.clone());
                        current.push(Field::new(name.as_str()).with_alias(alias));
                        current.items.len() - 1
                    }
                };
                current = match &mut current.items[index] {
                    Selection::Field(field) => &mut field.selection_set,
                    _ => return,
                };
            }

            let alias = self.aliases.next();
            to_keys.push(alias.clone());
            node.name = leaf.clone();
            node.alias = Some(alias);
            current.push(node);

            self.moves.push(Move {
                parent: path.to_vec(),
                from_keys,
                to_keys,
                created,
            });
        }
    }
}

/// Removes the fields reached by `names` from `set`, dropping intermediate
/// fields left without selections.
fn detach(
    set: &mut SelectionSet,
    names: &[String],
    prefix: &mut Vec<String>,
    taken: &mut Vec<(Vec<String>, Field)>,
) {
    let Some((name, rest)) = names.split_first() else {
        return;
    };
    for selection in std::mem::take(&mut set.items) {
        match selection {
            Selection::Field(field) if field.name == *name && rest.is_empty() => {
                let mut keys = prefix.clone();
                keys.push(field.response_key().to_string());
                taken.push((keys, field));
            }
            Selection::Field(mut field) if field.name == *name => {
                prefix.push(field.response_key().to_string());
                detach(&mut field.selection_set, rest, prefix, taken);
                prefix.pop();
                if !field.selection_set.is_empty() {
                    set.items.push(Selection::Field(field));
                }
            }
            Selection::InlineFragment(mut inline) => {
                detach(&mut inline.selection_set, names, prefix, taken);
                if !inline.selection_set.is_empty() {
                    set.items.push(Selection::InlineFragment(inline));
                }
            }
            other => set.items.push(other),
        }
    }
}
