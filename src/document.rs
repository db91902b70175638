//! Operation documents: the request-side syntax tree.
//!
//! Documents are parsed with `graphql-parser` and converted into an owned tree
//! without source positions, so two documents compare equal when they select the
//! same thing. `Display` prints a document back as GraphQL text.

use std::fmt::{self, Write as _};

use graphql_parser::query as gq;
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Number, Value};

use crate::error::DocumentError;
use crate::types::{OperationKind, TypeRef};

/// A literal or variable appearing in arguments, defaults and directives.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    Variable(String),
    List(Vec<InputValue>),
    Object(IndexMap<String, InputValue>),
}

impl InputValue {
    /// Converts to JSON, substituting variables (missing variables become null).
    pub fn to_json(&self, variables: &Map<String, Value>) -> Value {
        match self {
            InputValue::Null => Value::Null,
            InputValue::Int(i) => Value::from(*i),
            InputValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            InputValue::String(s) | InputValue::Enum(s) => Value::String(s.clone()),
            InputValue::Boolean(b) => Value::Bool(*b),
            InputValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
            InputValue::List(items) => {
                Value::Array(items.iter().map(|item| item.to_json(variables)).collect())
            }
            InputValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json(variables)))
                    .collect(),
            ),
        }
    }

    /// Builds a literal from JSON. Strings stay strings; enums cannot be told apart.
    pub fn from_json(value: &Value) -> InputValue {
        match value {
            Value::Null => InputValue::Null,
            Value::Bool(b) => InputValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => InputValue::Int(i),
                None => InputValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => InputValue::String(s.clone()),
            Value::Array(items) => InputValue::List(items.iter().map(InputValue::from_json).collect()),
            Value::Object(fields) => InputValue::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), InputValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Collects the names of variables referenced by this value.
    pub fn collect_variables(&self, out: &mut IndexSet<String>) {
        match self {
            InputValue::Variable(name) => {
                out.insert(name.clone());
            }
            InputValue::List(items) => items.iter().for_each(|item| item.collect_variables(out)),
            InputValue::Object(fields) => fields.values().for_each(|v| v.collect_variables(out)),
            _ => {}
        }
    }

    /// String form used when matching directive arguments against patterns.
    pub fn as_match_str(&self) -> String {
        match self {
            InputValue::String(s) | InputValue::Enum(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Null => f.write_str("null"),
            InputValue::Int(i) => write!(f, "{}", i),
            InputValue::Float(v) => write!(f, "{:?}", v),
            InputValue::String(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
            InputValue::Boolean(b) => write!(f, "{}", b),
            InputValue::Enum(e) => f.write_str(e),
            InputValue::Variable(name) => write!(f, "${}", name),
            InputValue::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            InputValue::Object(fields) => {
                f.write_char('{')?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_char('}')
            }
        }
    }
}

/// An applied directive, on a schema element or a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, InputValue)>,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.arguments.push((name.into(), value));
        self
    }

    pub fn argument(&self, name: &str) -> Option<&InputValue> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        write_arguments(f, &self.arguments)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSet {
    pub items: Vec<Selection>,
}

impl SelectionSet {
    pub fn new(items: Vec<Selection>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, selection: impl Into<Selection>) {
        self.items.push(selection.into());
    }

    /// Fields selected directly in this set (fragments are not expanded).
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.items.iter().filter_map(|selection| match selection {
            Selection::Field(field) => Some(field),
            _ => None,
        })
    }

    /// Returns true when an unaliased field called `name` is selected directly.
    pub fn selects(&self, name: &str) -> bool {
        self.fields().any(|field| field.name == name && field.alias.is_none())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Selection::Field(field)
    }
}

impl From<InlineFragment> for Selection {
    fn from(fragment: InlineFragment) -> Self {
        Selection::InlineFragment(fragment)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, InputValue)>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: SelectionSet::default(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.arguments.push((name.into(), value));
        self
    }

    pub fn with_selection_set(mut self, selection_set: SelectionSet) -> Self {
        self.selection_set = selection_set;
        self
    }

    /// Key under which the field's value appears in a result.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&InputValue> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    pub fragment_name: String,
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

impl InlineFragment {
    pub fn on(type_condition: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self {
            type_condition: Some(type_condition.into()),
            directives: Vec::new(),
            selection_set,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: TypeRef,
    pub default_value: Option<InputValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

impl OperationDefinition {
    pub fn new(kind: OperationKind, selection_set: SelectionSet) -> Self {
        Self {
            kind,
            name: None,
            variables: Vec::new(),
            directives: Vec::new(),
            selection_set,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

/// An executable document: operations plus the fragments they spread.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub operations: Vec<OperationDefinition>,
    pub fragments: Vec<FragmentDefinition>,
}

impl Document {
    /// Parse GraphQL operation text.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Parse` if the text is not a valid executable document.
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let parsed = gq::parse_query::<String>(source).map_err(|e| DocumentError::Parse {
            message: e.to_string(),
        })?;

        let mut document = Document::default();
        for definition in parsed.definitions {
            match definition {
                gq::Definition::Operation(operation) => {
                    document.operations.push(convert_operation(operation))
                }
                gq::Definition::Fragment(fragment) => {
                    let gq::TypeCondition::On(type_condition) = fragment.type_condition;
                    document.fragments.push(FragmentDefinition {
                        name: fragment.name,
                        type_condition,
                        directives: convert_directives(fragment.directives),
                        selection_set: convert_selection_set(fragment.selection_set),
                    });
                }
            }
        }
        Ok(document)
    }

    /// Document holding a single operation.
    pub fn from_operation(operation: OperationDefinition) -> Self {
        Self {
            operations: vec![operation],
            fragments: Vec::new(),
        }
    }

    /// Select the operation to run, by name when the document has several.
    pub fn operation(&self, name: Option<&str>) -> Result<&OperationDefinition, DocumentError> {
        match name {
            Some(name) => self
                .operations
                .iter()
                .find(|op| op.name.as_deref() == Some(name))
                .ok_or_else(|| DocumentError::UnknownOperation {
                    name: name.to_string(),
                }),
            None => match self.operations.as_slice() {
                [] => Err(DocumentError::NoOperation),
                [single] => Ok(single),
                _ => Err(DocumentError::AmbiguousOperation),
            },
        }
    }

    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments.iter().find(|fragment| fragment.name == name)
    }

    /// Names of fragments reachable from the operations, in discovery order.
    pub fn used_fragments(&self) -> IndexSet<String> {
        let mut used = IndexSet::new();
        let mut pending: Vec<&SelectionSet> =
            self.operations.iter().map(|op| &op.selection_set).collect();
        while let Some(set) = pending.pop() {
            for selection in &set.items {
                match selection {
                    Selection::Field(field) => pending.push(&field.selection_set),
                    Selection::InlineFragment(inline) => pending.push(&inline.selection_set),
                    Selection::FragmentSpread(spread) => {
                        if used.insert(spread.fragment_name.clone()) {
                            if let Some(fragment) = self.fragment(&spread.fragment_name) {
                                pending.push(&fragment.selection_set);
                            }
                        }
                    }
                }
            }
        }
        used
    }

    /// Names of variables referenced by the operations and their used fragments.
    pub fn used_variables(&self) -> IndexSet<String> {
        let mut used = IndexSet::new();
        let fragments = self.used_fragments();
        for operation in &self.operations {
            collect_directive_variables(&operation.directives, &mut used);
            collect_set_variables(&operation.selection_set, &mut used);
        }
        for fragment in self.fragments.iter().filter(|f| fragments.contains(&f.name)) {
            collect_directive_variables(&fragment.directives, &mut used);
            collect_set_variables(&fragment.selection_set, &mut used);
        }
        used
    }
}

fn collect_directive_variables(directives: &[Directive], out: &mut IndexSet<String>) {
    for directive in directives {
        for (_, value) in &directive.arguments {
            value.collect_variables(out);
        }
    }
}

fn collect_set_variables(set: &SelectionSet, out: &mut IndexSet<String>) {
    for selection in &set.items {
        match selection {
            Selection::Field(field) => {
                for (_, value) in &field.arguments {
                    value.collect_variables(out);
                }
                collect_directive_variables(&field.directives, out);
                collect_set_variables(&field.selection_set, out);
            }
            Selection::InlineFragment(inline) => {
                collect_directive_variables(&inline.directives, out);
                collect_set_variables(&inline.selection_set, out);
            }
            Selection::FragmentSpread(spread) => collect_directive_variables(&spread.directives, out),
        }
    }
}

// --- Conversion from graphql-parser ---

pub(crate) fn convert_value(value: gq::Value<'_, String>) -> InputValue {
    match value {
        gq::Value::Variable(name) => InputValue::Variable(name),
        gq::Value::Int(n) => InputValue::Int(n.as_i64().unwrap_or_default()),
        gq::Value::Float(f) => InputValue::Float(f),
        gq::Value::String(s) => InputValue::String(s),
        gq::Value::Boolean(b) => InputValue::Boolean(b),
        gq::Value::Null => InputValue::Null,
        gq::Value::Enum(e) => InputValue::Enum(e),
        gq::Value::List(items) => InputValue::List(items.into_iter().map(convert_value).collect()),
        gq::Value::Object(fields) => InputValue::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, convert_value(v)))
                .collect(),
        ),
    }
}

pub(crate) fn convert_type(ty: gq::Type<'_, String>) -> TypeRef {
    match ty {
        gq::Type::NamedType(name) => TypeRef::Named(name),
        gq::Type::ListType(inner) => TypeRef::List(Box::new(convert_type(*inner))),
        gq::Type::NonNullType(inner) => TypeRef::NonNull(Box::new(convert_type(*inner))),
    }
}

pub(crate) fn convert_directives(directives: Vec<gq::Directive<'_, String>>) -> Vec<Directive> {
    directives
        .into_iter()
        .map(|directive| Directive {
            name: directive.name,
            arguments: convert_arguments(directive.arguments),
        })
        .collect()
}

fn convert_arguments(arguments: Vec<(String, gq::Value<'_, String>)>) -> Vec<(String, InputValue)> {
    arguments
        .into_iter()
        .map(|(name, value)| (name, convert_value(value)))
        .collect()
}

fn convert_operation(operation: gq::OperationDefinition<'_, String>) -> OperationDefinition {
    let (kind, name, variables, directives, selection_set) = match operation {
        gq::OperationDefinition::SelectionSet(set) => {
            (OperationKind::Query, None, Vec::new(), Vec::new(), set)
        }
        gq::OperationDefinition::Query(q) => (
            OperationKind::Query,
            q.name,
            q.variable_definitions,
            q.directives,
            q.selection_set,
        ),
        gq::OperationDefinition::Mutation(m) => (
            OperationKind::Mutation,
            m.name,
            m.variable_definitions,
            m.directives,
            m.selection_set,
        ),
        gq::OperationDefinition::Subscription(s) => (
            OperationKind::Subscription,
            s.name,
            s.variable_definitions,
            s.directives,
            s.selection_set,
        ),
    };

    OperationDefinition {
        kind,
        name,
        variables: variables
            .into_iter()
            .map(|var| VariableDefinition {
                name: var.name,
                ty: convert_type(var.var_type),
                default_value: var.default_value.map(convert_value),
            })
            .collect(),
        directives: convert_directives(directives),
        selection_set: convert_selection_set(selection_set),
    }
}

fn convert_selection_set(set: gq::SelectionSet<'_, String>) -> SelectionSet {
    SelectionSet {
        items: set.items.into_iter().map(convert_selection).collect(),
    }
}

fn convert_selection(selection: gq::Selection<'_, String>) -> Selection {
    match selection {
        gq::Selection::Field(field) => Selection::Field(Field {
            alias: field.alias,
            name: field.name,
            arguments: convert_arguments(field.arguments),
            directives: convert_directives(field.directives),
            selection_set: convert_selection_set(field.selection_set),
        }),
        gq::Selection::FragmentSpread(spread) => Selection::FragmentSpread(FragmentSpread {
            fragment_name: spread.fragment_name,
            directives: convert_directives(spread.directives),
        }),
        gq::Selection::InlineFragment(inline) => Selection::InlineFragment(InlineFragment {
            type_condition: inline
                .type_condition
                .map(|gq::TypeCondition::On(name)| name),
            directives: convert_directives(inline.directives),
            selection_set: convert_selection_set(inline.selection_set),
        }),
    }
}

// --- Printing ---

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[(String, InputValue)]) -> fmt::Result {
    if arguments.is_empty() {
        return Ok(());
    }
    f.write_char('(')?;
    for (i, (name, value)) in arguments.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", name, value)?;
    }
    f.write_char(')')
}

fn write_directives(f: &mut fmt::Formatter<'_>, directives: &[Directive]) -> fmt::Result {
    for directive in directives {
        write!(f, " {}", directive)?;
    }
    Ok(())
}

fn write_selection_set(f: &mut fmt::Formatter<'_>, set: &SelectionSet, depth: usize) -> fmt::Result {
    f.write_str("{\n")?;
    let indent = "  ".repeat(depth + 1);
    for selection in &set.items {
        f.write_str(&indent)?;
        match selection {
            Selection::Field(field) => {
                if let Some(alias) = &field.alias {
                    write!(f, "{}: ", alias)?;
                }
                f.write_str(&field.name)?;
                write_arguments(f, &field.arguments)?;
                write_directives(f, &field.directives)?;
                if !field.selection_set.is_empty() {
                    f.write_char(' ')?;
                    write_selection_set(f, &field.selection_set, depth + 1)?;
                }
            }
            Selection::FragmentSpread(spread) => {
                write!(f, "...{}", spread.fragment_name)?;
                write_directives(f, &spread.directives)?;
            }
            Selection::InlineFragment(inline) => {
                f.write_str("...")?;
                if let Some(condition) = &inline.type_condition {
                    write!(f, " on {}", condition)?;
                }
                write_directives(f, &inline.directives)?;
                f.write_char(' ')?;
                write_selection_set(f, &inline.selection_set, depth + 1)?;
            }
        }
        f.write_char('\n')?;
    }
    write!(f, "{}}}", "  ".repeat(depth))
}

impl fmt::Display for SelectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_selection_set(f, self, 0)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for operation in &self.operations {
            if !first {
                f.write_str("\n\n")?;
            }
            first = false;
            let anonymous = operation.kind == OperationKind::Query
                && operation.name.is_none()
                && operation.variables.is_empty()
                && operation.directives.is_empty();
            if !anonymous {
                f.write_str(operation.kind.as_str())?;
                if let Some(name) = &operation.name {
                    write!(f, " {}", name)?;
                }
                if !operation.variables.is_empty() {
                    f.write_char('(')?;
                    for (i, var) in operation.variables.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "${}: {}", var.name, var.ty)?;
                        if let Some(default) = &var.default_value {
                            write!(f, " = {}", default)?;
                        }
                    }
                    f.write_char(')')?;
                }
                write_directives(f, &operation.directives)?;
                f.write_char(' ')?;
            }
            write_selection_set(f, &operation.selection_set, 0)?;
        }
        for fragment in &self.fragments {
            if !first {
                f.write_str("\n\n")?;
            }
            first = false;
            write!(f, "fragment {} on {}", fragment.name, fragment.type_condition)?;
            write_directives(f, &fragment.directives)?;
            f.write_char(' ')?;
            write_selection_set(f, &fragment.selection_set, 0)?;
        }
        Ok(())
    }
}
