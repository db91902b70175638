//! Immutable schema model.
//!
//! A [`Schema`] is a validated graph of named type definitions. Schemas are never
//! mutated once built: transforms take one apart with [`Schema::into_builder`],
//! edit the [`SchemaBuilder`] and build a new instance, which re-validates every
//! type reference.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::document::{Directive, InputValue};
use crate::error::SchemaError;
use crate::execute::FieldResolver;
use crate::types::{
    is_builtin_scalar, OperationKind, TypeRef, BUILTIN_SCALARS, DEFAULT_DEPRECATION_REASON,
};

/// Opaque resolve capability attached to object fields.
pub type Resolver = Arc<dyn FieldResolver>;

/// Argument or input-object field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<InputValue>,
    pub directives: Vec<Directive>,
}

impl InputValueDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            default_value: None,
            directives: Vec::new(),
        }
    }

    pub fn with_default(mut self, value: InputValue) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Output field of an object or interface type.
///
/// Equality ignores the resolver: two fields with the same shape are equal
/// whether or not either one is executable.
#[derive(Clone)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: Vec<InputValueDef>,
    pub directives: Vec<Directive>,
    pub resolver: Option<Resolver>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: Vec::new(),
            directives: Vec::new(),
            resolver: None,
        }
    }

    pub fn with_argument(mut self, argument: InputValueDef) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn argument(&self, name: &str) -> Option<&InputValueDef> {
        self.arguments.iter().find(|arg| arg.name == name)
    }

    /// Reason from a `@deprecated` directive, if the field carries one.
    pub fn deprecation_reason(&self) -> Option<String> {
        deprecation_reason(&self.directives)
    }
}

impl PartialEq for FieldDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.ty == other.ty
            && self.arguments == other.arguments
            && self.directives == other.directives
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("arguments", &self.arguments)
            .field("directives", &self.directives)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

pub(crate) fn deprecation_reason(directives: &[Directive]) -> Option<String> {
    directives
        .iter()
        .find(|d| d.name == "deprecated")
        .map(|d| match d.argument("reason") {
            Some(InputValue::String(reason)) => reason.clone(),
            _ => DEFAULT_DEPRECATION_REASON.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    pub directives: Vec<Directive>,
}

/// Object or interface body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectType {
    pub interfaces: Vec<String>,
    pub fields: IndexMap<String, FieldDef>,
}

impl ObjectType {
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Scalar,
    Object(ObjectType),
    Interface(ObjectType),
    Union(Vec<String>),
    Enum(IndexMap<String, EnumValueDef>),
    InputObject(IndexMap<String, InputValueDef>),
}

impl TypeKind {
    pub fn label(&self) -> &'static str {
        match self {
            TypeKind::Scalar => "a scalar",
            TypeKind::Object(_) => "an object",
            TypeKind::Interface(_) => "an interface",
            TypeKind::Union(_) => "a union",
            TypeKind::Enum(_) => "an enum",
            TypeKind::InputObject(_) => "an input object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub description: Option<String>,
    pub directives: Vec<Directive>,
    pub kind: TypeKind,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            directives: Vec::new(),
            kind,
        }
    }

    pub fn object(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        let body = fields
            .into_iter()
            .fold(ObjectType::default(), ObjectType::with_field);
        Self::new(name, TypeKind::Object(body))
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Scalar)
    }

    /// Output fields of an object or interface.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match &self.kind {
            TypeKind::Object(body) | TypeKind::Interface(body) => Some(&body.fields),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut IndexMap<String, FieldDef>> {
        match &mut self.kind {
            TypeKind::Object(body) | TypeKind::Interface(body) => Some(&mut body.fields),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, TypeKind::Object(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface(_) | TypeKind::Union(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Object(_) | TypeKind::Interface(_) | TypeKind::Union(_)
        )
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar) && is_builtin_scalar(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveDef {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<InputValueDef>,
    pub repeatable: bool,
    pub locations: Vec<String>,
}

/// Mutable staging area for a schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    pub types: Vec<TypeDef>,
    pub query: Option<String>,
    pub mutation: Option<String>,
    pub subscription: Option<String>,
    pub directives: Vec<DirectiveDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, type_def: TypeDef) -> Self {
        self.types.push(type_def);
        self
    }

    pub fn with_directive(mut self, directive: DirectiveDef) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn with_root(mut self, kind: OperationKind, name: impl Into<String>) -> Self {
        *self.root_mut(kind) = Some(name.into());
        self
    }

    pub fn root(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => self.query.as_deref(),
            OperationKind::Mutation => self.mutation.as_deref(),
            OperationKind::Subscription => self.subscription.as_deref(),
        }
    }

    pub fn root_mut(&mut self, kind: OperationKind) -> &mut Option<String> {
        match kind {
            OperationKind::Query => &mut self.query,
            OperationKind::Mutation => &mut self.mutation,
            OperationKind::Subscription => &mut self.subscription,
        }
    }

    pub fn type_def_mut(&mut self, name: &str) -> Option<&mut TypeDef> {
        self.types.iter_mut().find(|t| t.name == name)
    }

    /// Renames types and every reference to them.
    ///
    /// `rename` returns the new name, or `None` to keep a type as is.
    pub fn rename_types(&mut self, rename: &impl Fn(&str) -> Option<String>) {
        for type_def in &mut self.types {
            if let Some(new_name) = rename(&type_def.name) {
                type_def.name = new_name;
            }
            match &mut type_def.kind {
                TypeKind::Object(body) | TypeKind::Interface(body) => {
                    for interface in &mut body.interfaces {
                        if let Some(new_name) = rename(interface) {
                            *interface = new_name;
                        }
                    }
                    for field in body.fields.values_mut() {
                        field.ty = field.ty.map_name(rename);
                        for arg in &mut field.arguments {
                            arg.ty = arg.ty.map_name(rename);
                        }
                    }
                }
                TypeKind::Union(members) => {
                    for member in members {
                        if let Some(new_name) = rename(member) {
                            *member = new_name;
                        }
                    }
                }
                TypeKind::InputObject(fields) => {
                    for field in fields.values_mut() {
                        field.ty = field.ty.map_name(rename);
                    }
                }
                TypeKind::Scalar | TypeKind::Enum(_) => {}
            }
        }
        for directive in &mut self.directives {
            for arg in &mut directive.arguments {
                arg.ty = arg.ty.map_name(rename);
            }
        }
        for kind in OperationKind::ALL {
            let root = self.root_mut(kind);
            if let Some(new_name) = root.as_deref().and_then(rename) {
                *root = Some(new_name);
            }
        }
    }

    /// Drops every reference to a type that is no longer defined.
    ///
    /// Fields and arguments of missing types are removed, as are union members,
    /// implemented interfaces and root pointers. Repeats until nothing changes,
    /// since removing fields never removes types.
    pub fn remove_dangling(&mut self) {
        let defined: HashSet<String> = self
            .types
            .iter()
            .map(|t| t.name.clone())
            .chain(BUILTIN_SCALARS.iter().map(|s| s.to_string()))
            .collect();
        let known = |ty: &TypeRef| defined.contains(ty.name());

        for type_def in &mut self.types {
            match &mut type_def.kind {
                TypeKind::Object(body) | TypeKind::Interface(body) => {
                    body.interfaces.retain(|i| defined.contains(i));
                    body.fields.retain(|_, field| known(&field.ty));
                    for field in body.fields.values_mut() {
                        field.arguments.retain(|arg| known(&arg.ty));
                    }
                }
                TypeKind::Union(members) => members.retain(|m| defined.contains(m)),
                TypeKind::InputObject(fields) => fields.retain(|_, field| known(&field.ty)),
                TypeKind::Scalar | TypeKind::Enum(_) => {}
            }
        }
        for directive in &mut self.directives {
            directive.arguments.retain(|arg| known(&arg.ty));
        }
        for kind in OperationKind::ALL {
            let root = self.root_mut(kind);
            if root.as_deref().is_some_and(|name| !defined.contains(name)) {
                *root = None;
            }
        }
    }

    /// Validates references and publishes an immutable schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for dangling references, duplicate or incompatible
    /// type names, and references to a type of the wrong kind.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut types: IndexMap<String, TypeDef> = IndexMap::new();
        for type_def in self.types {
            if let Some(existing) = types.get(&type_def.name) {
                if std::mem::discriminant(&existing.kind) != std::mem::discriminant(&type_def.kind)
                {
                    return Err(SchemaError::IncompatibleType {
                        name: type_def.name.clone(),
                        first: existing.kind.label(),
                        second: type_def.kind.label(),
                    });
                }
                if *existing != type_def {
                    return Err(SchemaError::DuplicateType {
                        name: type_def.name.clone(),
                    });
                }
                continue;
            }
            types.insert(type_def.name.clone(), type_def);
        }
        for scalar in BUILTIN_SCALARS {
            if !types.contains_key(*scalar) {
                types.insert(scalar.to_string(), TypeDef::scalar(*scalar));
            }
        }

        let mut directives = IndexMap::new();
        for directive in self.directives {
            directives.insert(directive.name.clone(), directive);
        }

        let schema = Schema {
            types,
            query: self.query,
            mutation: self.mutation,
            subscription: self.subscription,
            directives,
        };
        schema.validate()?;
        Ok(schema)
    }
}

/// A validated, immutable type system.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    types: IndexMap<String, TypeDef>,
    query: Option<String>,
    mutation: Option<String>,
    subscription: Option<String>,
    directives: IndexMap<String, DirectiveDef>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Takes the schema apart so a modified copy can be built.
    pub fn into_builder(self) -> SchemaBuilder {
        SchemaBuilder {
            types: self
                .types
                .into_values()
                .filter(|t| !t.is_builtin())
                .collect(),
            query: self.query,
            mutation: self.mutation,
            subscription: self.subscription,
            directives: self.directives.into_values().collect(),
        }
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn directive(&self, name: &str) -> Option<&DirectiveDef> {
        self.directives.get(name)
    }

    pub fn directives(&self) -> impl Iterator<Item = &DirectiveDef> {
        self.directives.values()
    }

    pub fn root_type_name(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => self.query.as_deref(),
            OperationKind::Mutation => self.mutation.as_deref(),
            OperationKind::Subscription => self.subscription.as_deref(),
        }
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&TypeDef> {
        self.root_type_name(kind).and_then(|name| self.type_def(name))
    }

    /// Operation kind whose root type is `type_name`, if any.
    pub fn root_kind_of(&self, type_name: &str) -> Option<OperationKind> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| self.root_type_name(*kind) == Some(type_name))
    }

    /// Output field `field_name` of object or interface `type_name`.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.type_def(type_name)?.fields()?.get(field_name)
    }

    pub fn input_fields(&self, type_name: &str) -> Option<&IndexMap<String, InputValueDef>> {
        match &self.type_def(type_name)?.kind {
            TypeKind::InputObject(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn is_abstract(&self, type_name: &str) -> bool {
        self.type_def(type_name).is_some_and(TypeDef::is_abstract)
    }

    /// Object types that may appear where `type_name` is expected.
    pub fn possible_types(&self, type_name: &str) -> Vec<&str> {
        match self.type_def(type_name).map(|t| (t.name.as_str(), &t.kind)) {
            Some((name, TypeKind::Object(_))) => vec![name],
            Some((_, TypeKind::Union(members))) => members.iter().map(String::as_str).collect(),
            Some((_, TypeKind::Interface(_))) => self
                .types
                .values()
                .filter(|t| match &t.kind {
                    TypeKind::Object(body) => body.interfaces.iter().any(|i| i == type_name),
                    _ => false,
                })
                .map(|t| t.name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether a fragment on `condition` applies to an object of type `object_type`.
    pub fn type_condition_applies(&self, condition: &str, object_type: &str) -> bool {
        condition == object_type || self.possible_types(condition).contains(&object_type)
    }

    /// Root fields lacking a resolver, as `(type, field)` pairs.
    pub fn unresolved_root_fields(&self) -> Vec<(String, String)> {
        OperationKind::ALL
            .into_iter()
            .filter_map(|kind| self.root_type(kind))
            .flat_map(|root| {
                root.fields()
                    .into_iter()
                    .flat_map(|fields| fields.values())
                    .filter(|field| field.resolver.is_none())
                    .map(move |field| (root.name.clone(), field.name.clone()))
            })
            .collect()
    }

    /// Copy of this schema with every resolver removed.
    pub fn without_resolvers(&self) -> Schema {
        let mut schema = self.clone();
        for type_def in schema.types.values_mut() {
            if let Some(fields) = type_def.fields_mut() {
                for field in fields.values_mut() {
                    field.resolver = None;
                }
            }
        }
        schema
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for type_def in self.types.values() {
            match &type_def.kind {
                TypeKind::Object(body) | TypeKind::Interface(body) => {
                    for interface in &body.interfaces {
                        self.expect_kind(&type_def.name, interface, "an interface", |k| {
                            matches!(k, TypeKind::Interface(_))
                        })?;
                    }
                    for field in body.fields.values() {
                        let location = format!("{}.{}", type_def.name, field.name);
                        self.expect_output(&location, &field.ty)?;
                        for arg in &field.arguments {
                            let location = format!("{}({}:)", location, arg.name);
                            self.expect_input(&location, &arg.ty)?;
                        }
                    }
                }
                TypeKind::Union(members) => {
                    for member in members {
                        self.expect_kind(&type_def.name, member, "an object", |k| {
                            matches!(k, TypeKind::Object(_))
                        })?;
                    }
                }
                TypeKind::InputObject(fields) => {
                    for field in fields.values() {
                        let location = format!("{}.{}", type_def.name, field.name);
                        self.expect_input(&location, &field.ty)?;
                    }
                }
                TypeKind::Scalar | TypeKind::Enum(_) => {}
            }
        }
        for directive in self.directives.values() {
            for arg in &directive.arguments {
                let location = format!("@{}({}:)", directive.name, arg.name);
                self.expect_input(&location, &arg.ty)?;
            }
        }
        for kind in OperationKind::ALL {
            if let Some(root) = self.root_type_name(kind) {
                self.expect_kind(&format!("{} root", kind), root, "an object", |k| {
                    matches!(k, TypeKind::Object(_))
                })?;
            }
        }
        Ok(())
    }

    fn lookup(&self, location: &str, reference: &str) -> Result<&TypeDef, SchemaError> {
        self.types
            .get(reference)
            .ok_or_else(|| SchemaError::DanglingReference {
                location: location.to_string(),
                reference: reference.to_string(),
            })
    }

    fn expect_kind(
        &self,
        location: &str,
        reference: &str,
        expected: &'static str,
        accept: impl Fn(&TypeKind) -> bool,
    ) -> Result<(), SchemaError> {
        let target = self.lookup(location, reference)?;
        if accept(&target.kind) {
            Ok(())
        } else {
            Err(SchemaError::WrongKind {
                location: location.to_string(),
                reference: reference.to_string(),
                expected,
                actual: target.kind.label(),
            })
        }
    }

    fn expect_output(&self, location: &str, ty: &TypeRef) -> Result<(), SchemaError> {
        self.expect_kind(location, ty.name(), "an output", |k| {
            !matches!(k, TypeKind::InputObject(_))
        })
    }

    fn expect_input(&self, location: &str, ty: &TypeRef) -> Result<(), SchemaError> {
        self.expect_kind(location, ty.name(), "an input", |k| {
            matches!(k, TypeKind::Scalar | TypeKind::Enum(_) | TypeKind::InputObject(_))
        })
    }
}
