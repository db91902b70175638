//! SDL parsing and printing for the schema model.

use std::fmt::{self, Write as _};

use graphql_parser::schema as gs;
use tracing::warn;

use crate::document::{convert_directives, convert_type, convert_value, Directive};
use crate::error::SchemaError;
use crate::schema::{
    DirectiveDef, EnumValueDef, FieldDef, InputValueDef, ObjectType, Schema, SchemaBuilder,
    TypeDef, TypeKind,
};
use crate::types::{OperationKind, BUILTIN_DIRECTIVES};

impl Schema {
    /// Parse SDL into a validated schema.
    ///
    /// Without a `schema { }` block, types named `Query`, `Mutation` and
    /// `Subscription` become the root types.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Parse` for invalid SDL, or any integrity error
    /// raised while building the schema.
    pub fn parse(sdl: &str) -> Result<Schema, SchemaError> {
        let document = gs::parse_schema::<String>(sdl).map_err(|e| SchemaError::Parse {
            message: e.to_string(),
        })?;

        let mut builder = SchemaBuilder::new();
        let mut explicit_roots = false;

        for definition in document.definitions {
            match definition {
                gs::Definition::SchemaDefinition(schema_def) => {
                    explicit_roots = true;
                    builder.query = schema_def.query;
                    builder.mutation = schema_def.mutation;
                    builder.subscription = schema_def.subscription;
                }
                gs::Definition::TypeDefinition(type_def) => {
                    builder.types.push(convert_type_definition(type_def));
                }
                gs::Definition::DirectiveDefinition(directive) => {
                    if BUILTIN_DIRECTIVES.contains(&directive.name.as_str()) {
                        continue;
                    }
                    builder.directives.push(DirectiveDef {
                        name: directive.name,
                        description: directive.description,
                        arguments: directive
                            .arguments
                            .into_iter()
                            .map(convert_input_value)
                            .collect(),
                        repeatable: directive.repeatable,
                        locations: directive
                            .locations
                            .iter()
                            .map(|location| location.as_str().to_string())
                            .collect(),
                    });
                }
                gs::Definition::TypeExtension(_) => {
                    warn!("ignoring type extension in SDL");
                }
            }
        }

        if !explicit_roots {
            for kind in OperationKind::ALL {
                let name = kind.default_type_name();
                if builder.types.iter().any(|t| t.name == name) {
                    *builder.root_mut(kind) = Some(name.to_string());
                }
            }
        }

        builder.build()
    }

    /// Print the schema as SDL. Built-in scalars and directives are omitted.
    pub fn to_sdl(&self) -> String {
        self.to_string()
    }
}

fn convert_input_value(value: gs::InputValue<'_, String>) -> InputValueDef {
    InputValueDef {
        name: value.name,
        description: value.description,
        ty: convert_type(value.value_type),
        default_value: value.default_value.map(convert_value),
        directives: convert_directives(value.directives),
    }
}

fn convert_field(field: gs::Field<'_, String>) -> FieldDef {
    FieldDef {
        name: field.name,
        description: field.description,
        ty: convert_type(field.field_type),
        arguments: field.arguments.into_iter().map(convert_input_value).collect(),
        directives: convert_directives(field.directives),
        resolver: None,
    }
}

fn convert_fields(fields: Vec<gs::Field<'_, String>>) -> ObjectType {
    fields
        .into_iter()
        .map(convert_field)
        .fold(ObjectType::default(), ObjectType::with_field)
}

fn convert_type_definition(type_def: gs::TypeDefinition<'_, String>) -> TypeDef {
    match type_def {
        gs::TypeDefinition::Scalar(scalar) => TypeDef {
            name: scalar.name,
            description: scalar.description,
            directives: convert_directives(scalar.directives),
            kind: TypeKind::Scalar,
        },
        gs::TypeDefinition::Object(object) => {
            let mut body = convert_fields(object.fields);
            body.interfaces = object.implements_interfaces;
            TypeDef {
                name: object.name,
                description: object.description,
                directives: convert_directives(object.directives),
                kind: TypeKind::Object(body),
            }
        }
        gs::TypeDefinition::Interface(interface) => TypeDef {
            name: interface.name,
            description: interface.description,
            directives: convert_directives(interface.directives),
            kind: TypeKind::Interface(convert_fields(interface.fields)),
        },
        gs::TypeDefinition::Union(union) => TypeDef {
            name: union.name,
            description: union.description,
            directives: convert_directives(union.directives),
            kind: TypeKind::Union(union.types),
        },
        gs::TypeDefinition::Enum(enum_type) => TypeDef {
            name: enum_type.name,
            description: enum_type.description,
            directives: convert_directives(enum_type.directives),
            kind: TypeKind::Enum(
                enum_type
                    .values
                    .into_iter()
                    .map(|value| {
                        (
                            value.name.clone(),
                            EnumValueDef {
                                name: value.name,
                                description: value.description,
                                directives: convert_directives(value.directives),
                            },
                        )
                    })
                    .collect(),
            ),
        },
        gs::TypeDefinition::InputObject(input) => TypeDef {
            name: input.name,
            description: input.description,
            directives: convert_directives(input.directives),
            kind: TypeKind::InputObject(
                input
                    .fields
                    .into_iter()
                    .map(|field| {
                        let field = convert_input_value(field);
                        (field.name.clone(), field)
                    })
                    .collect(),
            ),
        },
    }
}

// --- Printing ---

fn write_description(f: &mut fmt::Formatter<'_>, description: &Option<String>, indent: &str) -> fmt::Result {
    if let Some(description) = description {
        if description.contains('\n') || description.contains('"') {
            writeln!(f, "{}\"\"\"", indent)?;
            for line in description.lines() {
                writeln!(f, "{}{}", indent, line)?;
            }
            writeln!(f, "{}\"\"\"", indent)?;
        } else {
            writeln!(f, "{}\"{}\"", indent, description)?;
        }
    }
    Ok(())
}

fn write_directives(f: &mut fmt::Formatter<'_>, directives: &[Directive]) -> fmt::Result {
    for directive in directives {
        write!(f, " {}", directive)?;
    }
    Ok(())
}

fn write_input_value(f: &mut fmt::Formatter<'_>, value: &InputValueDef) -> fmt::Result {
    write!(f, "{}: {}", value.name, value.ty)?;
    if let Some(default) = &value.default_value {
        write!(f, " = {}", default)?;
    }
    write_directives(f, &value.directives)
}

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[InputValueDef]) -> fmt::Result {
    if arguments.is_empty() {
        return Ok(());
    }
    f.write_char('(')?;
    for (i, arg) in arguments.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_input_value(f, arg)?;
    }
    f.write_char(')')
}

fn write_object_body(f: &mut fmt::Formatter<'_>, body: &ObjectType) -> fmt::Result {
    f.write_str(" {\n")?;
    for field in body.fields.values() {
        write_description(f, &field.description, "  ")?;
        write!(f, "  {}", field.name)?;
        write_arguments(f, &field.arguments)?;
        write!(f, ": {}", field.ty)?;
        write_directives(f, &field.directives)?;
        f.write_char('\n')?;
    }
    f.write_char('}')
}

fn write_type(f: &mut fmt::Formatter<'_>, type_def: &TypeDef) -> fmt::Result {
    write_description(f, &type_def.description, "")?;
    match &type_def.kind {
        TypeKind::Scalar => {
            write!(f, "scalar {}", type_def.name)?;
            write_directives(f, &type_def.directives)
        }
        TypeKind::Object(body) | TypeKind::Interface(body) => {
            let keyword = if type_def.is_object() { "type" } else { "interface" };
            write!(f, "{} {}", keyword, type_def.name)?;
            if !body.interfaces.is_empty() {
                write!(f, " implements {}", body.interfaces.join(" & "))?;
            }
            write_directives(f, &type_def.directives)?;
            write_object_body(f, body)
        }
        TypeKind::Union(members) => {
            write!(f, "union {}", type_def.name)?;
            write_directives(f, &type_def.directives)?;
            write!(f, " = {}", members.join(" | "))
        }
        TypeKind::Enum(values) => {
            write!(f, "enum {}", type_def.name)?;
            write_directives(f, &type_def.directives)?;
            f.write_str(" {\n")?;
            for value in values.values() {
                write_description(f, &value.description, "  ")?;
                write!(f, "  {}", value.name)?;
                write_directives(f, &value.directives)?;
                f.write_char('\n')?;
            }
            f.write_char('}')
        }
        TypeKind::InputObject(fields) => {
            write!(f, "input {}", type_def.name)?;
            write_directives(f, &type_def.directives)?;
            f.write_str(" {\n")?;
            for field in fields.values() {
                write_description(f, &field.description, "  ")?;
                f.write_str("  ")?;
                write_input_value(f, field)?;
                f.write_char('\n')?;
            }
            f.write_char('}')
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut blocks: Vec<String> = Vec::new();

        let conventional = OperationKind::ALL.into_iter().all(|kind| {
            self.root_type_name(kind)
                .map_or(true, |name| name == kind.default_type_name())
        });
        if !conventional {
            let mut block = String::from("schema {\n");
            for kind in OperationKind::ALL {
                if let Some(name) = self.root_type_name(kind) {
                    let _ = writeln!(block, "  {}: {}", kind, name);
                }
            }
            block.push('}');
            blocks.push(block);
        }

        for directive in self.directives() {
            let mut block = String::new();
            let _ = write!(block, "{}", DirectiveDisplay(directive));
            blocks.push(block);
        }

        for type_def in self.types().filter(|t| !t.is_builtin()) {
            blocks.push(TypeDisplay(type_def).to_string());
        }

        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            f.write_str(block)?;
        }
        if !blocks.is_empty() {
            f.write_char('\n')?;
        }
        Ok(())
    }
}

struct TypeDisplay<'a>(&'a TypeDef);

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self.0)
    }
}

struct DirectiveDisplay<'a>(&'a DirectiveDef);

impl fmt::Display for DirectiveDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directive = self.0;
        write_description(f, &directive.description, "")?;
        write!(f, "directive @{}", directive.name)?;
        write_arguments(f, &directive.arguments)?;
        if directive.repeatable {
            f.write_str(" repeatable")?;
        }
        write!(f, " on {}", directive.locations.join(" | "))
    }
}
