//! Schema model built from introspection.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::error::{GraphQLError, Result};
use crate::introspection::{
    DirectiveDef, EnumValueDef, FieldDef, FullType, InputValueDef, IntrospectionSchema, TypeKind,
    TypeRef,
};

/// Scalars every GraphQL schema has; omitted from SDL output
pub const BUILTIN_SCALARS: &[&str] = &["String", "Int", "Float", "Boolean", "ID"];

/// Directives assumed present even when introspection omits them
pub const BUILTIN_DIRECTIVES: &[&str] = &["include", "skip", "deprecated", "specifiedBy"];

/// Root operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `query`
    Query,
    /// `mutation`
    Mutation,
    /// `subscription`
    Subscription,
}

/// Parsed GraphQL schema
#[derive(Debug, Clone)]
pub struct Schema {
    query_type: String,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    types: Vec<FullType>,
    index: HashMap<String, usize>,
    directives: Vec<DirectiveDef>,
}

impl Schema {
    /// Build a schema from an introspection result
    ///
    /// # Errors
    ///
    /// Returns [`GraphQLError::Introspection`] when the query root is missing
    /// or not defined among the types.
    pub fn from_introspection(introspection: IntrospectionSchema) -> Result<Self> {
        let query_type = introspection
            .query_type
            .map(|r| r.name)
            .ok_or_else(|| GraphQLError::introspection("schema has no query root type"))?;

        let index: HashMap<String, usize> = introspection
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        if !index.contains_key(&query_type) {
            return Err(GraphQLError::introspection(format!(
                "query root type \"{query_type}\" is not defined"
            )));
        }

        Ok(Self {
            query_type,
            mutation_type: introspection.mutation_type.map(|r| r.name),
            subscription_type: introspection.subscription_type.map(|r| r.name),
            types: introspection.types,
            index,
            directives: introspection.directives,
        })
    }

    /// Look up a named type
    pub fn get_type(&self, name: &str) -> Option<&FullType> {
        self.index.get(name).map(|&i| &self.types[i])
    }

    /// Whether a named type exists
    pub fn has_type(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Root type for an operation kind, if the schema defines one
    pub fn root_type(&self, kind: OperationKind) -> Option<&FullType> {
        let name = match kind {
            OperationKind::Query => Some(&self.query_type),
            OperationKind::Mutation => self.mutation_type.as_ref(),
            OperationKind::Subscription => self.subscription_type.as_ref(),
        }?;
        self.get_type(name)
    }

    /// Query root type name
    pub fn query_type_name(&self) -> &str {
        &self.query_type
    }

    /// Field of an object or interface type
    pub fn field(&self, type_name: &str, field: &str) -> Option<&FieldDef> {
        self.get_type(type_name)?.field(field)
    }

    /// Whether `name` is a known directive
    pub fn has_directive(&self, name: &str) -> bool {
        BUILTIN_DIRECTIVES.contains(&name) || self.directives.iter().any(|d| d.name == name)
    }

    /// All named types, in introspection order
    pub fn types(&self) -> impl Iterator<Item = &FullType> {
        self.types.iter()
    }

    /// Render the schema as SDL, skipping built-in scalars and `__` types
    pub fn to_sdl(&self) -> String {
        let mut out = String::new();

        if self.query_type != "Query"
            || self.mutation_type.as_deref().is_some_and(|m| m != "Mutation")
            || self
                .subscription_type
                .as_deref()
                .is_some_and(|s| s != "Subscription")
        {
            out.push_str("schema {\n");
            let _ = writeln!(out, "  query: {}", self.query_type);
            if let Some(mutation) = &self.mutation_type {
                let _ = writeln!(out, "  mutation: {mutation}");
            }
            if let Some(subscription) = &self.subscription_type {
                let _ = writeln!(out, "  subscription: {subscription}");
            }
            out.push_str("}\n\n");
        }

        for directive in &self.directives {
            if BUILTIN_DIRECTIVES.contains(&directive.name.as_str()) {
                continue;
            }
            write_description(&mut out, directive.description.as_deref(), "");
            let _ = writeln!(
                out,
                "directive @{}{} on {}\n",
                directive.name,
                render_args(&directive.args),
                directive.locations.join(" | ")
            );
        }

        for ty in &self.types {
            if ty.name.starts_with("__") || BUILTIN_SCALARS.contains(&ty.name.as_str()) {
                continue;
            }
            write_type(&mut out, ty);
            out.push('\n');
        }

        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out.push('\n');
        out
    }
}

fn write_type(out: &mut String, ty: &FullType) {
    write_description(out, ty.description.as_deref(), "");
    match ty.kind {
        TypeKind::Scalar => {
            let _ = writeln!(out, "scalar {}", ty.name);
        }
        TypeKind::Object | TypeKind::Interface => {
            let keyword = if ty.kind == TypeKind::Object {
                "type"
            } else {
                "interface"
            };
            let _ = write!(out, "{keyword} {}", ty.name);
            let interfaces = named_list(ty.interfaces.as_deref());
            if !interfaces.is_empty() {
                let _ = write!(out, " implements {}", interfaces.join(" & "));
            }
            out.push_str(" {\n");
            for field in ty.fields.as_deref().unwrap_or_default() {
                write_description(out, field.description.as_deref(), "  ");
                let _ = write!(out, "  {}{}: {}", field.name, render_args(&field.args), field.ty);
                write_deprecation(out, field.is_deprecated, field.deprecation_reason.as_deref());
                out.push('\n');
            }
            out.push_str("}\n");
        }
        TypeKind::Union => {
            let members = named_list(ty.possible_types.as_deref());
            let _ = writeln!(out, "union {} = {}", ty.name, members.join(" | "));
        }
        TypeKind::Enum => {
            let _ = writeln!(out, "enum {} {{", ty.name);
            for value in ty.enum_values.as_deref().unwrap_or_default() {
                write_enum_value(out, value);
            }
            out.push_str("}\n");
        }
        TypeKind::InputObject => {
            let _ = writeln!(out, "input {} {{", ty.name);
            for field in ty.input_fields.as_deref().unwrap_or_default() {
                write_description(out, field.description.as_deref(), "  ");
                let _ = writeln!(out, "  {}", render_input_value(field));
            }
            out.push_str("}\n");
        }
        TypeKind::List | TypeKind::NonNull => {}
    }
}

fn write_enum_value(out: &mut String, value: &EnumValueDef) {
    write_description(out, value.description.as_deref(), "  ");
    let _ = write!(out, "  {}", value.name);
    write_deprecation(out, value.is_deprecated, value.deprecation_reason.as_deref());
    out.push('\n');
}

fn write_deprecation(out: &mut String, deprecated: bool, reason: Option<&str>) {
    if !deprecated {
        return;
    }
    match reason {
        Some(reason) if reason != "No longer supported" => {
            let _ = write!(out, " @deprecated(reason: {})", quote(reason));
        }
        _ => out.push_str(" @deprecated"),
    }
}

fn write_description(out: &mut String, description: Option<&str>, indent: &str) {
    let Some(description) = description.filter(|d| !d.is_empty()) else {
        return;
    };
    if description.contains('\n') {
        let _ = writeln!(out, "{indent}\"\"\"");
        for line in description.lines() {
            let _ = writeln!(out, "{indent}{}", line.replace("\"\"\"", "\\\"\"\""));
        }
        let _ = writeln!(out, "{indent}\"\"\"");
    } else {
        let _ = writeln!(out, "{indent}{}", quote(description));
    }
}

fn render_args(args: &[InputValueDef]) -> String {
    if args.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = args.iter().map(render_input_value).collect();
    format!("({})", rendered.join(", "))
}

fn render_input_value(value: &InputValueDef) -> String {
    match &value.default_value {
        Some(default) => format!("{}: {} = {}", value.name, value.ty, default),
        None => format!("{}: {}", value.name, value.ty),
    }
}

fn named_list(refs: Option<&[TypeRef]>) -> Vec<&str> {
    refs.unwrap_or_default()
        .iter()
        .filter_map(TypeRef::named_type)
        .collect()
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}
