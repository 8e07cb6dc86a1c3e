//! Standard GraphQL introspection query and result model.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphQLError, Result};

/// Introspection query sent to endpoints
pub const INTROSPECTION_QUERY: &str = r"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types { ...FullType }
    directives {
      name
      description
      locations
      args { ...InputValue }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args { ...InputValue }
    type { ...TypeRef }
    isDeprecated
    deprecationReason
  }
  inputFields { ...InputValue }
  interfaces { ...TypeRef }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes { ...TypeRef }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
";

/// `__TypeKind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

/// `{ name }` reference to a root operation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    /// Type name
    pub name: String,
}

/// `__Schema`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionSchema {
    /// Query root
    pub query_type: Option<NamedRef>,
    /// Mutation root
    #[serde(default)]
    pub mutation_type: Option<NamedRef>,
    /// Subscription root
    #[serde(default)]
    pub subscription_type: Option<NamedRef>,
    /// All named types
    pub types: Vec<FullType>,
    /// Directive definitions
    #[serde(default)]
    pub directives: Vec<DirectiveDef>,
}

/// `__Type` with its members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullType {
    /// Kind
    pub kind: TypeKind,
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Fields (objects and interfaces)
    #[serde(default)]
    pub fields: Option<Vec<FieldDef>>,
    /// Input fields (input objects)
    #[serde(default)]
    pub input_fields: Option<Vec<InputValueDef>>,
    /// Implemented interfaces
    #[serde(default)]
    pub interfaces: Option<Vec<TypeRef>>,
    /// Enum values
    #[serde(default)]
    pub enum_values: Option<Vec<EnumValueDef>>,
    /// Possible types (unions and interfaces)
    #[serde(default)]
    pub possible_types: Option<Vec<TypeRef>>,
}

impl FullType {
    /// Whether selections can be made on this type
    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Object | TypeKind::Interface | TypeKind::Union
        )
    }

    /// Whether this is a scalar or enum
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar | TypeKind::Enum)
    }

    /// Whether this type may be used for variables
    pub fn is_input(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Scalar | TypeKind::Enum | TypeKind::InputObject
        )
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.as_ref()?.iter().find(|f| f.name == name)
    }
}

/// `__Field`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Arguments
    #[serde(default)]
    pub args: Vec<InputValueDef>,
    /// Output type
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Deprecated flag
    #[serde(default)]
    pub is_deprecated: bool,
    /// Deprecation reason
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

/// `__InputValue`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValueDef {
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Input type
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Default value, as GraphQL source text
    #[serde(default)]
    pub default_value: Option<String>,
}

impl InputValueDef {
    /// Non-null without a default
    pub fn is_required(&self) -> bool {
        self.ty.kind == TypeKind::NonNull && self.default_value.is_none()
    }
}

/// `__EnumValue`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValueDef {
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Deprecated flag
    #[serde(default)]
    pub is_deprecated: bool,
    /// Deprecation reason
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

/// `__Directive`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveDef {
    /// Name, without `@`
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Valid locations
    #[serde(default)]
    pub locations: Vec<String>,
    /// Arguments
    #[serde(default)]
    pub args: Vec<InputValueDef>,
}

/// Possibly wrapped type reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    /// Kind
    pub kind: TypeKind,
    /// Name, absent for `LIST` and `NON_NULL`
    #[serde(default)]
    pub name: Option<String>,
    /// Wrapped type
    #[serde(default)]
    pub of_type: Option<Box<TypeRef>>,
}

impl TypeRef {
    /// Innermost named type
    pub fn named_type(&self) -> Option<&str> {
        match &self.name {
            Some(name) => Some(name.as_str()),
            None => self.of_type.as_deref()?.named_type(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.of_type.as_deref()) {
            (TypeKind::NonNull, Some(inner)) => write!(f, "{inner}!"),
            (TypeKind::List, Some(inner)) => write!(f, "[{inner}]"),
            _ => f.write_str(self.name.as_deref().unwrap_or("?")),
        }
    }
}

#[derive(Deserialize)]
struct SchemaEnvelope {
    #[serde(rename = "__schema")]
    schema: IntrospectionSchema,
}

/// Extract `__schema` from an introspection payload.
///
/// Accepts a full response (`{ "data": { "__schema": ... } }`) or the bare
/// data object (`{ "__schema": ... }`).
///
/// # Errors
///
/// Returns [`GraphQLError::Introspection`] when the payload has no
/// `__schema`, carries only GraphQL errors, or does not match the model.
pub fn parse_introspection(payload: &Value) -> Result<IntrospectionSchema> {
    let data = match payload.get("data") {
        Some(data) if !data.is_null() => data,
        _ if payload.get("__schema").is_some() => payload,
        _ => {
            let reason = match payload.get("errors").and_then(Value::as_array) {
                Some(errors) => errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; "),
                None => "missing __schema".to_string(),
            };
            return Err(GraphQLError::introspection(reason));
        }
    };

    SchemaEnvelope::deserialize(data)
        .map(|envelope| envelope.schema)
        .map_err(|e| GraphQLError::introspection(e.to_string()))
}
