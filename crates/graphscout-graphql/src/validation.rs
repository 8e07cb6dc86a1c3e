//! Query validation against an introspected schema.
//!
//! Parsing uses `graphql-parser`; the structural rules below cover what an
//! agent-generated query most often gets wrong. Messages follow the wording
//! of the GraphQL reference implementation so they can be fed back to a model
//! unchanged.

use std::collections::{HashMap, HashSet};

use graphql_parser::query::{
    Definition, Directive, Document, Field, FragmentDefinition, OperationDefinition, ParseError,
    Selection, SelectionSet, Type, TypeCondition, Value, VariableDefinition,
};

use crate::schema::{OperationKind, Schema};

/// Parse `query`, returning the syntax error message on failure
///
/// # Errors
///
/// Returns the formatted syntax error.
pub fn check_syntax(query: &str) -> Result<(), String> {
    graphql_parser::parse_query::<&str>(query)
        .map(|_| ())
        .map_err(|e| syntax_message(&e))
}

/// Parse and validate `query`; an empty result means the query is valid
pub fn validate_query(schema: &Schema, query: &str) -> Vec<String> {
    match graphql_parser::parse_query::<&str>(query) {
        Ok(document) => validate_document(schema, &document),
        Err(e) => vec![syntax_message(&e)],
    }
}

/// Run every structural rule over a parsed document
pub fn validate_document<'d, 'a>(schema: &Schema, document: &'d Document<'a, &'a str>) -> Vec<String> {
    let mut validator = Validator {
        schema,
        fragments: HashMap::new(),
        errors: Vec::new(),
    };

    let mut operations = Vec::new();
    let mut fragments = Vec::new();
    for definition in &document.definitions {
        match definition {
            Definition::Operation(op) => operations.push(Operation::from(op)),
            Definition::Fragment(fragment) => fragments.push(fragment),
        }
    }

    for &fragment in &fragments {
        if validator.fragments.insert(fragment.name, fragment).is_some() {
            validator.errors.push(format!(
                "There can be only one fragment named \"{}\".",
                fragment.name
            ));
        }
    }

    if operations.len() > 1 {
        for _ in operations.iter().filter(|op| op.name.is_none()) {
            validator
                .errors
                .push("This anonymous operation must be the only defined operation.".to_string());
        }
    }

    let mut names = HashSet::new();
    for name in operations.iter().filter_map(|op| op.name) {
        if !names.insert(name) {
            validator
                .errors
                .push(format!("There can be only one operation named \"{name}\"."));
        }
    }

    for op in &operations {
        validator.check_operation(op);
    }
    for &fragment in &fragments {
        validator.check_fragment_definition(fragment);
    }

    let mut used = HashSet::new();
    for op in &operations {
        validator.collect_spreads(op.selection_set, &mut used);
    }
    for fragment in &fragments {
        if !used.contains(fragment.name) {
            validator
                .errors
                .push(format!("Fragment \"{}\" is never used.", fragment.name));
        }
    }

    validator.errors
}

fn syntax_message(error: &ParseError) -> String {
    let text = error.to_string();
    let detail = text
        .trim_start_matches("query parse error:")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("Syntax Error: {detail}")
}

/// Normalized view over the four operation shapes
struct Operation<'d, 'a> {
    kind: OperationKind,
    name: Option<&'a str>,
    variables: &'d [VariableDefinition<'a, &'a str>],
    directives: &'d [Directive<'a, &'a str>],
    selection_set: &'d SelectionSet<'a, &'a str>,
}

impl<'d, 'a> From<&'d OperationDefinition<'a, &'a str>> for Operation<'d, 'a> {
    fn from(definition: &'d OperationDefinition<'a, &'a str>) -> Self {
        match definition {
            OperationDefinition::SelectionSet(set) => Self {
                kind: OperationKind::Query,
                name: None,
                variables: &[],
                directives: &[],
                selection_set: set,
            },
            OperationDefinition::Query(q) => Self {
                kind: OperationKind::Query,
                name: q.name,
                variables: &q.variable_definitions,
                directives: &q.directives,
                selection_set: &q.selection_set,
            },
            OperationDefinition::Mutation(m) => Self {
                kind: OperationKind::Mutation,
                name: m.name,
                variables: &m.variable_definitions,
                directives: &m.directives,
                selection_set: &m.selection_set,
            },
            OperationDefinition::Subscription(s) => Self {
                kind: OperationKind::Subscription,
                name: s.name,
                variables: &s.variable_definitions,
                directives: &s.directives,
                selection_set: &s.selection_set,
            },
        }
    }
}

struct Validator<'s, 'd, 'a> {
    schema: &'s Schema,
    fragments: HashMap<&'a str, &'d FragmentDefinition<'a, &'a str>>,
    errors: Vec<String>,
}

impl<'s, 'd, 'a> Validator<'s, 'd, 'a> {
    fn check_operation(&mut self, op: &Operation<'d, 'a>) {
        let schema = self.schema;
        let Some(root) = schema.root_type(op.kind) else {
            self.errors.push(
                match op.kind {
                    OperationKind::Query => "Schema does not define the required query root type.",
                    OperationKind::Mutation => "Schema is not configured for mutations.",
                    OperationKind::Subscription => "Schema is not configured for subscriptions.",
                }
                .to_string(),
            );
            return;
        };

        self.check_directives(op.directives);

        let mut defined = HashSet::new();
        for variable in op.variables {
            if !defined.insert(variable.name) {
                self.errors.push(format!(
                    "There can be only one variable named \"${}\".",
                    variable.name
                ));
            }
            let named = named_type(&variable.var_type);
            match schema.get_type(named) {
                None => self.errors.push(format!("Unknown type \"{named}\".")),
                Some(ty) if !ty.is_input() => self.errors.push(format!(
                    "Variable \"${}\" cannot be non-input type \"{}\".",
                    variable.name,
                    render_type(&variable.var_type)
                )),
                Some(_) => {}
            }
        }

        self.check_selection_set(&root.name, op.selection_set);

        let mut used = Vec::new();
        for directive in op.directives {
            collect_argument_variables(&directive.arguments, &mut used);
        }
        self.collect_variables(op.selection_set, &mut used, &mut HashSet::new());

        let mut reported = HashSet::new();
        for name in &used {
            if !defined.contains(name) && reported.insert(*name) {
                self.errors.push(match op.name {
                    Some(op_name) => format!(
                        "Variable \"${name}\" is not defined by operation \"{op_name}\"."
                    ),
                    None => format!("Variable \"${name}\" is not defined."),
                });
            }
        }
        for variable in op.variables {
            if !used.contains(&variable.name) {
                self.errors.push(match op.name {
                    Some(op_name) => format!(
                        "Variable \"${}\" is never used in operation \"{op_name}\".",
                        variable.name
                    ),
                    None => format!("Variable \"${}\" is never used.", variable.name),
                });
            }
        }
    }

    fn check_fragment_definition(&mut self, fragment: &'d FragmentDefinition<'a, &'a str>) {
        self.check_directives(&fragment.directives);
        let schema = self.schema;
        let TypeCondition::On(condition) = fragment.type_condition;
        match schema.get_type(condition) {
            None => self.errors.push(format!("Unknown type \"{condition}\".")),
            Some(ty) if !ty.is_composite() => self.errors.push(format!(
                "Fragment \"{}\" cannot condition on non composite type \"{condition}\".",
                fragment.name
            )),
            Some(_) => self.check_selection_set(condition, &fragment.selection_set),
        }
    }

    fn check_selection_set(&mut self, parent: &str, set: &'d SelectionSet<'a, &'a str>) {
        let schema = self.schema;
        for selection in &set.items {
            match selection {
                Selection::Field(field) => self.check_field(parent, field),
                Selection::FragmentSpread(spread) => {
                    self.check_directives(&spread.directives);
                    if !self.fragments.contains_key(spread.fragment_name) {
                        self.errors
                            .push(format!("Unknown fragment \"{}\".", spread.fragment_name));
                    }
                }
                Selection::InlineFragment(inline) => {
                    self.check_directives(&inline.directives);
                    let Some(TypeCondition::On(condition)) = inline.type_condition else {
                        self.check_selection_set(parent, &inline.selection_set);
                        continue;
                    };
                    match schema.get_type(condition) {
                        None => self.errors.push(format!("Unknown type \"{condition}\".")),
                        Some(ty) if !ty.is_composite() => self.errors.push(format!(
                            "Fragment cannot condition on non composite type \"{condition}\"."
                        )),
                        Some(_) => self.check_selection_set(condition, &inline.selection_set),
                    }
                }
            }
        }
    }

    fn check_field(&mut self, parent: &str, field: &'d Field<'a, &'a str>) {
        self.check_directives(&field.directives);
        let schema = self.schema;
        let name = field.name;
        let has_selection = !field.selection_set.items.is_empty();

        if name == "__typename" {
            if has_selection {
                self.errors.push(format!(
                    "Field \"{name}\" must not have a selection since type \"String!\" has no subfields."
                ));
            }
            return;
        }

        if parent == schema.query_type_name() && (name == "__schema" || name == "__type") {
            self.check_meta_field(field);
            return;
        }

        let Some(definition) = schema.field(parent, name) else {
            self.errors.push(format!(
                "Cannot query field \"{name}\" on type \"{parent}\"."
            ));
            return;
        };

        for (argument, _) in &field.arguments {
            if !definition.args.iter().any(|a| a.name == *argument) {
                self.errors.push(format!(
                    "Unknown argument \"{argument}\" on field \"{parent}.{name}\"."
                ));
            }
        }
        for required in definition.args.iter().filter(|a| a.is_required()) {
            if !field.arguments.iter().any(|(n, _)| *n == required.name) {
                self.errors.push(format!(
                    "Field \"{name}\" argument \"{}\" of type \"{}\" is required, but it was not provided.",
                    required.name, required.ty
                ));
            }
        }

        let Some(ty) = definition
            .ty
            .named_type()
            .and_then(|named| schema.get_type(named))
        else {
            return;
        };

        if ty.is_leaf() && has_selection {
            self.errors.push(format!(
                "Field \"{name}\" must not have a selection since type \"{}\" has no subfields.",
                definition.ty
            ));
        } else if ty.is_composite() {
            if has_selection {
                self.check_selection_set(&ty.name, &field.selection_set);
            } else {
                self.errors.push(format!(
                    "Field \"{name}\" of type \"{}\" must have a selection of subfields. Did you mean \"{name} {{ ... }}\"?",
                    definition.ty
                ));
            }
        }
    }

    /// `__schema` and `__type` on the query root
    fn check_meta_field(&mut self, field: &'d Field<'a, &'a str>) {
        let (type_name, rendered) = if field.name == "__schema" {
            ("__Schema", "__Schema!")
        } else {
            if !field.arguments.iter().any(|(n, _)| *n == "name") {
                self.errors.push(
                    "Field \"__type\" argument \"name\" of type \"String!\" is required, but it was not provided."
                        .to_string(),
                );
            }
            ("__Type", "__Type")
        };

        if field.selection_set.items.is_empty() {
            self.errors.push(format!(
                "Field \"{0}\" of type \"{rendered}\" must have a selection of subfields. Did you mean \"{0} {{ ... }}\"?",
                field.name
            ));
        } else if self.schema.has_type(type_name) {
            self.check_selection_set(type_name, &field.selection_set);
        }
    }

    fn check_directives(&mut self, directives: &[Directive<'a, &'a str>]) {
        for directive in directives {
            if !self.schema.has_directive(directive.name) {
                self.errors
                    .push(format!("Unknown directive \"@{}\".", directive.name));
            }
        }
    }

    fn collect_spreads(&self, set: &'d SelectionSet<'a, &'a str>, used: &mut HashSet<&'a str>) {
        for selection in &set.items {
            match selection {
                Selection::Field(field) => self.collect_spreads(&field.selection_set, used),
                Selection::InlineFragment(inline) => {
                    self.collect_spreads(&inline.selection_set, used);
                }
                Selection::FragmentSpread(spread) => {
                    if used.insert(spread.fragment_name)
                        && let Some(&fragment) = self.fragments.get(spread.fragment_name)
                    {
                        self.collect_spreads(&fragment.selection_set, used);
                    }
                }
            }
        }
    }

    fn collect_variables(
        &self,
        set: &'d SelectionSet<'a, &'a str>,
        used: &mut Vec<&'a str>,
        visited: &mut HashSet<&'a str>,
    ) {
        for selection in &set.items {
            match selection {
                Selection::Field(field) => {
                    collect_argument_variables(&field.arguments, used);
                    for directive in &field.directives {
                        collect_argument_variables(&directive.arguments, used);
                    }
                    self.collect_variables(&field.selection_set, used, visited);
                }
                Selection::InlineFragment(inline) => {
                    for directive in &inline.directives {
                        collect_argument_variables(&directive.arguments, used);
                    }
                    self.collect_variables(&inline.selection_set, used, visited);
                }
                Selection::FragmentSpread(spread) => {
                    for directive in &spread.directives {
                        collect_argument_variables(&directive.arguments, used);
                    }
                    if visited.insert(spread.fragment_name)
                        && let Some(&fragment) = self.fragments.get(spread.fragment_name)
                    {
                        for directive in &fragment.directives {
                            collect_argument_variables(&directive.arguments, used);
                        }
                        self.collect_variables(&fragment.selection_set, used, visited);
                    }
                }
            }
        }
    }
}

fn collect_argument_variables<'a>(
    arguments: &[(&'a str, Value<'a, &'a str>)],
    used: &mut Vec<&'a str>,
) {
    for (_, value) in arguments {
        collect_value_variables(value, used);
    }
}

fn collect_value_variables<'a>(value: &Value<'a, &'a str>, used: &mut Vec<&'a str>) {
    match value {
        Value::Variable(name) => used.push(*name),
        Value::List(items) => {
            for item in items {
                collect_value_variables(item, used);
            }
        }
        Value::Object(fields) => {
            for item in fields.values() {
                collect_value_variables(item, used);
            }
        }
        _ => {}
    }
}

fn named_type<'a>(ty: &Type<'a, &'a str>) -> &'a str {
    match ty {
        Type::NamedType(name) => *name,
        Type::ListType(inner) | Type::NonNullType(inner) => named_type(inner),
    }
}

fn render_type<'a>(ty: &Type<'a, &'a str>) -> String {
    match ty {
        Type::NamedType(name) => (*name).to_string(),
        Type::ListType(inner) => format!("[{}]", render_type(inner)),
        Type::NonNullType(inner) => format!("{}!", render_type(inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection::parse_introspection;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn non_null(kind: &str, name: &str) -> serde_json::Value {
        json!({ "kind": "NON_NULL", "ofType": { "kind": kind, "name": name } })
    }

    fn schema() -> Schema {
        let payload = json!({
            "__schema": {
                "queryType": { "name": "Query" },
                "types": [
                    {
                        "kind": "OBJECT",
                        "name": "Query",
                        "fields": [
                            {
                                "name": "tokens",
                                "args": [
                                    { "name": "first", "type": { "kind": "SCALAR", "name": "Int" }, "defaultValue": "100" },
                                    { "name": "orderDirection", "type": { "kind": "ENUM", "name": "OrderDirection" } }
                                ],
                                "type": { "kind": "NON_NULL", "ofType": { "kind": "LIST", "ofType": non_null("OBJECT", "Token") } }
                            },
                            {
                                "name": "token",
                                "args": [{ "name": "id", "type": non_null("SCALAR", "ID") }],
                                "type": { "kind": "OBJECT", "name": "Token" }
                            }
                        ]
                    },
                    {
                        "kind": "OBJECT",
                        "name": "Token",
                        "fields": [
                            { "name": "id", "args": [], "type": non_null("SCALAR", "ID") },
                            { "name": "symbol", "args": [], "type": non_null("SCALAR", "String") }
                        ]
                    },
                    { "kind": "ENUM", "name": "OrderDirection", "enumValues": [{ "name": "asc" }, { "name": "desc" }] },
                    { "kind": "SCALAR", "name": "ID" },
                    { "kind": "SCALAR", "name": "Int" },
                    { "kind": "SCALAR", "name": "String" }
                ]
            }
        });
        Schema::from_introspection(parse_introspection(&payload).unwrap()).unwrap()
    }

    #[test]
    fn test_valid_query_has_no_errors() {
        let errors = validate_query(
            &schema(),
            "query Top($n: Int) { tokens(first: $n, orderDirection: desc) { id symbol __typename } }",
        );
        assert_eq!(errors, Vec::<String>::new());
    }

    #[test]
    fn test_syntax_error_is_single_message() {
        let errors = validate_query(&schema(), "{ malformed");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Syntax Error:"), "{}", errors[0]);
        assert!(check_syntax("{ malformed").is_err());
        assert!(check_syntax("{ tokens { id } }").is_ok());
    }

    #[test]
    fn test_unknown_field_and_argument() {
        let errors = validate_query(&schema(), "{ tokens(limit: 5) { id name } }");
        assert_eq!(
            errors,
            vec![
                "Unknown argument \"limit\" on field \"Query.tokens\".".to_string(),
                "Cannot query field \"name\" on type \"Token\".".to_string(),
            ]
        );
    }

    #[test]
    fn test_required_argument_missing() {
        let errors = validate_query(&schema(), "{ token { id } }");
        assert_eq!(
            errors,
            vec![
                "Field \"token\" argument \"id\" of type \"ID!\" is required, but it was not provided."
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_leaf_and_composite_selections() {
        let errors = validate_query(&schema(), "{ tokens { id { x } } token(id: \"1\") }");
        assert_eq!(
            errors,
            vec![
                "Field \"id\" must not have a selection since type \"ID!\" has no subfields."
                    .to_string(),
                "Field \"token\" of type \"Token\" must have a selection of subfields. Did you mean \"token { ... }\"?"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_fragments() {
        let errors = validate_query(
            &schema(),
            "{ tokens { ...Known ...Missing ... on Nope { id } } }
             fragment Known on Token { symbol }
             fragment Orphan on Token { id }
             fragment Leafy on String { length }",
        );
        assert_eq!(
            errors,
            vec![
                "Unknown fragment \"Missing\".".to_string(),
                "Unknown type \"Nope\".".to_string(),
                "Fragment \"Leafy\" cannot condition on non composite type \"String\".".to_string(),
                "Fragment \"Orphan\" is never used.".to_string(),
                "Fragment \"Leafy\" is never used.".to_string(),
            ]
        );
    }

    #[test]
    fn test_variables() {
        let errors = validate_query(
            &schema(),
            "query Q($unused: Int, $t: Token) { token(id: $id) { id } }",
        );
        assert_eq!(
            errors,
            vec![
                "Variable \"$t\" cannot be non-input type \"Token\".".to_string(),
                "Variable \"$id\" is not defined by operation \"Q\".".to_string(),
                "Variable \"$unused\" is never used in operation \"Q\".".to_string(),
                "Variable \"$t\" is never used in operation \"Q\".".to_string(),
            ]
        );
    }

    #[test]
    fn test_variables_used_through_fragments() {
        let errors = validate_query(
            &schema(),
            "query Q($id: ID!) { ...Lookup } fragment Lookup on Query { token(id: $id) { id } }",
        );
        assert_eq!(errors, Vec::<String>::new());
    }

    #[test]
    fn test_operations_and_directives() {
        let errors = validate_query(
            &schema(),
            "query A { tokens { id @skip(if: true) } } query A { tokens { id @live } } { tokens { id } } mutation M { x }",
        );
        assert_eq!(
            errors,
            vec![
                "This anonymous operation must be the only defined operation.".to_string(),
                "There can be only one operation named \"A\".".to_string(),
                "Unknown directive \"@live\".".to_string(),
                "Schema is not configured for mutations.".to_string(),
            ]
        );
    }

    #[test]
    fn test_meta_fields() {
        let errors = validate_query(&schema(), "{ __schema { queryType { name } } __type { name } }");
        assert_eq!(
            errors,
            vec![
                "Field \"__type\" argument \"name\" of type \"String!\" is required, but it was not provided."
                    .to_string()
            ]
        );
    }
}
