//! Flattens a selection's descriptor tree into wire query text.

use std::collections::HashSet;

use serde_json_bytes::Value;

use crate::graphql;
use crate::graphql::Object;
use crate::select::argument::Argument;
use crate::select::field::Field;
use crate::select::field::TYPENAME;
use crate::select::field::alias_for;
use crate::select::selection::Selection;

/// The three GraphQL operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Query,
    Mutation,
    Subscription,
}

impl Operation {
    fn keyword(self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Mutation => "mutation",
            Operation::Subscription => "subscription",
        }
    }
}

/// Composes the wire request for one operation: harvests the selection's
/// descriptor list, renders each distinct alias at most once, declares
/// one variable per distinct argument hash, and returns the finished
/// [`graphql::Request`].
///
/// Composition is deterministic: for a fixed sequence of field calls the
/// produced query text is byte-identical across builds. It never touches
/// the network and cannot fail (argument encoding has already happened).
pub fn compose<R: 'static, T: 'static>(
    operation: Operation,
    operation_name: Option<&str>,
    selection: &Selection<R, T>,
) -> graphql::Request {
    let fields = dedupe(selection.fields());
    let mut variables = Vec::new();
    collect_variables(&fields, &mut variables);

    let mut query = String::from(operation.keyword());
    match operation_name {
        Some(name) => {
            query.push(' ');
            query.push_str(name);
        }
        None if !variables.is_empty() => query.push(' '),
        None => {}
    }
    if !variables.is_empty() {
        let declarations: Vec<String> = variables
            .iter()
            .map(|(hash, type_name, _)| format!("$_{hash}: {type_name}"))
            .collect();
        query.push('(');
        query.push_str(&declarations.join(", "));
        query.push(')');
    }
    query.push_str(" {\n");
    render_fields(&mut query, &fields, 1);
    query.push('}');

    let mut variable_values = Object::with_capacity(variables.len());
    for (hash, _, value) in variables {
        variable_values.insert(format!("_{hash}"), value);
    }

    graphql::Request::builder()
        .query(query)
        .and_operation_name(operation_name.map(str::to_owned))
        .variables(variable_values)
        .build()
}

/// Keeps the first occurrence of every distinct alias (and of every
/// fragment type condition), recursively. Repeated `select` calls with
/// structurally identical descriptors therefore render once.
fn dedupe(fields: Vec<Field>) -> Vec<Field> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::with_capacity(fields.len());
    for field in fields {
        let key = match &field {
            Field::Fragment { type_condition, .. } => format!("...{type_condition}"),
            Field::Typename => TYPENAME.to_owned(),
            field => match field.alias() {
                Some(alias) => alias,
                None => continue,
            },
        };
        if !seen.insert(key) {
            continue;
        }
        deduped.push(match field {
            Field::Composite {
                name,
                arguments,
                selection,
            } => Field::Composite {
                name,
                arguments,
                selection: dedupe(selection),
            },
            Field::Fragment {
                type_condition,
                selection,
            } => Field::Fragment {
                type_condition,
                selection: dedupe(selection),
            },
            field => field,
        });
    }
    deduped
}

fn collect_variables(fields: &[Field], out: &mut Vec<(String, &'static str, Value)>) {
    for field in fields {
        for argument in field.arguments() {
            if let (Some(hash), Some(value)) = (argument.hash(), argument.value()) {
                if !out.iter().any(|(seen, _, _)| *seen == hash) {
                    out.push((hash, argument.type_name(), value.clone()));
                }
            }
        }
        match field {
            Field::Composite { selection, .. } | Field::Fragment { selection, .. } => {
                collect_variables(selection, out);
            }
            Field::Leaf { .. } | Field::Typename => {}
        }
    }
}

fn render_fields(out: &mut String, fields: &[Field], depth: usize) {
    let indent = "  ".repeat(depth);
    for field in fields {
        match field {
            Field::Typename => {
                out.push_str(&indent);
                out.push_str(TYPENAME);
                out.push('\n');
            }
            Field::Leaf { name, arguments } => {
                out.push_str(&indent);
                out.push_str(&format!("{}: {name}", alias_for(name, arguments)));
                out.push_str(&render_arguments(arguments));
                out.push('\n');
            }
            Field::Composite {
                name,
                arguments,
                selection,
            } => {
                out.push_str(&indent);
                out.push_str(&format!("{}: {name}", alias_for(name, arguments)));
                out.push_str(&render_arguments(arguments));
                out.push_str(" {\n");
                render_fields(out, selection, depth + 1);
                out.push_str(&indent);
                out.push_str("}\n");
            }
            Field::Fragment {
                type_condition,
                selection,
            } => {
                out.push_str(&indent);
                out.push_str(&format!("...on {type_condition} {{\n"));
                render_fields(out, selection, depth + 1);
                out.push_str(&indent);
                out.push_str("}\n");
            }
        }
    }
}

/// Renders the argument list of one field, present arguments only, each
/// referring to its hash-keyed variable.
fn render_arguments(arguments: &[Argument]) -> String {
    let rendered: Vec<String> = arguments
        .iter()
        .filter(|argument| argument.is_present())
        .filter_map(|argument| {
            argument
                .hash()
                .map(|hash| format!("{}: $_{hash}", argument.name()))
        })
        .collect();
    if rendered.is_empty() {
        String::new()
    } else {
        format!("({})", rendered.join(", "))
    }
}
