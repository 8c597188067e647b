//! JSON-LD expansion: rewrite a document into fully qualified form.

use serde_json::{Map, Value, json};

use crate::error::Error;

use super::context::ActiveContext;

/// Expanded form is always an array of node objects, mirroring the output
/// shape of https://www.w3.org/TR/json-ld11-api/#expansion-algorithm.
pub(super) fn expand(content: &Value, context: &ActiveContext) -> Result<Value, Error> {
    match content {
        Value::Object(_) => Ok(Value::Array(vec![expand_node(content, context)?])),
        Value::Array(items) => {
            let mut nodes = vec![];
            for item in items {
                if item.is_null() {
                    continue;
                }
                nodes.push(expand_node(item, context)?);
            }
            Ok(Value::Array(nodes))
        }
        _ => Err(Error::malformed(
            "only objects and arrays of objects can be expanded",
        )),
    }
}

fn expand_node(node: &Value, context: &ActiveContext) -> Result<Value, Error> {
    let map = node
        .as_object()
        .ok_or_else(|| Error::malformed("node must be a JSON object"))?;
    let mut result = Map::new();
    for (key, value) in map {
        // contexts are consumed by the active context, not carried over
        if key == "@context" {
            continue;
        }
        let Some(expanded_key) = context.expand_key(key) else {
            continue;
        };
        let expanded_value = match expanded_key.as_str() {
            "@id" => match value {
                Value::String(iri) => Value::String(context.expand_iri(iri)),
                _ => return Err(Error::malformed("@id must be a string")),
            },
            "@type" => expand_types(value, context)?,
            _ if expanded_key.starts_with('@') => value.clone(),
            _ => expand_values(value, context)?,
        };
        result.insert(expanded_key, expanded_value);
    }
    Ok(Value::Object(result))
}

fn expand_types(value: &Value, context: &ActiveContext) -> Result<Value, Error> {
    let types = match value {
        Value::String(ty) => vec![ty.clone()],
        Value::Array(items) => {
            let mut types = vec![];
            for item in items {
                match item {
                    Value::String(ty) => types.push(ty.clone()),
                    _ => return Err(Error::malformed("@type entries must be strings")),
                }
            }
            types
        }
        _ => {
            return Err(Error::malformed(
                "@type must be a string or an array of strings",
            ));
        }
    };
    Ok(Value::Array(
        types
            .iter()
            .map(|ty| Value::String(context.expand_iri(ty)))
            .collect(),
    ))
}

/// Property values come out as arrays; scalars get wrapped as value objects.
fn expand_values(value: &Value, context: &ActiveContext) -> Result<Value, Error> {
    let items = match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };
    let mut expanded = vec![];
    for item in items {
        match item {
            Value::Null => continue,
            Value::Object(_) => expanded.push(expand_node(&item, context)?),
            scalar => expanded.push(json!({ "@value": scalar })),
        }
    }
    Ok(Value::Array(expanded))
}
