//! JSON-LD compaction: shorten expanded documents against a target context.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::Error;

use super::context::ActiveContext;

/// Compact an expanded document against `context`. The caller's original
/// `@context` value is re-attached to the result verbatim.
pub(super) fn compact(
    expanded: &Value,
    context: &ActiveContext,
    context_value: &Value,
) -> Result<Value, Error> {
    let inverse = context.inverse();
    let nodes = match expanded {
        Value::Array(items) => items.clone(),
        Value::Object(_) => vec![expanded.clone()],
        _ => {
            return Err(Error::malformed(
                "only expanded node objects can be compacted",
            ));
        }
    };
    let mut compacted = vec![];
    for node in &nodes {
        compacted.push(compact_node(node, context, &inverse)?);
    }

    let mut result = Map::new();
    result.insert("@context".to_owned(), context_value.clone());
    if compacted.len() == 1 {
        result.extend(compacted.remove(0));
    } else {
        result.insert(
            "@graph".to_owned(),
            Value::Array(compacted.into_iter().map(Value::Object).collect()),
        );
    }
    Ok(Value::Object(result))
}

pub(super) fn compact_node(
    node: &Value,
    context: &ActiveContext,
    inverse: &BTreeMap<String, String>,
) -> Result<Map<String, Value>, Error> {
    let map = node
        .as_object()
        .ok_or_else(|| Error::malformed("expanded node must be a JSON object"))?;
    let mut result = Map::new();
    for (key, value) in map {
        match key.as_str() {
            "@id" => {
                let iri = value
                    .as_str()
                    .ok_or_else(|| Error::malformed("@id must be a string"))?;
                result.insert("@id".to_owned(), Value::String(context.compact_iri(inverse, iri)));
            }
            "@type" => {
                result.insert("@type".to_owned(), compact_types(value, context, inverse)?);
            }
            _ if key.starts_with('@') => {
                result.insert(key.clone(), value.clone());
            }
            iri => {
                let term = context.compact_iri(inverse, iri);
                result.insert(term, compact_values(value, context, inverse)?);
            }
        }
    }
    Ok(result)
}

fn compact_types(
    value: &Value,
    context: &ActiveContext,
    inverse: &BTreeMap<String, String>,
) -> Result<Value, Error> {
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
    let mut compacted: Vec<Value> = types
        .iter()
        .map(|ty| Value::String(context.compact_iri(inverse, ty)))
        .collect();
    if compacted.len() == 1 {
        return Ok(compacted.remove(0));
    }
    Ok(Value::Array(compacted))
}

fn compact_values(
    value: &Value,
    context: &ActiveContext,
    inverse: &BTreeMap<String, String>,
) -> Result<Value, Error> {
    let Value::Array(items) = value else {
        return compact_value_entry(value, context, inverse);
    };
    let mut compacted = vec![];
    for item in items {
        compacted.push(compact_value_entry(item, context, inverse)?);
    }
    if compacted.len() == 1 {
        return Ok(compacted.remove(0));
    }
    Ok(Value::Array(compacted))
}

fn compact_value_entry(
    value: &Value,
    context: &ActiveContext,
    inverse: &BTreeMap<String, String>,
) -> Result<Value, Error> {
    match value {
        Value::Object(map) => {
            // a bare value object collapses back to its scalar
            if map.len() == 1 && map.contains_key("@value") {
                return Ok(map["@value"].clone());
            }
            compact_node(value, context, inverse).map(Value::Object)
        }
        other => Ok(other.clone()),
    }
}
