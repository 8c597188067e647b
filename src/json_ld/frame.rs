//! JSON-LD framing: select nodes matching a frame and reshape them with the
//! frame's context. Matching covers `@type` and required-property frames,
//! which is as far as stored documents here go; default values and deep
//! embedding rules are not implemented.

use serde_json::{Map, Value};

use crate::error::Error;

use super::compact::compact_node;
use super::context::{ActiveContext, value_is_keyword};

pub(super) fn frame(
    expanded: &Value,
    frame_doc: &Value,
    context: &ActiveContext,
    context_value: Option<&Value>,
) -> Result<Value, Error> {
    let frame_map = frame_doc
        .as_object()
        .ok_or_else(|| Error::malformed("frame must be a JSON object"))?;
    let nodes = expanded
        .as_array()
        .ok_or_else(|| Error::malformed("only expanded node arrays can be framed"))?;

    let type_filter = frame_types(frame_map, context)?;
    let property_filter: Vec<String> = frame_map
        .keys()
        .filter(|key| !value_is_keyword(key))
        .filter_map(|key| context.expand_key(key))
        .collect();

    let inverse = context.inverse();
    let mut matched = vec![];
    for node in nodes {
        if node_matches(node, &type_filter, &property_filter) {
            matched.push(compact_node(node, context, &inverse)?);
        }
    }

    let mut result = Map::new();
    if let Some(context_value) = context_value {
        result.insert("@context".to_owned(), context_value.clone());
    }
    if matched.len() == 1 {
        result.extend(matched.remove(0));
    } else {
        result.insert(
            "@graph".to_owned(),
            Value::Array(matched.into_iter().map(Value::Object).collect()),
        );
    }
    Ok(Value::Object(result))
}

fn frame_types(frame_map: &Map<String, Value>, context: &ActiveContext) -> Result<Vec<String>, Error> {
    let types = match frame_map.get("@type") {
        None => vec![],
        Some(Value::String(ty)) => vec![ty.clone()],
        Some(Value::Array(items)) => {
            let mut types = vec![];
            for item in items {
                match item {
                    Value::String(ty) => types.push(ty.clone()),
                    _ => return Err(Error::malformed("frame @type entries must be strings")),
                }
            }
            types
        }
        Some(_) => {
            return Err(Error::malformed(
                "frame @type must be a string or an array of strings",
            ));
        }
    };
    Ok(types.iter().map(|ty| context.expand_iri(ty)).collect())
}

fn node_matches(node: &Value, types: &[String], properties: &[String]) -> bool {
    let Some(map) = node.as_object() else {
        return false;
    };
    if !types.is_empty() {
        let node_types: Vec<&str> = match map.get("@type") {
            Some(Value::String(ty)) => vec![ty.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => return false,
        };
        return types.iter().any(|ty| node_types.contains(&ty.as_str()));
    }
    if !properties.is_empty() {
        return properties.iter().all(|property| map.contains_key(property));
    }
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::json_ld::context::ActiveContext;

    use super::frame;

    fn library_context() -> (ActiveContext, serde_json::Value) {
        let mut context = ActiveContext::default();
        context.insert("Book", "https://schema.org/Book".to_owned());
        context.insert("Person", "https://schema.org/Person".to_owned());
        context.insert("title", "https://schema.org/title".to_owned());
        context.insert("author", "https://schema.org/author".to_owned());
        let value = json!({
            "Book": "https://schema.org/Book",
            "Person": "https://schema.org/Person",
            "title": "https://schema.org/title",
            "author": "https://schema.org/author"
        });
        (context, value)
    }

    fn expanded_library() -> serde_json::Value {
        json!([
            {
                "@type": ["https://schema.org/Book"],
                "https://schema.org/title": [{"@value": "Walkaway"}]
            },
            {
                "@type": ["https://schema.org/Person"],
                "https://schema.org/author": [{"@value": "Cory"}]
            }
        ])
    }

    #[test]
    fn type_frame_selects_matching_nodes() {
        let (context, context_value) = library_context();
        let frame_doc = json!({"@context": context_value, "@type": "Book"});
        let framed = frame(
            &expanded_library(),
            &frame_doc,
            &context,
            Some(&context_value),
        )
        .unwrap();
        assert_eq!(
            framed,
            json!({
                "@context": context_value,
                "@type": "Book",
                "title": "Walkaway"
            })
        );
    }

    #[test]
    fn property_frame_selects_nodes_with_the_property() {
        let (context, context_value) = library_context();
        let frame_doc = json!({"author": {}});
        let framed = frame(
            &expanded_library(),
            &frame_doc,
            &context,
            Some(&context_value),
        )
        .unwrap();
        assert_eq!(
            framed,
            json!({
                "@context": context_value,
                "@type": "Person",
                "author": "Cory"
            })
        );
    }

    #[test]
    fn no_matches_give_an_empty_graph() {
        let (context, context_value) = library_context();
        let frame_doc = json!({"@type": "Person"});
        let framed = frame(
            &json!([{"@type": ["https://schema.org/Book"]}]),
            &frame_doc,
            &context,
            Some(&context_value),
        )
        .unwrap();
        assert_eq!(
            framed,
            json!({"@context": context_value, "@graph": []})
        );
    }

    #[test]
    fn multiple_matches_land_in_a_graph() {
        let (context, context_value) = library_context();
        let frame_doc = json!({"@type": "Book"});
        let expanded = json!([
            {"@type": ["https://schema.org/Book"], "https://schema.org/title": [{"@value": "A"}]},
            {"@type": ["https://schema.org/Book"], "https://schema.org/title": [{"@value": "B"}]}
        ]);
        let framed = frame(&expanded, &frame_doc, &context, Some(&context_value)).unwrap();
        let graph = framed.get("@graph").and_then(|g| g.as_array()).unwrap();
        assert_eq!(graph.len(), 2);
    }
}
