use std::collections::BTreeMap;

use serde_json::{Value as JsonValue, json};

use crate::error::Error;

use super::resolver::ContextResolver;

/// Remote context chains longer than this are treated as invalid; a
/// dereference loop must never stall a client request.
const MAX_REMOTE_CONTEXTS: usize = 8;

/// Active context assembled from a document's `@context` entries, local and
/// remote. Term definitions map short names to IRIs or keyword aliases; an
/// empty definition means the term is explicitly decoupled and its entries
/// are dropped during expansion.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ActiveContext {
    pub(crate) language: Option<String>,
    pub(crate) vocab: Option<String>,
    term_map: BTreeMap<String, String>,
}

impl ActiveContext {
    pub(crate) fn insert(&mut self, term: &str, definition: String) {
        self.term_map.insert(term.to_owned(), definition);
    }
    pub(crate) fn has_term(&self, term: &str) -> bool {
        self.term_map.contains_key(term)
    }
    pub(crate) fn get_term(&self, term: &str) -> Option<&String> {
        self.term_map.get(term)
    }

    /// Expand a node key to an IRI or keyword. `None` means the key has no
    /// mapping and is dropped from expanded output.
    pub(crate) fn expand_key(&self, key: &str) -> Option<String> {
        if value_is_keyword(key) {
            return Some(key.to_owned());
        }
        match self.term_map.get(key) {
            Some(definition) if definition.is_empty() => return None,
            Some(definition) => return Some(definition.clone()),
            None => {}
        }
        if let Some((prefix, suffix)) = key.split_once(':') {
            if suffix.starts_with("//") {
                return Some(key.to_owned());
            }
            if let Some(prefix_iri) = self.term_map.get(prefix) {
                return Some(format!("{prefix_iri}{suffix}"));
            }
            return Some(key.to_owned());
        }
        self.vocab.as_ref().map(|vocab| format!("{vocab}{key}"))
    }

    /// Expand an `@id` or `@type` string value.
    pub(crate) fn expand_iri(&self, value: &str) -> String {
        if value_is_keyword(value) {
            return value.to_owned();
        }
        if let Some(definition) = self.term_map.get(value) {
            if !definition.is_empty() {
                return definition.clone();
            }
        }
        if let Some((prefix, suffix)) = value.split_once(':') {
            if !suffix.starts_with("//") {
                if let Some(prefix_iri) = self.term_map.get(prefix) {
                    return format!("{prefix_iri}{suffix}");
                }
            }
        }
        value.to_owned()
    }

    /// IRI to preferred term: shortest wins, ties break lexicographically.
    pub(crate) fn inverse(&self) -> BTreeMap<String, String> {
        let mut inverse: BTreeMap<String, String> = BTreeMap::new();
        for (term, iri) in &self.term_map {
            if iri.is_empty() {
                continue;
            }
            match inverse.get(iri) {
                Some(existing) if existing.len() <= term.len() => {}
                _ => {
                    inverse.insert(iri.clone(), term.clone());
                }
            }
        }
        inverse
    }

    /// Compact an IRI back to a term, a vocab-relative name, a prefixed
    /// name, or itself when nothing shorter applies.
    pub(crate) fn compact_iri(&self, inverse: &BTreeMap<String, String>, iri: &str) -> String {
        if let Some(term) = inverse.get(iri) {
            return term.clone();
        }
        if let Some(vocab) = &self.vocab {
            if let Some(rest) = iri.strip_prefix(vocab.as_str()) {
                if !rest.is_empty() {
                    return rest.to_owned();
                }
            }
        }
        let mut best: Option<(usize, String)> = None;
        for (term, prefix_iri) in &self.term_map {
            if prefix_iri.is_empty() || prefix_iri.starts_with('@') {
                continue;
            }
            if let Some(rest) = iri.strip_prefix(prefix_iri.as_str()) {
                if rest.is_empty() {
                    continue;
                }
                if best.as_ref().is_none_or(|(len, _)| prefix_iri.len() > *len) {
                    best = Some((prefix_iri.len(), format!("{term}:{rest}")));
                }
            }
        }
        match best {
            Some((_, compacted)) => compacted,
            None => iri.to_owned(),
        }
    }
}

/// Build an active context from a document's `@context` value using the
/// algorithm defined in https://www.w3.org/TR/json-ld11-api/#algorithm.
///
/// Note - processing implements just enough to create term definitions from
/// the documents clients actually keep here. Remote contexts are fetched
/// through the resolver and their own `@context` merged recursively, with a
/// chain bound instead of full cycle bookkeeping.
pub(crate) async fn active_context(
    resolver: &ContextResolver,
    context_def: &JsonValue,
) -> Result<ActiveContext, Error> {
    let mut result = ActiveContext::default();
    let mut remote_chain = vec![];
    process_context(resolver, &mut result, context_def, &mut remote_chain).await?;
    Ok(result)
}

async fn process_context(
    resolver: &ContextResolver,
    result: &mut ActiveContext,
    context_def: &JsonValue,
    remote_chain: &mut Vec<String>,
) -> Result<(), Error> {
    // 4.1.2.4 Normalize context to an array
    let contexts = if context_def.is_array() {
        context_def.as_array().unwrap().to_owned()
    } else {
        vec![context_def.to_owned()]
    };

    for context in &contexts {
        match context {
            // 4.1.2.5.1 override
            JsonValue::Null => {
                *result = ActiveContext::default();
            }
            // 4.1.2.5.2 remote context
            JsonValue::String(url) => {
                if remote_chain.iter().any(|seen| seen == url)
                    || remote_chain.len() >= MAX_REMOTE_CONTEXTS
                {
                    return Err(Error::InvalidContext { url: url.clone() });
                }
                let body = resolver.resolve(url).await?;
                let Some(nested) = body.get("@context").cloned() else {
                    return Err(Error::InvalidContext { url: url.clone() });
                };
                remote_chain.push(url.clone());
                Box::pin(process_context(resolver, result, &nested, remote_chain)).await?;
                remote_chain.pop();
            }
            // 4.1.2.5.4
            JsonValue::Object(_) => {
                process_context_definition(context, result)?;
            }
            // 4.1.2.5.3
            _ => {
                return Err(Error::malformed(
                    "invalid local context (not null, string, or map)",
                ));
            }
        }
    }

    Ok(())
}

fn process_context_definition(context: &JsonValue, result: &mut ActiveContext) -> Result<(), Error> {
    let mut defined = BTreeMap::new();

    // 4.1.2.5.5
    match context.get("@version") {
        Some(JsonValue::Number(number)) => {
            if number.as_f64().unwrap_or_default() != 1.1 {
                return Err(Error::malformed(format!("invalid @version value {number}")));
            }
        }
        Some(value) => {
            return Err(Error::malformed(format!("invalid @version value {value}")));
        }
        None => {}
    }
    // skip @import

    // skip @base

    // 4.1.2.5.8
    match context.get("@vocab") {
        Some(JsonValue::Null) => {
            result.vocab = None;
        }
        Some(JsonValue::String(value)) => {
            result.vocab = Some(iri_expand(result, value, context, &mut defined)?);
        }
        Some(value) => {
            return Err(Error::malformed(format!(
                "invalid vocabulary mapping {value}"
            )));
        }
        None => {}
    }
    // 4.1.2.5.9
    match context.get("@language") {
        Some(JsonValue::Null) => {
            result.language = None;
        }
        Some(JsonValue::String(lang)) => {
            result.language = Some(lang.to_owned());
        }
        Some(value) => {
            return Err(Error::malformed(format!("invalid default language {value}")));
        }
        None => {}
    }
    // skip @direction

    // skip @propagate

    // 4.1.2.5.13
    for (key, value) in context.as_object().unwrap().iter() {
        if [
            "@base",
            "@direction",
            "@import",
            "@language",
            "@propagate",
            "@protected",
            "@version",
            "@vocab",
        ]
        .contains(&key.as_str())
        {
            continue;
        }
        create_term_definition(result, context, key, value, &mut defined)?;
    }

    Ok(())
}

fn create_term_definition(
    result: &mut ActiveContext,
    context: &JsonValue,
    term: &str,
    value: &JsonValue,
    defined: &mut BTreeMap<String, bool>,
) -> Result<(), Error> {
    // 4.2.2.1
    match defined.get(term) {
        Some(true) => return Ok(()),
        Some(false) => return Err(Error::malformed("cyclic IRI mapping found")),
        _ => {}
    }
    // 4.2.2.2
    if term.is_empty() {
        return Err(Error::malformed("invalid term definition (empty string)"));
    }
    defined.insert(term.to_owned(), false);

    // skip @type rule - use json-ld-1.0 processing mode

    // 4.2.2.5
    if term.starts_with('@') && term.is_ascii() {
        return Err(Error::malformed("keyword redefinition error"));
    }
    // 4.2.2.6
    let _previous_definition = result.term_map.remove(term);

    let value = match value {
        // 4.2.2.7
        JsonValue::Null => json!({ "@id": null }),
        // 4.2.2.8
        JsonValue::String(string) => json!({ "@id": string }),
        // 4.2.2.9
        JsonValue::Object(_) => value.clone(),
        _ => return Err(Error::malformed("invalid term definition error")),
    };

    let mut definition = String::new();

    // skipping @protected processing
    // skipping @type processing
    // skipping @reverse processing

    match value.get("@id") {
        // 4.2.2.14.1
        Some(JsonValue::Null) => {}
        Some(JsonValue::String(id)) => {
            // 4.2.2.14.2.2
            if id.starts_with('@') && !value_is_keyword(id) {
                return Err(Error::malformed("invalid keyword alias"));
            }
            // 4.2.2.14.2.3
            definition = iri_expand(result, id, context, defined)?;
            if definition == "@context" {
                return Err(Error::malformed(
                    "invalid keyword alias error (@context cannot be aliased)",
                ));
            }
            // 4.2.2.14.2.4
            if term.contains(':') || term.contains('/') {
                // 4.2.2.14.2.4.1
                defined.insert(term.to_owned(), true);
                // 4.2.2.14.2.4.2
                if definition != iri_expand(result, term, context, defined)? {
                    return Err(Error::malformed("invalid IRI mapping (term mismatch)"));
                }
            }
        }
        // 4.2.2.14.2.1
        Some(_) => {
            return Err(Error::malformed(
                "invalid IRI mapping error (entry is not a string)",
            ));
        }
        None => {
            // 4.2.2.15
            if term.contains(':') {
                if !term.contains("://") {
                    let (term_prefix, suffix) = term.split_once(':').unwrap();
                    // 4.2.2.15.1
                    if let Some(prefix_value) = context.get(term_prefix) {
                        create_term_definition(result, context, term_prefix, prefix_value, defined)?;
                    }
                    // 4.2.2.15.2
                    if let Some(prefix_iri) = result.get_term(term_prefix) {
                        definition = format!("{prefix_iri}{suffix}");
                    // 4.2.2.15.3
                    } else {
                        definition = term.to_owned();
                    }
                } else {
                    definition = term.to_owned();
                }
            // 4.2.2.16
            } else if term.contains('/') {
                definition = iri_expand(result, term, context, defined)?;
            // 4.2.2.17
            } else if term == "@type" {
                definition = "@type".to_owned();
            // 4.2.2.18
            } else if let Some(vocab) = &result.vocab {
                definition = format!("{vocab}{term}");
            }
        }
    }

    // skip @container
    // skip @index
    // skip @context
    // skip @language
    // skip @direction
    // skip @nest

    // 4.2.2.25
    match value.get("@prefix") {
        Some(JsonValue::Bool(_)) => {}
        Some(_) => {
            return Err(Error::malformed("invalid @prefix value"));
        }
        None => {}
    }

    for entry in value.as_object().unwrap().keys() {
        if ![
            "@id",
            "@reverse",
            "@container",
            "@context",
            "@direction",
            "@index",
            "@language",
            "@nest",
            "@prefix",
            "@protected",
            "@type",
        ]
        .contains(&entry.as_str())
        {
            return Err(Error::malformed(
                "invalid term definition (unknown keyword)",
            ));
        }
    }

    result.insert(term, definition);
    defined.insert(term.to_owned(), true);

    Ok(())
}

fn iri_expand(
    active_context: &mut ActiveContext,
    value: &str,
    local_context: &JsonValue,
    defined: &mut BTreeMap<String, bool>,
) -> Result<String, Error> {
    // 5.2.2.1
    if value_is_keyword(value) {
        return Ok(value.to_owned());
    }
    // 5.2.2.3
    if let Some(entry_value) = local_context.get(value) {
        if defined.get(value).is_none() {
            create_term_definition(active_context, local_context, value, entry_value, defined)?;
        }
    }
    // 5.2.2.4 / 5.2.2.5
    if let Some(definition) = active_context.get_term(value) {
        return Ok(definition.clone());
    }
    if value.contains(':') {
        // 5.2.2.6.1
        let (prefix, suffix) = value.split_once(':').unwrap();
        if suffix.starts_with("//") {
            // 5.2.2.6.2
            return Ok(value.to_owned());
        }
        // 5.2.2.6.3
        if let Some(prefix_value) = local_context.get(prefix) {
            if !matches!(defined.get(prefix), Some(true)) {
                create_term_definition(
                    active_context,
                    local_context,
                    prefix,
                    prefix_value,
                    defined,
                )?;
            }
        }
        // 5.2.2.6.4
        if let Some(prefix_iri) = active_context.get_term(prefix) {
            return Ok(format!("{prefix_iri}{suffix}"));
        }
        // 5.2.2.6.5 - assume IRI form
        return Ok(value.to_owned());
    }
    // 5.2.2.7 - assume vocab is true
    if let Some(vocab) = &active_context.vocab {
        return Ok(format!("{vocab}{value}"));
    }
    // skip document relative

    Ok(value.to_owned())
}

pub(super) fn value_is_keyword(value: &str) -> bool {
    [
        "@base",
        "@container",
        "@context",
        "@direction",
        "@graph",
        "@id",
        "@import",
        "@include",
        "@index",
        "@json",
        "@language",
        "@list",
        "@nest",
        "@none",
        "@prefix",
        "@propagate",
        "@protected",
        "@reverse",
        "@set",
        "@type",
        "@value",
        "@version",
        "@vocab",
    ]
    .contains(&value)
}
