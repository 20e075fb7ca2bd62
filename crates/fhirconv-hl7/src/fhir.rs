//! Post-processing of rendered FHIR JSON.
//!
//! Templates emit JSON text that is structurally loose: optional elements
//! render as empty strings or empty objects, batch-rendered lists may carry a
//! trailing comma, and the same resource may be emitted by several sections.
//! [`parse_fhir`] turns that text into a clean FHIR value.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::value::is_empty;

/// Builds the identity key of a bundle entry.
///
/// The key joins the resource's `resourceType`, `meta.versionId` and `id`
/// with `_`, skipping parts that are missing or empty. An entry without any
/// of them yields `""`.
pub fn get_fhir_entry_key(entry: &Value) -> String {
    let Some(resource) = entry.get("resource") else {
        return String::new();
    };
    let part = |pointer: &str| {
        resource
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    [part("/resourceType"), part("/meta/versionId"), part("/id")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("_")
}

/// Parses rendered FHIR text.
///
/// Trailing commas are tolerated, empty values are removed recursively, and
/// bundle entries sharing a key (see [`get_fhir_entry_key`]) are deep-merged
/// into the first occurrence.
///
/// # Errors
///
/// Returns [`crate::Hl7Error::InvalidFhir`] when the text is not JSON even
/// after trailing commas are removed.
pub fn parse_fhir(text: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(&strip_trailing_commas(text))?;
    let mut fhir = remove_empty(value).unwrap_or_else(|| Value::Object(Map::new()));
    if let Some(entries) = fhir.get_mut("entry").and_then(Value::as_array_mut) {
        let merged = merge_entries(std::mem::take(entries));
        *entries = merged;
    }
    Ok(fhir)
}

/// Removes commas that directly precede a closing `]` or `}`.
///
/// Commas inside string literals are left alone.
pub fn strip_trailing_commas(text: &str) -> Cow<'_, str> {
    if !text.contains(',') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = text[idx + 1..].trim_start().chars().next();
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn remove_empty(value: Value) -> Option<Value> {
    let cleaned = match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter_map(|(k, v)| remove_empty(v).map(|v| (k, v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().filter_map(remove_empty).collect()),
        other => other,
    };
    let drop = match &cleaned {
        Value::String(s) => s.is_empty(),
        other => is_empty(other),
    };
    if drop {
        None
    } else {
        Some(cleaned)
    }
}

fn merge_entries(entries: Vec<Value>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::with_capacity(entries.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = get_fhir_entry_key(&entry);
        if key.is_empty() {
            merged.push(entry);
            continue;
        }
        match positions.get(&key) {
            Some(&pos) => {
                tracing::trace!(key = %key, "merging duplicate bundle entry");
                deep_merge(&mut merged[pos], entry);
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(entry);
            }
        }
    }
    merged
}

fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                let nested = value.is_object() && target.get(&key).is_some_and(Value::is_object);
                match target.get_mut(&key) {
                    Some(existing) if nested => deep_merge(existing, value),
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
