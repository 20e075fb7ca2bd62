//! Input coercion shared by all filters.
//!
//! Template data is loosely typed: a missing attribute is undefined, an empty
//! XML element arrives as `""`, and a repeated element may be a single value
//! or a list. These helpers give every filter the same view of blank input.

use minijinja::value::ValueKind;
use minijinja::{Error, ErrorKind, Value};

/// True for undefined, none, and strings that are empty after trimming.
pub fn is_blank(value: &Value) -> bool {
    value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(|s| s.trim().is_empty())
}

/// Coerces a filter argument to a string, using `default` when it is blank.
pub fn str_arg(value: &Value, default: &str) -> String {
    if is_blank(value) {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// [`str_arg`] for an optional trailing argument.
pub fn opt_str_arg(value: Option<&Value>, default: &str) -> String {
    value.map_or_else(|| default.to_string(), |v| str_arg(v, default))
}

/// Flattens nested sequences depth-first. Strings and maps are leaves.
pub fn flatten(values: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        flatten_into(value, &mut out);
    }
    out
}

fn flatten_into(value: &Value, out: &mut Vec<Value>) {
    if is_sequence(value) {
        if let Ok(items) = value.try_iter() {
            for item in items {
                flatten_into(&item, out);
            }
            return;
        }
    }
    out.push(value.clone());
}

fn is_sequence(value: &Value) -> bool {
    matches!(value.kind(), ValueKind::Seq | ValueKind::Iterable)
}

/// Normalizes a value to a list: blank gives `[]`, a sequence gives its items,
/// and anything else is wrapped.
pub fn to_list_or_empty(value: &Value) -> Vec<Value> {
    if is_blank(value) {
        return Vec::new();
    }
    if is_sequence(value) {
        if let Ok(items) = value.try_iter() {
            return items.collect();
        }
    }
    vec![value.clone()]
}

/// Fails with `InvalidOperation` unless `value` is a map.
pub fn expect_mapping(value: &Value) -> Result<(), Error> {
    if value.kind() == ValueKind::Map {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("expected a mapping, found {}", value.kind()),
        ))
    }
}
