//! The `get_property` filter.
//!
//! Resolves a coded value to one of its properties through the code mapping
//! bound in the render context:
//!
//! ```yaml
//! ActStatus:
//!   completed: { code: final, display: Final }
//!   __default__: { code: unknown }
//! ```
//!
//! `{{ "completed" | get_property("ActStatus") }}` renders `final`; an
//! unmapped code falls back to `__default__`, then to the code itself.

use minijinja::value::ValueKind;
use minijinja::{State, Value};

use crate::context::{RenderScope, StateScope, CODE_MAPPING_VAR};

use super::args::{opt_str_arg, str_arg};

/// Entry consulted when a code has no entry of its own, or its entry lacks
/// the requested property.
pub const DEFAULT_CODE_KEY: &str = "__default__";

/// Resolves `property_name` (default `code`) of `code` in the `mapping_key`
/// namespace of the scope's code mapping.
///
/// A mapped value is returned verbatim, even when empty. Without one, `code`
/// and `display` resolve to the code itself and any other property to `""`.
pub fn get_property<S: RenderScope + ?Sized>(
    scope: &S,
    code: &Value,
    mapping_key: &Value,
    property_name: Option<&Value>,
) -> Value {
    let code = str_arg(code, "");
    let property = opt_str_arg(property_name, "code");

    let namespace = scope
        .resolve(CODE_MAPPING_VAR)
        .and_then(|mappings| lookup(&mappings, &str_arg(mapping_key, "")))
        .filter(Value::is_true);

    if let Some(namespace) = namespace {
        let entry = lookup(&namespace, &code)
            .filter(|entry| entry.is_true() && has_key(entry, &property))
            .or_else(|| lookup(&namespace, DEFAULT_CODE_KEY));
        if let Some(mapped) = entry.and_then(|entry| lookup(&entry, &property)) {
            return mapped;
        }
    }

    match property.as_str() {
        "code" | "display" => Value::from(code),
        _ => Value::from(""),
    }
}

fn lookup(map: &Value, key: &str) -> Option<Value> {
    if map.kind() != ValueKind::Map {
        return None;
    }
    map.get_attr(key)
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_none())
}

fn has_key(map: &Value, key: &str) -> bool {
    map.kind() == ValueKind::Map
        && map
            .try_iter()
            .map(|mut keys| keys.any(|k| k.as_str() == Some(key)))
            .unwrap_or(false)
}

/// Filter entry point: `{{ code | get_property("kind", "display") }}`.
pub fn get_property_filter(
    state: &State,
    code: Value,
    mapping_key: Value,
    property_name: Option<Value>,
) -> Value {
    get_property(
        &StateScope::new(state),
        &code,
        &mapping_key,
        property_name.as_ref(),
    )
}
