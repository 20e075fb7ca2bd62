//! Small predicates over document values.
//!
//! Documents produced from XML are loosely shaped: an element that appears
//! once is a mapping, an element that repeats is a list, and an element with
//! no content is an empty string. These helpers smooth over that.

use serde_json::Value;

/// Returns true for `null` and for strings that are empty after trimming.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Returns true for values that carry no content at all.
///
/// In addition to [`is_blank`] values this includes empty lists and empty
/// mappings.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        other => is_blank(other),
    }
}

/// Views a value as a list of references.
///
/// Empty values become `[]`, lists yield their items, and anything else is
/// wrapped as a single-element list.
pub fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other if is_empty(other) => Vec::new(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_values() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!("   ")));
        assert!(!is_blank(&json!("x")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!({})));
    }

    #[test]
    fn as_list_shapes() {
        assert!(as_list(&Value::Null).is_empty());
        assert!(as_list(&json!({})).is_empty());
        assert!(as_list(&json!([])).is_empty());
        assert_eq!(as_list(&json!({"a": 1})), vec![&json!({"a": 1})]);
        assert_eq!(as_list(&json!([1, 2])), vec![&json!(1), &json!(2)]);
    }
}
