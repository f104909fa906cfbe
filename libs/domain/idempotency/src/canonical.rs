// [libs/domain/idempotency/src/canonical.rs]
use serde_json::{Map, Value};

/// Canonicalizes a JSON value for fingerprinting: object keys are sorted
/// recursively at every depth; array order is preserved, since array
/// position is semantically meaningful to a tool call's arguments while
/// object key order is not.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serializes the canonical form. `serde_json::Map` preserves insertion
/// order, so sorting keys before building the map is what makes this
/// deterministic regardless of the caller's original key order.
pub fn canonical_string(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).expect("canonicalized value always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_output() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_string(&a), canonical_string(&b));
    }

    #[test]
    fn nested_objects_are_sorted_at_every_depth() {
        let value = json!({"z": {"y": 1, "x": 2}, "a": 1});
        assert_eq!(canonical_string(&value), r#"{"a":1,"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn array_order_is_preserved() {
        let a = json!({"list": [3, 1, 2]});
        assert_eq!(canonical_string(&a), r#"{"list":[3,1,2]}"#);
    }
}
