//! JSON conversion for decoded values.
//!
//! This module provides conversion from [`Value`] to JSON using serde_json.
//! Enable the `serde` feature to use this module.

use serde_json::{json, Map, Value as JsonValue};

use crate::types::{PropertyName, Value, Visibility};

/// Convert a decoded value to a JSON value.
///
/// # Mapping Rules
///
/// | PHP Type | JSON Type |
/// |----------|-----------|
/// | `null` | `null` |
/// | `bool` | `boolean` |
/// | `int` | `number` |
/// | `float` | `number` (`null` for NaN, `"Infinity"`/`"-Infinity"`) |
/// | `string` | `string` (lossy UTF-8 conversion) |
/// | `array` (keys `0..n` in order) | `array` |
/// | `array` (otherwise) | `object` |
/// | `object` | `object` with `__class__` field |
/// | custom object | `{"__class__": ..., "__data": ...}` |
/// | `reference` | `{"__ref__": index, "__kind__": "value" or "alias"}` |
///
/// References are emitted as-is; call [`Value::resolve_references`] first
/// to inline them.
///
/// # Example
///
/// ```rust
/// use php_unserialize_core::{from_bytes, to_json};
///
/// let data = br#"a:2:{s:4:"name";s:5:"Alice";s:3:"age";i:30;}"#;
/// let value = from_bytes(data).unwrap();
/// let json = to_json(&value);
/// assert_eq!(json, serde_json::json!({"name": "Alice", "age": 30}));
/// ```
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => json!(*i),
        Value::Float(f) => {
            if f.is_nan() {
                JsonValue::Null
            } else if f.is_infinite() {
                if f.is_sign_positive() {
                    json!("Infinity")
                } else {
                    json!("-Infinity")
                }
            } else {
                json!(*f)
            }
        }
        Value::String(s) => JsonValue::String(String::from_utf8_lossy(s).into_owned()),
        Value::Array(items) => {
            let is_indexed = items
                .iter()
                .enumerate()
                .all(|(i, (k, _))| matches!(k, Value::Int(idx) if *idx as usize == i));

            if is_indexed {
                JsonValue::Array(items.iter().map(|(_, v)| to_json(v)).collect())
            } else {
                let mut map = Map::new();
                for (k, v) in items {
                    if let Some(key) = json_key(k) {
                        map.insert(key, to_json(v));
                    }
                }
                JsonValue::Object(map)
            }
        }
        Value::Object {
            class_name,
            properties,
        } => {
            let mut map = Map::new();
            map.insert(
                "__class__".to_string(),
                json!(String::from_utf8_lossy(class_name)),
            );

            for (k, v) in properties {
                let key = match k {
                    Value::String(raw) => property_key(PropertyName::parse(raw)),
                    other => match json_key(other) {
                        Some(key) => key,
                        None => continue,
                    },
                };
                map.insert(key, to_json(v));
            }

            JsonValue::Object(map)
        }
        Value::CustomObject {
            class_name,
            payload,
        } => json!({
            "__class__": String::from_utf8_lossy(class_name),
            "__data": String::from_utf8_lossy(payload),
        }),
        Value::Reference { index, kind } => json!({ "__ref__": index, "__kind__": kind }),
    }
}

fn json_key(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(String::from_utf8_lossy(s).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

fn property_key(prop: PropertyName<'_>) -> String {
    let name = String::from_utf8_lossy(prop.name);
    match prop.visibility {
        Visibility::Private => match prop.declaring_class {
            Some(class) => format!("{}::{}", String::from_utf8_lossy(class), name),
            None => name.into_owned(),
        },
        Visibility::Protected => format!("*{}", name),
        Visibility::Public => name.into_owned(),
    }
}

/// Convert a decoded value to a JSON string.
///
/// # Example
///
/// ```rust
/// use php_unserialize_core::{from_bytes, json::to_json_string};
///
/// let data = br#"a:2:{s:4:"name";s:5:"Alice";s:3:"age";i:30;}"#;
/// let value = from_bytes(data).unwrap();
/// let json_str = to_json_string(&value).unwrap();
/// // JSON key order is not guaranteed, so check contents
/// assert!(json_str.contains(r#""name":"Alice""#));
/// assert!(json_str.contains(r#""age":30"#));
/// ```
pub fn to_json_string(value: &Value) -> serde_json::Result<String> {
    let json = to_json(value);
    serde_json::to_string(&json)
}

/// Convert a decoded value to a pretty-printed JSON string.
pub fn to_json_string_pretty(value: &Value) -> serde_json::Result<String> {
    let json = to_json(value);
    serde_json::to_string_pretty(&json)
}

#[cfg(test)]
#[allow(clippy::approx_constant)]
mod tests {
    use super::*;
    use crate::from_bytes;

    #[test]
    fn test_simple_types() {
        assert_eq!(to_json(&Value::Null), JsonValue::Null);
        assert_eq!(to_json(&Value::Bool(true)), JsonValue::Bool(true));
        assert_eq!(to_json(&Value::Int(42)), json!(42));
        assert_eq!(to_json(&Value::Float(3.14)), json!(3.14));
        assert_eq!(to_json(&Value::Float(f64::NAN)), JsonValue::Null);
    }

    #[test]
    fn test_indexed_array() {
        let value = from_bytes(b"a:2:{i:0;s:3:\"foo\";i:1;s:3:\"bar\";}").unwrap();
        assert_eq!(to_json(&value), json!(["foo", "bar"]));
    }

    #[test]
    fn test_mixed_array() {
        let value = from_bytes(b"a:2:{i:0;s:3:\"foo\";i:5;s:3:\"bar\";}").unwrap();
        assert_eq!(to_json(&value), json!({"0": "foo", "5": "bar"}));
    }

    #[test]
    fn test_object_visibility() {
        let data = b"O:4:\"Test\":3:{s:3:\"pub\";i:1;s:10:\"\x00Test\x00priv\";i:2;s:7:\"\x00*\x00prot\";i:3;}";
        let value = from_bytes(data).unwrap();
        assert_eq!(
            to_json(&value),
            json!({"__class__": "Test", "pub": 1, "Test::priv": 2, "*prot": 3})
        );
    }

    #[test]
    fn test_custom_object() {
        let value = from_bytes(b"C:4:\"Stub\":6:{ROBOTS}").unwrap();
        assert_eq!(
            to_json(&value),
            json!({"__class__": "Stub", "__data": "ROBOTS"})
        );
    }

    #[test]
    fn test_references() {
        let value = from_bytes(b"a:2:{i:0;s:1:\"v\";i:1;R:2;}").unwrap();
        assert_eq!(
            to_json(&value),
            json!(["v", {"__ref__": 2, "__kind__": "alias"}])
        );
        let value = from_bytes(b"a:2:{i:0;s:1:\"v\";i:1;r:2;}").unwrap();
        assert_eq!(
            to_json(&value),
            json!(["v", {"__ref__": 2, "__kind__": "value"}])
        );
        assert_eq!(to_json(&value.resolve_references().unwrap()), json!(["v", "v"]));
    }
}
