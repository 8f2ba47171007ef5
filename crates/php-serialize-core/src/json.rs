//! JSON conversion for PHP values.
//!
//! This module provides conversion from `PhpValue` to JSON using serde_json.
//! Enable the `serde` feature to use this module.

use serde_json::{json, Map, Value as JsonValue};

use crate::types::{parse_member_name, PhpArray, PhpValue, Visibility};

/// Convert a PHP value to a JSON value.
///
/// # Mapping Rules
///
/// | PHP Type | JSON Type |
/// |----------|-----------|
/// | `null` | `null` |
/// | `bool` | `boolean` |
/// | `int` | `number` |
/// | `float` | `number` (or `null` for NaN) |
/// | `string` | `string` (lossy UTF-8 conversion) |
/// | `array` (indexed) | `array` |
/// | `array` (associative) | `object` |
/// | `object` | `object` with `__class__` field |
/// | custom-serialized object | `object` with `__class__` and `__payload__` |
/// | SPL array | `object` with `__flags__`, `__array__`, `__properties__` |
/// | `reference` | `null` (references not resolved) |
///
/// # Example
///
/// ```rust
/// use php_serialize_core::{from_bytes, to_json};
///
/// let data = br#"a:2:{s:4:"name";s:5:"Alice";s:3:"age";i:30;}"#;
/// let php_value = from_bytes(data).unwrap();
/// let json = to_json(&php_value);
/// assert_eq!(json, serde_json::json!({"name": "Alice", "age": 30}));
/// ```
pub fn to_json(value: &PhpValue) -> JsonValue {
    match value {
        PhpValue::Null | PhpValue::Reference => JsonValue::Null,
        PhpValue::Bool(b) => JsonValue::Bool(*b),
        PhpValue::Int(i) => json!(*i),
        PhpValue::Float(f) => {
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
        PhpValue::String(s) => JsonValue::String(String::from_utf8_lossy(s).into_owned()),
        PhpValue::Array(items) => {
            // Sequential integer keys starting from 0 become a JSON array
            let is_indexed = items
                .iter()
                .enumerate()
                .all(|(i, (k, _))| matches!(k, PhpValue::Int(idx) if *idx as usize == i));

            if is_indexed {
                JsonValue::Array(items.iter().map(|(_, v)| to_json(v)).collect())
            } else {
                JsonValue::Object(pairs_to_map(items, |k| k))
            }
        }
        PhpValue::Object(obj) => {
            let mut map = Map::new();
            map.insert("__class__".to_string(), json!(obj.class_name.as_ref()));
            map.extend(pairs_to_map(&obj.members, member_key));
            JsonValue::Object(map)
        }
        PhpValue::Serialized(obj) => {
            let payload = match obj.value() {
                Some(inner) => to_json(inner),
                None => JsonValue::String(String::from_utf8_lossy(&obj.payload).into_owned()),
            };
            json!({
                "__class__": obj.class_name.as_ref(),
                "__payload__": payload,
            })
        }
        PhpValue::SplArray(spl) => json!({
            "__flags__": spl.flags,
            "__array__": to_json(&spl.array),
            "__properties__": to_json(&spl.properties),
        }),
    }
}

/// Build a JSON object from string/int keyed pairs, skipping other key types.
fn pairs_to_map(items: &PhpArray<'_>, rename: impl Fn(String) -> String) -> Map<String, JsonValue> {
    let mut map = Map::new();
    for (k, v) in items {
        let key = match k {
            PhpValue::String(s) => String::from_utf8_lossy(s).into_owned(),
            PhpValue::Int(i) => i.to_string(),
            _ => continue,
        };
        map.insert(rename(key), to_json(v));
    }
    map
}

/// Render a mangled member name as `Class::name`, `*name` or `name`.
fn member_key(raw: String) -> String {
    let member = parse_member_name(raw.as_bytes());
    let name = String::from_utf8_lossy(member.name);
    match (member.visibility, member.declaring_class) {
        (Visibility::Private, Some(class)) => {
            format!("{}::{}", String::from_utf8_lossy(class), name)
        }
        (Visibility::Protected, _) => format!("*{}", name),
        _ => name.into_owned(),
    }
}

/// Convert a PHP value to a JSON string.
///
/// # Example
///
/// ```rust
/// use php_serialize_core::{from_bytes, json::to_json_string};
///
/// let data = br#"a:2:{s:4:"name";s:5:"Alice";s:3:"age";i:30;}"#;
/// let php_value = from_bytes(data).unwrap();
/// let json_str = to_json_string(&php_value).unwrap();
/// // JSON key order is not guaranteed, so check contents
/// assert!(json_str.contains(r#""name":"Alice""#));
/// assert!(json_str.contains(r#""age":30"#));
/// ```
pub fn to_json_string(value: &PhpValue) -> serde_json::Result<String> {
    let json = to_json(value);
    serde_json::to_string(&json)
}

/// Convert a PHP value to a pretty-printed JSON string.
pub fn to_json_string_pretty(value: &PhpValue) -> serde_json::Result<String> {
    let json = to_json(value);
    serde_json::to_string_pretty(&json)
}
