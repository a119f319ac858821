//! Conversions between `Value` and plain collections / JSON

use std::collections::HashMap;

use crate::resource::{Attributes, Value};

/// Collect the string elements of a list value
///
/// Non-string elements are skipped; a non-list value yields an empty vector.
pub fn to_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::List(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Build a list value from strings
pub fn from_string_list<I, S>(values: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::List(values.into_iter().map(|s| Value::String(s.into())).collect())
}

/// Collect the string entries of a map value
pub fn to_string_map(value: &Value) -> HashMap<String, String> {
    match value {
        Value::Map(map) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => HashMap::new(),
    }
}

/// Build a map value from string entries
pub fn from_string_map(values: &HashMap<String, String>) -> Value {
    Value::Map(
        values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Element-wise, order-sensitive list comparison
pub fn equal_lists(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y),
        _ => false,
    }
}

/// Convert a value to JSON
///
/// References have no JSON form and become `null`; they must be resolved first.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Null => serde_json::Value::Null,
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
        Value::ResourceRef(_, _) => serde_json::Value::Null,
    }
}

/// Convert JSON to a value
///
/// `null` has no value form and yields `None`. Floats are truncated to integers.
/// Strings written as `${type.name.attribute}` become references.
pub fn from_json(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Value::Int),
        serde_json::Value::String(s) => {
            Some(Value::parse_reference(s).unwrap_or_else(|| Value::String(s.clone())))
        }
        serde_json::Value::Array(items) => Some(Value::List(items.iter().filter_map(from_json).collect())),
        serde_json::Value::Object(map) => Some(Value::Map(
            map.iter()
                .filter_map(|(k, v)| from_json(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
    }
}

/// Convert stored JSON back to a value exactly as it was written
///
/// Unlike [`from_json`], strings are never read as references and `null`
/// and floats are kept.
pub fn from_stored_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(from_stored_json).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), from_stored_json(v)))
                .collect(),
        ),
    }
}

/// Convert an attribute map to a JSON object
pub fn attributes_to_json(attributes: &Attributes) -> serde_json::Value {
    serde_json::Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), to_json(v)))
            .collect(),
    )
}

/// Convert a JSON object to an attribute map, dropping `null` entries
///
/// Anything other than an object yields an empty map.
pub fn attributes_from_json(json: &serde_json::Value) -> Attributes {
    match json {
        serde_json::Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| from_json(v).map(|v| (k.clone(), v)))
            .collect(),
        _ => HashMap::new(),
    }
}
