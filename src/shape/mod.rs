//! Structural classification of parsed JSON values.
//!
//! Export files come in a handful of shapes. [`classify`] maps any value to
//! one of a closed set of [`Shape`]s so the flattener can dispatch on it
//! instead of probing types ad hoc.

use serde_json::{Map, Value};

/// Shape of a JSON value as far as flattening is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `{"label": {"key": [scalar, ...], ...}}`: a single wrapper key over an
    /// object whose every member is a list of scalars.
    CookieJar,
    /// An array whose elements are all objects (an empty array counts).
    RowList,
    /// Any other object.
    Object,
    /// Any other array.
    List,
    /// String, number, bool or null.
    Scalar,
}

/// Classify `value`. Pure, total.
pub fn classify(value: &Value) -> Shape {
    match value {
        Value::Object(map) if is_cookie_jar(map) => Shape::CookieJar,
        Value::Object(_) => Shape::Object,
        Value::Array(items) if items.iter().all(Value::is_object) => Shape::RowList,
        Value::Array(_) => Shape::List,
        _ => Shape::Scalar,
    }
}

/// True for null, bool, number and string.
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn is_cookie_jar(map: &Map<String, Value>) -> bool {
    if map.len() != 1 {
        return false;
    }
    let Some(Value::Object(inner)) = map.values().next() else {
        return false;
    };
    !inner.is_empty()
        && inner.values().all(|v| match v {
            Value::Array(items) => items.iter().all(is_scalar),
            _ => false,
        })
}

/// Render the nested layout of `value` as an indented key tree.
///
/// Objects list their keys one per line, indented by two dashes per level.
/// Lists report their length and describe their first element only.
/// Scalars print their type name.
///
/// ```
/// # use selfscape::shape::outline;
/// let v = serde_json::json!({"a": [{"b": 1}], "c": "x"});
/// assert_eq!(outline(&v), "\na: list - idx 0/0:\n--b: integer\nc: string");
/// ```
pub fn outline(value: &Value) -> String {
    let mut out = String::new();
    write_outline(value, 0, &mut out);
    out
}

fn write_outline(value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                out.push('\n');
                out.push_str(&"-".repeat(depth));
                out.push_str(key);
                out.push(':');
                write_outline(child, depth + 2, out);
            }
        }
        Value::Array(items) => match items.first() {
            Some(first) => {
                out.push_str(&format!(" list - idx 0/{}:", items.len() - 1));
                write_outline(first, depth, out);
            }
            None => out.push_str(" list - []"),
        },
        scalar => {
            out.push(' ');
            out.push_str(scalar_type_name(scalar));
        }
    }
}

/// Type name of a scalar cell, used by outlines and artifact summaries.
pub fn scalar_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cookie_jar_detected() {
        let v = json!({"c": {"k1": [1, 2], "k2": [3]}});
        assert_eq!(classify(&v), Shape::CookieJar);
    }

    #[test]
    fn test_cookie_jar_requires_scalar_lists() {
        assert_eq!(classify(&json!({"c": {"k1": [{"x": 1}]}})), Shape::Object);
        assert_eq!(classify(&json!({"c": {"k1": 5}})), Shape::Object);
        assert_eq!(classify(&json!({"c": {}})), Shape::Object);
        assert_eq!(
            classify(&json!({"c": {"k1": [1]}, "d": 2})),
            Shape::Object
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(classify(&json!([{"a": 1}, {"b": 2}])), Shape::RowList);
        assert_eq!(classify(&json!([])), Shape::RowList);
        assert_eq!(classify(&json!([{"a": 1}, 2])), Shape::List);
        assert_eq!(classify(&json!([1, 2])), Shape::List);
    }

    #[test]
    fn test_scalars() {
        for v in [json!(null), json!(true), json!(1), json!(1.5), json!("s")] {
            assert_eq!(classify(&v), Shape::Scalar);
        }
    }

    #[test]
    fn test_outline_nested() {
        let v = json!({"tlk": [{"k1": 1, "k2": {"k2a": "val", "k2b": true}, "k3": [4, 5, 6]}]});
        let expected = concat!(
            "\ntlk: list - idx 0/0:",
            "\n--k1: integer",
            "\n--k2:",
            "\n----k2a: string",
            "\n----k2b: bool",
            "\n--k3: list - idx 0/2: integer",
        );
        assert_eq!(outline(&v), expected);
    }

    #[test]
    fn test_outline_empty_list_and_scalar() {
        assert_eq!(outline(&json!({"a": []})), "\na: list - []");
        assert_eq!(outline(&json!(2.5)), " float");
        assert_eq!(outline(&json!({})), "");
    }
}
