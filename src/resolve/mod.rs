//! Dataset name resolution.
//!
//! Many export files wrap their payload in a single top-level key
//! (`{"topics_v2": [...]}`). That key is the dataset's canonical name, and the
//! wrapped value is what gets flattened. Anything else is filed under the
//! file's stem.

use serde_json::Value;

/// Return the single key of a one-key object, if `value` is one.
pub fn wrapper_key(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.keys().next().map(String::as_str),
        _ => None,
    }
}

/// Canonical dataset name for `value`, falling back to `fallback_name`.
///
/// ```
/// # use selfscape::resolve::resolve_name;
/// let v = serde_json::json!({"topics_v2": []});
/// assert_eq!(resolve_name(&v, "your_topics"), "topics_v2");
/// assert_eq!(resolve_name(&serde_json::json!([1]), "your_topics"), "your_topics");
/// ```
pub fn resolve_name(value: &Value, fallback_name: &str) -> String {
    wrapper_key(value).unwrap_or(fallback_name).to_string()
}

/// Split a parsed file into its dataset name and payload.
///
/// The payload is the wrapped value for single-key files, the whole value
/// otherwise.
pub fn split_payload(value: Value, fallback_name: &str) -> (String, Value) {
    match value {
        Value::Object(map) if map.len() == 1 => {
            let mut entries = map.into_iter();
            match entries.next() {
                Some((name, payload)) => (name, payload),
                None => (fallback_name.to_string(), Value::Null),
            }
        }
        other => (fallback_name.to_string(), other),
    }
}
