//! JSON → flat table conversion.
//!
//! Nested objects become `parent_child` columns. Nested lists explode: every
//! element yields its own row carrying the parent's scalar columns, and two
//! sibling lists in one record cross-multiply. Values that are not already a
//! list of row objects are wrapped under a synthetic key first and the key is
//! stripped from the resulting column names afterwards.
//!
//! The cookie-jar shape (`{"label": {"name": [v, ...], ...}}`) bypasses all
//! of that and becomes a two-column `cookie`/`value` table.

pub mod columns;
pub mod deadline;

pub use columns::clean_column;
pub use deadline::{Deadline, DeadlineExceeded};

use crate::dataset::Table;
use crate::shape::{classify, Shape};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Separator between key path segments.
pub const PATH_SEPARATOR: char = '_';

/// Synthetic key used to wrap non-row values.
pub const WRAP_KEY: &str = "0";

/// Column name given to a bare scalar after unwrapping.
pub const VALUE_COLUMN: &str = "value";

/// Column names of the cookie-jar table.
pub const COOKIE_COLUMNS: [&str; 2] = ["cookie", "value"];

/// How many generated rows pass between deadline checks.
const CHECK_EVERY: usize = 256;

type Record = Vec<(String, Value)>;

/// Flatten `value` with no time bound.
pub fn flatten(value: &Value) -> Table {
    match flatten_with_deadline(value, &Deadline::none()) {
        Ok(table) => table,
        // An unbounded deadline never expires.
        Err(_) => Table::new(),
    }
}

/// Flatten `value`, giving up once `deadline` has passed.
///
/// # Errors
///
/// Returns [`DeadlineExceeded`] as soon as a periodic check finds the
/// deadline expired. Partial output is discarded.
pub fn flatten_with_deadline(
    value: &Value,
    deadline: &Deadline,
) -> Result<Table, DeadlineExceeded> {
    match classify(value) {
        Shape::CookieJar => cookie_jar(value, deadline),
        Shape::RowList => {
            let mut table = Table::new();
            let mut names = ColumnNames::default();
            if let Value::Array(items) = value {
                for item in items {
                    for record in splode(item, "", deadline)? {
                        table.push_record(names.rename(record, false));
                    }
                }
            }
            Ok(table)
        }
        Shape::Object | Shape::List | Shape::Scalar => {
            let mut wrapper = Map::new();
            wrapper.insert(WRAP_KEY.to_string(), value.clone());
            let records = splode(&Value::Object(wrapper), "", deadline)?;

            let mut table = Table::new();
            let mut names = ColumnNames::default();
            for record in records {
                table.push_record(names.rename(record, true));
            }
            Ok(table)
        }
    }
}

/// Explode one value into records, prefixing keys with `prefix`.
fn splode(
    value: &Value,
    prefix: &str,
    deadline: &Deadline,
) -> Result<Vec<Record>, DeadlineExceeded> {
    deadline.check()?;
    match value {
        Value::Object(map) => {
            let mut rows: Vec<Record> = vec![Vec::new()];
            for (key, child) in map {
                let path = join(prefix, key);
                let sub = splode(child, &path, deadline)?;
                rows = cross(rows, sub, deadline)?;
            }
            Ok(rows)
        }
        Value::Array(items) if items.is_empty() => {
            Ok(vec![vec![(prefix.to_string(), Value::Null)]])
        }
        Value::Array(items) => {
            let mut rows = Vec::new();
            for item in items {
                rows.extend(splode(item, prefix, deadline)?);
            }
            Ok(rows)
        }
        scalar => Ok(vec![vec![(prefix.to_string(), scalar.clone())]]),
    }
}

/// Every left record extended by every right record.
fn cross(
    left: Vec<Record>,
    right: Vec<Record>,
    deadline: &Deadline,
) -> Result<Vec<Record>, DeadlineExceeded> {
    if right.len() == 1 {
        let tail = &right[0];
        return Ok(left
            .into_iter()
            .map(|mut r| {
                r.extend(tail.iter().cloned());
                r
            })
            .collect());
    }

    let mut out = Vec::with_capacity(left.len().saturating_mul(right.len()));
    for l in &left {
        for r in &right {
            if out.len() % CHECK_EVERY == 0 {
                deadline.check()?;
            }
            let mut row = l.clone();
            row.extend(r.iter().cloned());
            out.push(row);
        }
    }
    Ok(out)
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, PATH_SEPARATOR, key)
    }
}

fn cookie_jar(value: &Value, deadline: &Deadline) -> Result<Table, DeadlineExceeded> {
    let mut table = Table::new();
    let Some(inner) = value
        .as_object()
        .and_then(|outer| outer.values().next())
        .and_then(Value::as_object)
    else {
        return Ok(table);
    };

    for (cookie, values) in inner {
        let Some(values) = values.as_array() else {
            continue;
        };
        for v in values {
            if table.len() % CHECK_EVERY == 0 {
                deadline.check()?;
            }
            table.push_record([
                (COOKIE_COLUMNS[0].to_string(), Value::String(cookie.clone())),
                (COOKIE_COLUMNS[1].to_string(), v.clone()),
            ]);
        }
    }
    Ok(table)
}

/// Memoized raw path → final column name.
#[derive(Default)]
struct ColumnNames {
    cache: HashMap<String, String>,
}

impl ColumnNames {
    fn rename(&mut self, record: Record, wrapped: bool) -> Record {
        record
            .into_iter()
            .map(|(raw, value)| {
                let name = self
                    .cache
                    .entry(raw)
                    .or_insert_with_key(|raw| final_name(raw, wrapped))
                    .clone();
                (name, value)
            })
            .collect()
    }
}

fn final_name(raw: &str, wrapped: bool) -> String {
    let unwrapped = if wrapped {
        if raw == WRAP_KEY {
            VALUE_COLUMN
        } else {
            raw.strip_prefix(WRAP_KEY)
                .and_then(|rest| rest.strip_prefix(PATH_SEPARATOR))
                .unwrap_or(raw)
        }
    } else {
        raw
    };
    clean_column(unwrapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn cols(t: &Table) -> Vec<&str> {
        t.columns().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_nested_object_becomes_path_columns() {
        let t = flatten(&json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(cols(&t), vec!["a_b", "a_c"]);
        assert_eq!(t.rows(), &[vec![json!(1), json!(2)]]);
    }

    #[test]
    fn test_nested_list_of_objects_explodes() {
        let t = flatten(&json!({"a": [{"x": 1}, {"x": 2}]}));
        assert_eq!(cols(&t), vec!["a_x"]);
        assert_eq!(t.rows(), &[vec![json!(1)], vec![json!(2)]]);
    }

    #[test]
    fn test_parent_scalars_replicate_into_exploded_rows() {
        let t = flatten(&json!([{"id": 7, "tags": ["a", "b"]}]));
        assert_eq!(cols(&t), vec!["id", "tags"]);
        assert_eq!(
            t.rows(),
            &[vec![json!(7), json!("a")], vec![json!(7), json!("b")]]
        );
    }

    #[test]
    fn test_sibling_lists_cross_multiply() {
        let t = flatten(&json!([{"p": [1, 2], "q": ["x", "y", "z"]}]));
        assert_eq!(t.len(), 6);
        assert_eq!(t.get(0, "p"), Some(&json!(1)));
        assert_eq!(t.get(0, "q"), Some(&json!("x")));
        assert_eq!(t.get(5, "p"), Some(&json!(2)));
        assert_eq!(t.get(5, "q"), Some(&json!("z")));
    }

    #[test]
    fn test_row_list_keeps_keys_unprefixed() {
        let t = flatten(&json!([{"name": "Cats"}, {"name": "Dogs", "rank": 2}]));
        assert_eq!(cols(&t), vec!["name", "rank"]);
        assert_eq!(t.get(0, "rank"), Some(&json!(null)));
    }

    #[test]
    fn test_scalar_and_scalar_list() {
        let t = flatten(&json!(42));
        assert_eq!(cols(&t), vec!["value"]);
        assert_eq!(t.rows(), &[vec![json!(42)]]);

        let t = flatten(&json!(["a", "b", "c"]));
        assert_eq!(cols(&t), vec!["value"]);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(flatten(&json!([])).is_empty());
        let t = flatten(&json!({"a": []}));
        assert_eq!(cols(&t), vec!["a"]);
        assert_eq!(t.rows(), &[vec![json!(null)]]);
    }

    #[test]
    fn test_cookie_jar_special_case() {
        let t = flatten(&json!({"c": {"k1": [1, 2], "k2": [3]}}));
        assert_eq!(cols(&t), vec!["cookie", "value"]);
        assert_eq!(
            t.rows(),
            &[
                vec![json!("k1"), json!(1)],
                vec![json!("k1"), json!(2)],
                vec![json!("k2"), json!(3)],
            ]
        );
    }

    #[test]
    fn test_noisy_segments_are_stripped() {
        let t = flatten(&json!([{
            "media": [{"media_metadata": {"photo_metadata": {"exif_data": [{"iso": 100}]}}}]
        }]));
        assert_eq!(cols(&t), vec!["photo_data_iso"]);
    }

    #[test]
    fn test_expired_deadline_aborts() {
        let deadline = Deadline::after(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        let err = flatten_with_deadline(&json!({"a": 1}), &deadline).unwrap_err();
        assert_eq!(err.limit, Duration::ZERO);
    }

    #[test]
    fn test_explosive_input_hits_deadline() {
        let list: Vec<u32> = (0..40).collect();
        let value = json!([{"a": list, "b": list, "c": list, "d": list, "e": list}]);
        let result = flatten_with_deadline(&value, &Deadline::after(Duration::from_millis(20)));
        assert!(result.is_err());
    }
}
