//! JSON encoding of a single dataset artifact.
//!
//! ```json
//! {"name": "topics_v2", "body": {"kind": "table", "columns": ["name"], "rows": [["Cats"]]}}
//! {"name": "profile_v2", "body": {"kind": "structured", "values": [{"...": "..."}]}}
//! ```

use crate::dataset::{DatasetBody, LogicalDataset, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
struct ArtifactRef<'a> {
    name: &'a str,
    body: BodyRef<'a>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum BodyRef<'a> {
    Table {
        columns: &'a [String],
        rows: &'a [Vec<Value>],
    },
    Structured {
        values: &'a [Value],
    },
}

#[derive(Deserialize)]
struct Artifact {
    name: String,
    body: Body,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Body {
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Structured {
        values: Vec<Value>,
    },
}

/// Serialize a dataset to artifact bytes.
pub fn encode(dataset: &LogicalDataset) -> Result<Vec<u8>, String> {
    let body = match &dataset.body {
        DatasetBody::Table(table) => BodyRef::Table {
            columns: table.columns(),
            rows: table.rows(),
        },
        DatasetBody::Structured(values) => BodyRef::Structured { values },
    };
    serde_json::to_vec(&ArtifactRef {
        name: &dataset.name,
        body,
    })
    .map_err(|e| format!("Failed to serialize artifact: {}", e))
}

/// Parse artifact bytes back into a dataset.
pub fn decode(bytes: &[u8]) -> Result<LogicalDataset, String> {
    let artifact: Artifact =
        serde_json::from_slice(bytes).map_err(|e| format!("Failed to parse artifact: {}", e))?;
    let body = match artifact.body {
        Body::Table { columns, rows } => {
            if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
                return Err(format!(
                    "Row {} has {} cells, expected {}",
                    bad,
                    rows[bad].len(),
                    columns.len()
                ));
            }
            DatasetBody::Table(Table::from_parts(columns, rows))
        }
        Body::Structured { values } => DatasetBody::Structured(values),
    };
    Ok(LogicalDataset::new(artifact.name, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_artifact() {
        let ds = LogicalDataset::new(
            "profile_v2",
            DatasetBody::Structured(vec![json!({"name": {"full_name": "A"}}), json!([1, 2])]),
        );
        let bytes = encode(&ds).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r#""kind":"structured""#), "{}", text);
        assert_eq!(decode(&bytes).unwrap(), ds);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let bytes = br#"{"name":"x","body":{"kind":"table","columns":["a","b"],"rows":[[1]]}}"#;
        assert!(decode(bytes).unwrap_err().contains("Row 0"));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode(b"not json").is_err());
        assert!(decode(br#"{"name":"x","body":{"kind":"csv"}}"#).is_err());
    }
}
