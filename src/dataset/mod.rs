//! In-memory dataset model.
//!
//! A [`Table`] is an ordered set of rows over an ordered set of columns.
//! Columns appear in first-seen order, cells are JSON scalars and missing
//! cells are `null`. A [`LogicalDataset`] pairs a name with either a table
//! or a list of raw structured values.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::mem::size_of;

/// Flat rows keyed by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from explicit columns and rows.
    ///
    /// Short rows are padded with `null`, long rows are truncated to the
    /// column count. Duplicate column names keep their first position.
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Table::new();
        let mut positions = Vec::with_capacity(columns.len());
        for column in columns {
            positions.push(table.column_slot(&column));
        }
        let width = table.columns.len();
        for source in rows {
            let mut row = vec![Value::Null; width];
            for (cell, &slot) in source.into_iter().zip(positions.iter()) {
                row[slot] = cell;
            }
            table.rows.push(row);
        }
        table
    }

    /// Column names in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows, each aligned with [`Table::columns`].
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of `column`, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Cell at (`row`, `column`). Missing cells read as `null`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// One row as a JSON object, `null` cells included.
    pub fn record(&self, row: usize) -> Option<Map<String, Value>> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(cells.iter().cloned())
                .collect(),
        )
    }

    /// Append one row given as `(column, value)` pairs.
    ///
    /// Unknown columns are added (earlier rows get `null`). When a column
    /// repeats within the record, the later value wins.
    pub fn push_record<I>(&mut self, record: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut row = vec![Value::Null; self.columns.len()];
        for (column, value) in record {
            let slot = self.column_slot(&column);
            if slot >= row.len() {
                row.resize(slot + 1, Value::Null);
            }
            row[slot] = value;
        }
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Append all rows of `other` below this table's rows.
    ///
    /// The column set becomes the union of both; cells a side does not have
    /// are `null`.
    pub fn append(&mut self, other: Table) {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|column| self.column_slot(column))
            .collect();
        let width = self.columns.len();
        self.rows.reserve(other.rows.len());
        for source in other.rows {
            let mut row = vec![Value::Null; width];
            for (cell, &slot) in source.into_iter().zip(mapping.iter()) {
                row[slot] = cell;
            }
            self.rows.push(row);
        }
    }

    /// Rough heap footprint in bytes.
    pub fn estimated_bytes(&self) -> usize {
        let header: usize = self
            .columns
            .iter()
            .map(|c| size_of::<String>() + c.len())
            .sum();
        let cells: usize = self
            .rows
            .iter()
            .flat_map(|r| r.iter())
            .map(cell_bytes)
            .sum();
        header + cells + self.rows.len() * size_of::<Vec<Value>>()
    }

    /// Find or add `column`, padding existing rows when it is new.
    fn column_slot(&mut self, column: &str) -> usize {
        if let Some(&idx) = self.index.get(column) {
            return idx;
        }
        let idx = self.columns.len();
        self.columns.push(column.to_string());
        self.index.insert(column.to_string(), idx);
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        idx
    }
}

fn cell_bytes(value: &Value) -> usize {
    let payload = match value {
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(cell_bytes).sum(),
        Value::Object(map) => map.iter().map(|(k, v)| k.len() + cell_bytes(v)).sum(),
        _ => 0,
    };
    size_of::<Value>() + payload
}

/// Contents of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetBody {
    /// Flattened rows.
    Table(Table),
    /// Unflattened values, one per contributing file, in file order.
    Structured(Vec<Value>),
}

impl DatasetBody {
    /// Short kind label.
    pub fn kind(&self) -> &'static str {
        match self {
            DatasetBody::Table(_) => "table",
            DatasetBody::Structured(_) => "structured",
        }
    }
}

/// A named dataset produced by one ingest run.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalDataset {
    /// Canonical dataset name.
    pub name: String,
    /// Rows or raw values.
    pub body: DatasetBody,
}

impl LogicalDataset {
    /// Create a dataset.
    pub fn new(name: impl Into<String>, body: DatasetBody) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Row count for tables, value count for structured datasets.
    pub fn len(&self) -> usize {
        match &self.body {
            DatasetBody::Table(table) => table.len(),
            DatasetBody::Structured(values) => values.len(),
        }
    }

    /// True when [`LogicalDataset::len`] is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(rows, columns)`; structured datasets report one column.
    pub fn shape(&self) -> (usize, usize) {
        match &self.body {
            DatasetBody::Table(table) => (table.len(), table.width()),
            DatasetBody::Structured(values) => (values.len(), 1),
        }
    }

    /// The table, if this dataset was flattened.
    pub fn as_table(&self) -> Option<&Table> {
        match &self.body {
            DatasetBody::Table(table) => Some(table),
            DatasetBody::Structured(_) => None,
        }
    }

    /// The raw values, if this dataset was kept structured.
    pub fn as_structured(&self) -> Option<&[Value]> {
        match &self.body {
            DatasetBody::Structured(values) => Some(values),
            DatasetBody::Table(_) => None,
        }
    }

    /// Merge another contribution under the same name.
    ///
    /// Tables concatenate with a column union. A table meeting a structured
    /// body (which only happens if a name was reclassified between files)
    /// demotes the table's rows to structured objects.
    pub fn merge(&mut self, other: DatasetBody) {
        let current = std::mem::replace(&mut self.body, DatasetBody::Structured(Vec::new()));
        self.body = match (current, other) {
            (DatasetBody::Table(mut a), DatasetBody::Table(b)) => {
                a.append(b);
                DatasetBody::Table(a)
            }
            (DatasetBody::Structured(mut a), DatasetBody::Structured(b)) => {
                a.extend(b);
                DatasetBody::Structured(a)
            }
            (DatasetBody::Table(a), DatasetBody::Structured(b)) => {
                let mut values = table_records(&a);
                values.extend(b);
                DatasetBody::Structured(values)
            }
            (DatasetBody::Structured(mut a), DatasetBody::Table(b)) => {
                a.extend(table_records(&b));
                DatasetBody::Structured(a)
            }
        };
    }

    /// Rough heap footprint in bytes.
    pub fn estimated_bytes(&self) -> usize {
        match &self.body {
            DatasetBody::Table(table) => table.estimated_bytes(),
            DatasetBody::Structured(values) => values.iter().map(cell_bytes).sum(),
        }
    }

    /// One-block summary: name, shape and estimated size.
    pub fn describe(&self) -> String {
        let (rows, cols) = self.shape();
        format!(
            "{}:\n  shape: ({}, {}) RAM: {:.3}MB",
            self.name,
            rows,
            cols,
            self.estimated_bytes() as f64 * 1e-6
        )
    }
}

impl fmt::Display for LogicalDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn table_records(table: &Table) -> Vec<Value> {
    (0..table.len())
        .filter_map(|i| table.record(i))
        .map(Value::Object)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rec(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_push_record_unions_columns() {
        let mut t = Table::new();
        t.push_record(rec(&[("a", json!(1))]));
        t.push_record(rec(&[("b", json!("x"))]));
        assert_eq!(t.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(t.rows(), &[vec![json!(1), json!(null)], vec![json!(null), json!("x")]]);
    }

    #[test]
    fn test_repeated_column_later_value_wins() {
        let mut t = Table::new();
        t.push_record(rec(&[("a", json!(1)), ("a", json!(2))]));
        assert_eq!(t.get(0, "a"), Some(&json!(2)));
        assert_eq!(t.width(), 1);
    }

    #[test]
    fn test_append_pads_missing_cells() {
        let mut a = Table::new();
        a.push_record(rec(&[("x", json!(1)), ("y", json!(2))]));
        let mut b = Table::new();
        b.push_record(rec(&[("y", json!(3)), ("z", json!(4))]));
        a.append(b);

        assert_eq!(a.len(), 2);
        assert_eq!(a.columns(), &["x".to_string(), "y".to_string(), "z".to_string()]);
        let expected = json!({"x": null, "y": 3, "z": 4});
        assert_eq!(&a.record(1).unwrap(), expected.as_object().unwrap());
    }

    #[test]
    fn test_from_parts_pads_and_dedups() {
        let t = Table::from_parts(
            vec!["a".into(), "b".into()],
            vec![vec![json!(1)], vec![json!(2), json!(3)]],
        );
        assert_eq!(t.rows(), &[vec![json!(1), json!(null)], vec![json!(2), json!(3)]]);
    }

    #[test]
    fn test_merge_tables_and_structured() {
        let mut t1 = Table::new();
        t1.push_record(rec(&[("a", json!(1))]));
        let mut t2 = Table::new();
        t2.push_record(rec(&[("a", json!(2))]));

        let mut ds = LogicalDataset::new("n", DatasetBody::Table(t1));
        ds.merge(DatasetBody::Table(t2));
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.shape(), (2, 1));

        let mut raw = LogicalDataset::new("r", DatasetBody::Structured(vec![json!({"k": 1})]));
        raw.merge(DatasetBody::Structured(vec![json!([1, 2])]));
        assert_eq!(raw.as_structured().unwrap(), &[json!({"k": 1}), json!([1, 2])]);
    }

    #[test]
    fn test_describe_format() {
        let mut t = Table::new();
        t.push_record(rec(&[("a", json!("hello"))]));
        let ds = LogicalDataset::new("bcts", DatasetBody::Table(t));
        let text = ds.describe();
        assert!(text.starts_with("bcts:\n  shape: (1, 1) RAM: "), "{}", text);
        assert!(text.ends_with("MB"));
    }
}
