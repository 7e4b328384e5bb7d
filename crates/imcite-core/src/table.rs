//! Deep flattening of metadata records into a rectangular table
//!
//! Crossref records are heterogeneous JSON objects. Each record is
//! flattened to dot-joined leaf paths (`author.0.given`), the column
//! set is the sorted union of every path seen in the batch, and rows
//! keep the order the identifiers were fetched in.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

/// A single fetched metadata record, as loose JSON fields.
pub type MetadataRecord = serde_json::Map<String, Value>;

/// Flatten one record to leaf paths mapped to text.
///
/// Arrays contribute zero-based indices to the path. Strings pass
/// through verbatim, numbers and booleans render as their JSON text,
/// null renders as an empty string. Empty objects and arrays produce
/// no paths at all.
pub fn flatten_record(record: &MetadataRecord) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();
    for (key, value) in record {
        flatten_value(key, value, &mut flat);
    }
    flat
}

fn flatten_value(path: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_value(&format!("{}.{}", path, key), nested, out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_value(&format!("{}.{}", path, index), item, out);
            }
        }
        Value::Null => {
            out.insert(path.to_string(), String::new());
        }
        Value::String(text) => {
            out.insert(path.to_string(), text.clone());
        }
        other => {
            out.insert(path.to_string(), other.to_string());
        }
    }
}

/// A rectangular table of flattened metadata.
///
/// One row per fetched record, empty records included, so rows stay
/// aligned with the identifier list that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn from_records(records: &[MetadataRecord]) -> Self {
        let flattened: Vec<BTreeMap<String, String>> =
            records.iter().map(flatten_record).collect();

        let mut universe = BTreeSet::new();
        for flat in &flattened {
            universe.extend(flat.keys().cloned());
        }
        let columns: Vec<String> = universe.into_iter().collect();

        let rows = flattened
            .iter()
            .map(|flat| {
                columns
                    .iter()
                    .map(|column| flat.get(column).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `limit` rows, for on-screen previews.
    pub fn preview(&self, limit: usize) -> &[Vec<String>] {
        &self.rows[..limit.min(self.rows.len())]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> MetadataRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be JSON objects"),
        }
    }

    #[test]
    fn flattens_nested_objects_and_arrays() {
        let record = record(json!({
            "title": ["A Paper"],
            "author": [
                {"given": "Ada", "family": "Lovelace"},
                {"given": "Charles", "family": "Babbage"}
            ]
        }));
        let flat = flatten_record(&record);

        assert_eq!(flat["title.0"], "A Paper");
        assert_eq!(flat["author.0.given"], "Ada");
        assert_eq!(flat["author.1.family"], "Babbage");
        assert_eq!(flat.len(), 5);
    }

    #[test]
    fn scalar_values_render_as_text() {
        let record = record(json!({
            "count": 42,
            "score": 1.5,
            "open": true,
            "issue": null,
            "title": "Plain"
        }));
        let flat = flatten_record(&record);

        assert_eq!(flat["count"], "42");
        assert_eq!(flat["score"], "1.5");
        assert_eq!(flat["open"], "true");
        assert_eq!(flat["issue"], "");
        assert_eq!(flat["title"], "Plain");
    }

    #[test]
    fn empty_containers_produce_no_paths() {
        let record = record(json!({"authors": [], "meta": {}, "kept": "x"}));
        let flat = flatten_record(&record);
        assert_eq!(flat.len(), 1);
        assert!(flat.contains_key("kept"));
    }

    #[test]
    fn columns_are_the_sorted_union_across_records() {
        let records = vec![
            record(json!({"b": 1, "a": 2})),
            record(json!({"c": {"d": 3}})),
        ];
        let table = ResultTable::from_records(&records);
        assert_eq!(table.columns(), ["a", "b", "c.d"]);
    }

    #[test]
    fn empty_records_still_produce_rows() {
        let records = vec![
            record(json!({"title": "One"})),
            MetadataRecord::new(),
            record(json!({"title": "Three"})),
        ];
        let table = ResultTable::from_records(&records);

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows()[0], ["One"]);
        assert_eq!(table.rows()[1], [""]);
        assert_eq!(table.rows()[2], ["Three"]);
    }

    #[test]
    fn missing_columns_fill_with_empty_strings() {
        let records = vec![record(json!({"a": "1"})), record(json!({"b": "2"}))];
        let table = ResultTable::from_records(&records);

        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.rows()[0], ["1", ""]);
        assert_eq!(table.rows()[1], ["", "2"]);
    }

    #[test]
    fn no_records_means_no_rows_and_no_columns() {
        let table = ResultTable::from_records(&[]);
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn preview_caps_at_the_row_count() {
        let records: Vec<MetadataRecord> = (0..3)
            .map(|i| record(json!({"n": i.to_string()})))
            .collect();
        let table = ResultTable::from_records(&records);

        assert_eq!(table.preview(2).len(), 2);
        assert_eq!(table.preview(10).len(), 3);
        assert_eq!(table.preview(0).len(), 0);
    }
}
