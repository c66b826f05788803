//! Record and dataset structures for review data
//!
//! A `Record` keeps every input column as an insertion-ordered JSON map so that
//! raw columns survive the pipeline untouched while stages add derived ones.

use crate::{Error, Result};
use serde_json::{Map, Value};

pub const PRODUCT_ID: &str = "product_id";
pub const USER_ID: &str = "user_id";
pub const RATING: &str = "rating";
pub const REVIEW_CONTENT: &str = "review_content";
pub const REVIEW_TITLE: &str = "review_title";
pub const ABOUT_PRODUCT: &str = "about_product";

pub const REVIEW_CONTENT_CLEAN: &str = "review_content_clean";
pub const RATING_NUMERIC: &str = "rating_numeric";
pub const SENTIMENT: &str = "sentiment";

/// Columns every input file must carry. Anything missing is a run-level failure.
pub const REQUIRED_COLUMNS: &[&str] = &[
    PRODUCT_ID,
    USER_ID,
    RATING,
    REVIEW_CONTENT,
    REVIEW_TITLE,
    ABOUT_PRODUCT,
];

/// Name of the derived column holding the cleaned form of `column`
pub fn clean_column_name(column: &str) -> String {
    format!("{}_clean", column)
}

/// The raw column a derived `<col>_clean` column was built from
pub fn source_column_name(column: &str) -> Option<&str> {
    column.strip_suffix("_clean").filter(|raw| !raw.is_empty())
}

/// A cell is null when absent, JSON null, or a blank string
pub fn is_null_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Render a cell as text. Null becomes `None`; scalars use their display form.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// A single review row
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Column values in input order, derived columns appended
    pub data: Map<String, Value>,
    /// Source line number (1-based, header excluded for CSV)
    pub source_line: usize,
}

impl Record {
    /// Create a new record
    pub fn new(data: Map<String, Value>, source_line: usize) -> Self {
        Self { data, source_line }
    }

    /// Build a record from `(column, text)` pairs; `None` becomes JSON null
    pub fn from_pairs<'a, I>(pairs: I, source_line: usize) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let data = pairs
            .into_iter()
            .map(|(k, v)| {
                let value = v.map_or(Value::Null, |s| Value::String(s.to_string()));
                (k.to_string(), value)
            })
            .collect();
        Self::new(data, source_line)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }

    /// String content of a column, if it holds a non-null string
    pub fn text(&self, column: &str) -> Option<&str> {
        match self.data.get(column) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self, column: &str) -> bool {
        is_null_value(self.data.get(column))
    }

    /// Insert or overwrite a column value
    pub fn set(&mut self, column: &str, value: Value) {
        self.data.insert(column.to_string(), value);
    }
}

/// An ordered collection of records plus the column schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    /// Build a dataset whose columns are the union of record keys in first-seen order
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.data.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Append a column to the schema if it is not there yet
    pub fn ensure_column(&mut self, column: &str) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    /// New dataset with the same schema and the given records
    pub fn with_records(&self, records: Vec<Record>) -> Self {
        Self {
            columns: self.columns.clone(),
            records,
        }
    }

    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Fail if any of the required review columns is absent
    pub fn validate_required(&self) -> Result<()> {
        let missing = self.missing_columns(REQUIRED_COLUMNS);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingColumns(missing))
        }
    }
}
