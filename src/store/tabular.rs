//! Tabular payloads held by the artifact store.
//!
//! A [`Dataset`] is an ordered set of named, row-aligned columns. Cells are
//! typed individually when the CSV text is parsed, so a column may mix
//! integers, floats and strings exactly like the rows it was loaded from.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while parsing or serializing tabular text.
#[derive(Debug, Error)]
pub enum TabularError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset has no header row")]
    MissingHeader,

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
}

/// Markers read as missing values, on top of the empty cell.
const NULL_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
];

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl CellValue {
    /// Types a raw CSV field.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() || NULL_MARKERS.contains(&raw) {
            return CellValue::Null;
        }
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return CellValue::Float(f);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        CellValue::Str(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Bool(_) => "bool",
            CellValue::Int(_) => "int",
            CellValue::Float(_) => "float",
            CellValue::Str(_) => "str",
        }
    }

    /// Compares the cell against a JSON value supplied by a client.
    ///
    /// Integers and floats compare by numeric value; strings only match strings.
    pub fn matches_json(&self, value: &Value) -> bool {
        match (self, value) {
            (CellValue::Null, Value::Null) => true,
            (CellValue::Bool(a), Value::Bool(b)) => a == b,
            (CellValue::Str(a), Value::String(b)) => a == b,
            (CellValue::Int(_) | CellValue::Float(_), Value::Number(n)) => {
                match (self, n.as_i64()) {
                    (CellValue::Int(a), Some(b)) => *a == b,
                    _ => self.as_f64() == n.as_f64(),
                }
            }
            _ => false,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Int(i) => Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            CellValue::Str(s) => Value::String(s.clone()),
        }
    }

    /// Renders the cell so that [`CellValue::parse`] reads back the same type.
    fn to_csv_field(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Int(i) => i.to_string(),
            // Debug keeps the fractional part ("1.0"), Display would write "1"
            CellValue::Float(f) => format!("{:?}", f),
            CellValue::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv_field())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub fn non_null(&self) -> impl Iterator<Item = &CellValue> {
        self.values.iter().filter(|v| !v.is_null())
    }

    /// True when every non-null cell is numeric and there is at least one.
    pub fn is_numeric(&self) -> bool {
        let mut seen = false;
        for value in self.non_null() {
            if value.as_f64().is_none() {
                return false;
            }
            seen = true;
        }
        seen
    }
}

/// An immutable, column-oriented table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Parses CSV text with a mandatory header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, TabularError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(TabularError::MissingHeader);
        }

        let mut seen = HashSet::new();
        let mut columns: Vec<Column> = Vec::with_capacity(headers.len());
        for name in headers.iter() {
            if !seen.insert(name.to_string()) {
                return Err(TabularError::DuplicateColumn(name.to_string()));
            }
            columns.push(Column {
                name: name.to_string(),
                values: Vec::new(),
            });
        }

        let mut row_count = 0;
        for record in reader.records() {
            let record = record?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.values.push(CellValue::parse(field));
            }
            row_count += 1;
        }

        Ok(Dataset { columns, row_count })
    }

    pub fn from_csv_str(text: &str) -> Result<Self, TabularError> {
        Self::from_csv_reader(text.as_bytes())
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, TabularError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Serializes the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TabularError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in 0..self.row_count {
            writer.write_record(self.columns.iter().map(|c| c.values[row].to_csv_field()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
