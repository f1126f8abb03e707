//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Column store: named, typed, immutable columns of equal length.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

/// Name of the implicit column holding the source row index.
pub const ENTRY_COLUMN: &str = "rdfentry_";

// ---------------------------------------------------------------------------
// Types and values
// ---------------------------------------------------------------------------

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    I64,
    F64,
    Str,
    /// Variable-length array of f64 per row (one event, many muons).
    F64Array,
}

impl DType {
    /// Bool, I64 and F64 can be fed to numeric aggregates.
    pub fn is_numeric(self) -> bool {
        matches!(self, DType::Bool | DType::I64 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::Bool => "BOOLEAN",
            DType::I64 => "BIGINT",
            DType::F64 => "DOUBLE",
            DType::Str => "VARCHAR",
            DType::F64Array => "DOUBLE[]",
        };
        f.write_str(s)
    }
}

/// A single row value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(Arc<str>),
    F64Array(Arc<[f64]>),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::Bool(_) => DType::Bool,
            Value::I64(_) => DType::I64,
            Value::F64(_) => DType::F64,
            Value::Str(_) => DType::Str,
            Value::F64Array(_) => DType::F64Array,
        }
    }

    /// Numeric view: booleans count as 0/1, integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            Value::F64Array(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::F64Array(a) => {
                f.write_str("[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::F64Array(Arc::from(v))
    }
}

// ---------------------------------------------------------------------------
// ColumnData: one typed vector
// ---------------------------------------------------------------------------

/// Values of one column, stored contiguously by type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Bool(Vec<bool>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Str(Vec<Arc<str>>),
    F64Array(Vec<Arc<[f64]>>),
}

impl ColumnData {
    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Bool(_) => DType::Bool,
            ColumnData::I64(_) => DType::I64,
            ColumnData::F64(_) => DType::F64,
            ColumnData::Str(_) => DType::Str,
            ColumnData::F64Array(_) => DType::F64Array,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Bool(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::F64(v) => v.len(),
            ColumnData::Str(v) => v.len(),
            ColumnData::F64Array(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row`, or None when out of range.
    pub fn get(&self, row: usize) -> Option<Value> {
        if row >= self.len() {
            return None;
        }
        Some(self.value_at(row))
    }

    /// Value at `row`. Callers guarantee `row < len()`.
    pub(crate) fn value_at(&self, row: usize) -> Value {
        match self {
            ColumnData::Bool(v) => Value::Bool(v[row]),
            ColumnData::I64(v) => Value::I64(v[row]),
            ColumnData::F64(v) => Value::F64(v[row]),
            ColumnData::Str(v) => Value::Str(v[row].clone()),
            ColumnData::F64Array(v) => Value::F64Array(v[row].clone()),
        }
    }
}

impl From<Vec<bool>> for ColumnData {
    fn from(v: Vec<bool>) -> Self {
        ColumnData::Bool(v)
    }
}

impl From<Vec<i64>> for ColumnData {
    fn from(v: Vec<i64>) -> Self {
        ColumnData::I64(v)
    }
}

impl From<Vec<f64>> for ColumnData {
    fn from(v: Vec<f64>) -> Self {
        ColumnData::F64(v)
    }
}

impl From<Vec<&str>> for ColumnData {
    fn from(v: Vec<&str>) -> Self {
        ColumnData::Str(v.into_iter().map(Arc::from).collect())
    }
}

impl From<Vec<String>> for ColumnData {
    fn from(v: Vec<String>) -> Self {
        ColumnData::Str(v.into_iter().map(Arc::from).collect())
    }
}

impl From<Vec<Vec<f64>>> for ColumnData {
    fn from(v: Vec<Vec<f64>>) -> Self {
        ColumnData::F64Array(v.into_iter().map(Arc::from).collect())
    }
}

// ---------------------------------------------------------------------------
// ColumnStore
// ---------------------------------------------------------------------------

/// A set of equally long, uniquely named columns.
///
/// The store is never mutated after construction; pipelines share it
/// behind an `Rc`.
#[derive(Debug, Clone, Default)]
pub struct ColumnStore {
    names: Vec<String>,
    columns: Vec<ColumnData>,
    index: HashMap<String, usize>,
    nrows: usize,
}

impl ColumnStore {
    /// Build a store from `(name, column)` pairs, keeping their order.
    pub fn new<N, I>(columns: I) -> Result<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, ColumnData)>,
    {
        let mut store = ColumnStore::default();
        for (name, data) in columns {
            store.push(name.into(), data)?;
        }
        debug!(
            ncols = store.ncols(),
            nrows = store.nrows,
            "column store created"
        );
        Ok(store)
    }

    fn push(&mut self, name: String, data: ColumnData) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("column name is empty".into()));
        }
        if name == ENTRY_COLUMN || self.index.contains_key(&name) {
            return Err(Error::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            self.nrows = data.len();
        } else if data.len() != self.nrows {
            return Err(Error::InvalidArgument(format!(
                "column '{name}' has {} rows, expected {}",
                data.len(),
                self.nrows
            )));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(data);
        Ok(())
    }

    /// Look up a column by name.
    pub fn get_column(&self, name: &str) -> Result<&ColumnData> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// Position of a column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn column_at(&self, idx: usize) -> &ColumnData {
        &self.columns[idx]
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in load order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    /// `(name, type)` pairs in load order.
    pub fn schema(&self) -> Vec<(String, DType)> {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(n, c)| (n.clone(), c.dtype()))
            .collect()
    }

    /// Read a CSV file with a header row and inferred column types.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_csv_opts(path, &CsvOptions::default())
    }

    /// Read a CSV file with custom options.
    ///
    /// Pass `column_types: None` to infer each column's type from its cells.
    pub fn read_csv_opts(path: impl AsRef<Path>, opts: &CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(false)
            .from_reader(std::io::BufReader::new(file));

        let mut records = reader.records();
        let first = match records.next() {
            Some(rec) => rec.map_err(csv_err)?,
            None => {
                return Err(Error::InvalidArgument(format!(
                    "{} is empty",
                    path.display()
                )))
            }
        };

        let mut rows: Vec<Vec<String>> = Vec::new();
        let names: Vec<String> = if opts.has_header {
            first.iter().map(|s| s.trim().to_string()).collect()
        } else {
            rows.push(first.iter().map(str::to_string).collect());
            (0..first.len()).map(|i| format!("Column{}", i + 1)).collect()
        };
        for rec in records {
            let rec = rec.map_err(csv_err)?;
            rows.push(rec.iter().map(str::to_string).collect());
        }

        if let Some(types) = &opts.column_types {
            if types.len() != names.len() {
                return Err(Error::InvalidArgument(format!(
                    "{} column types given for {} columns",
                    types.len(),
                    names.len()
                )));
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for (ci, name) in names.into_iter().enumerate() {
            let cells: Vec<&str> = rows.iter().map(|r| r[ci].trim()).collect();
            let dtype = match &opts.column_types {
                Some(types) => types[ci],
                None => infer_type(&cells),
            };
            let data = parse_cells(&name, &cells, dtype)?;
            columns.push((name, data));
        }
        let store = ColumnStore::new(columns)?;
        debug!(path = %path.display(), nrows = store.nrows(), "csv loaded");
        Ok(store)
    }
}

// ---------------------------------------------------------------------------
// CSV loading
// ---------------------------------------------------------------------------

/// Options for [`ColumnStore::read_csv_opts`].
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// First record holds column names; otherwise columns are `Column1..N`.
    pub has_header: bool,
    /// Explicit per-column types, in file order.
    pub column_types: Option<Vec<DType>>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: b',',
            has_header: true,
            column_types: None,
        }
    }
}

fn csv_err(e: csv::Error) -> Error {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => Error::Io(io),
        kind => Error::Parse(format!("{kind:?}")),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse `[1.0 2.5 3]` (space or `;` separated) into an array.
fn parse_array(s: &str) -> Option<Vec<f64>> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?;
    inner
        .split(|c: char| c.is_whitespace() || c == ';')
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<f64>().ok())
        .collect()
}

fn infer_type(cells: &[&str]) -> DType {
    if cells.is_empty() {
        return DType::Str;
    }
    if cells.iter().all(|c| c.parse::<i64>().is_ok()) {
        DType::I64
    } else if cells.iter().all(|c| c.parse::<f64>().is_ok()) {
        DType::F64
    } else if cells.iter().all(|c| parse_bool(c).is_some()) {
        DType::Bool
    } else if cells.iter().all(|c| parse_array(c).is_some()) {
        DType::F64Array
    } else {
        DType::Str
    }
}

fn parse_cells(name: &str, cells: &[&str], dtype: DType) -> Result<ColumnData> {
    let bad = |row: usize, cell: &str| {
        Error::Parse(format!(
            "column '{name}' row {row}: cannot parse '{cell}' as {dtype}"
        ))
    };
    Ok(match dtype {
        DType::Bool => ColumnData::Bool(
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| parse_bool(c).ok_or_else(|| bad(i, *c)))
                .collect::<Result<_>>()?,
        ),
        DType::I64 => ColumnData::I64(
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| c.parse::<i64>().map_err(|_| bad(i, *c)))
                .collect::<Result<_>>()?,
        ),
        DType::F64 => ColumnData::F64(
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| c.parse::<f64>().map_err(|_| bad(i, *c)))
                .collect::<Result<_>>()?,
        ),
        DType::Str => ColumnData::Str(cells.iter().map(|c| Arc::from(*c)).collect()),
        DType::F64Array => ColumnData::F64Array(
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| parse_array(c).map(Arc::from).ok_or_else(|| bad(i, *c)))
                .collect::<Result<_>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_column_unknown() {
        let store = ColumnStore::new([("x", ColumnData::from(vec![1i64, 2, 3]))]).unwrap();
        assert_eq!(store.nrows(), 3);
        assert!(store.get_column("x").is_ok());
        assert!(matches!(
            store.get_column("y"),
            Err(Error::UnknownColumn(name)) if name == "y"
        ));
    }

    #[test]
    fn rejects_ragged_and_duplicate_columns() {
        let err = ColumnStore::new([
            ("a", ColumnData::from(vec![1i64, 2])),
            ("b", ColumnData::from(vec![1.0, 2.0, 3.0])),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = ColumnStore::new([
            ("a", ColumnData::from(vec![1i64])),
            ("a", ColumnData::from(vec![2i64])),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(_)));

        let err = ColumnStore::new([(ENTRY_COLUMN, ColumnData::from(vec![1i64]))]).unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(_)));
    }

    #[test]
    fn infer_types() {
        assert_eq!(infer_type(&["1", "-2"]), DType::I64);
        assert_eq!(infer_type(&["1", "2.5"]), DType::F64);
        assert_eq!(infer_type(&["true", "FALSE"]), DType::Bool);
        assert_eq!(infer_type(&["[1 2]", "[]"]), DType::F64Array);
        assert_eq!(infer_type(&["a", "1"]), DType::Str);
    }

    #[test]
    fn array_cells() {
        assert_eq!(parse_array("[1.5 2;3]"), Some(vec![1.5, 2.0, 3.0]));
        assert_eq!(parse_array("[]"), Some(vec![]));
        assert_eq!(parse_array("1 2"), None);
        assert_eq!(parse_array("[a]"), None);
    }

    #[test]
    fn value_views() {
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::I64(3).as_f64(), Some(3.0));
        assert_eq!(Value::from("s").as_f64(), None);
        assert_eq!(Value::from(vec![1.0, 2.0]).to_string(), "[1 2]");
    }
}
