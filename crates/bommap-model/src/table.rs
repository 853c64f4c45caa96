use std::collections::BTreeMap;

use crate::ColumnName;

/// A single cell. `Missing` is a cell that exists in the sheet but is blank;
/// a column that is entirely absent from a row has no entry in the row's
/// cell map at all. Callers that need the distinction check the map.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum CellValue {
    Text(String),
    Missing,
}

impl CellValue {
    /// Builds a cell from raw sheet text: trimmed, blank becomes `Missing`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Missing
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(value) => value,
            Self::Missing => "",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Row {
    pub cells: BTreeMap<ColumnName, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, column: &ColumnName) -> Option<&CellValue> {
        self.cells.get(column)
    }

    /// Cell text for a column; `None` when the column is absent from the row,
    /// `Some("")` when the cell is present but blank.
    pub fn text(&self, column: &ColumnName) -> Option<&str> {
        self.cells.get(column).map(CellValue::as_text)
    }

    pub fn set(&mut self, column: ColumnName, value: CellValue) {
        self.cells.insert(column, value);
    }
}

/// A rectangular table: ordered headers plus rows keyed by header name.
/// Header order is user-significant and preserved through every transform.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Table {
    pub headers: Vec<ColumnName>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<ColumnName>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn has_header(&self, column: &ColumnName) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Appends a header if it is not already present.
    pub fn ensure_header(&mut self, column: ColumnName) {
        if !self.has_header(&column) {
            self.headers.push(column);
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
