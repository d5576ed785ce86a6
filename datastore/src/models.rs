use serde::{Deserialize, Serialize};
use tracer::{labels::ROW_KEY, TracedResponse};

/// A single value of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Column family.
    pub family: String,
    /// Column qualifier.
    pub qualifier: String,
    /// Value.
    pub value: String,
}

/// A row with its cells, ordered by family and qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Row key.
    pub key: String,
    /// Cells of the row.
    pub cells: Vec<Cell>,
}

impl Row {
    /// Value of the cell `family:qualifier`.
    pub fn cell(&self, family: &str, qualifier: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.family == family && c.qualifier == qualifier)
            .map(|c| c.value.as_str())
    }
}

impl TracedResponse for Row {
    fn operation_label(&self) -> Option<(&'static str, String)> {
        Some((ROW_KEY, self.key.clone()))
    }
}

/// Cells to write into a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMutation {
    /// Target table.
    pub table: String,
    /// Target row key.
    pub key: String,
    /// Cells to set; existing cells with the same column are overwritten.
    pub cells: Vec<Cell>,
}

impl RowMutation {
    /// An empty mutation of row `key` in `table`.
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            cells: Vec::new(),
        }
    }

    /// Adds a cell to set.
    pub fn set_cell(
        mut self,
        family: impl Into<String>,
        qualifier: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.cells.push(Cell {
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
        });
        self
    }
}

/// Scan over a table in row key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Table to scan.
    pub table: String,
    /// Maximum number of rows returned.
    pub limit: Option<usize>,
}

impl Query {
    /// A full scan of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            limit: None,
        }
    }

    /// Caps the number of returned rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
