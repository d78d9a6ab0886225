//! In-memory workbook (named tables of rows) and the stores that load and save it.
//!
//! A workbook is loaded once at the start of a run, mutated in place by the
//! outcome recorder, and written back in full to the same location at the end.

mod cell;
mod csv;
mod json;

pub use self::csv::CsvStore;
pub use self::json::JsonStore;
pub use cell::Cell;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Store and planner setup failures. These abort the whole run.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("table store {} not found", .0.display())]
    NotFound(PathBuf),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: invalid workbook: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}: invalid csv: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },
    #[error("duplicate table name {0:?}")]
    DuplicateTable(String),
    #[error("table {table:?} row {row} has {width} cells but only {columns} columns")]
    RaggedRow {
        table: String,
        row: usize,
        width: usize,
        columns: usize,
    },
    #[error("table {table:?} has no {column:?} column")]
    MissingColumn { table: String, column: String },
    #[error("table {table:?} has no row {row}")]
    UnknownRow { table: String, row: usize },
    #[error("no table named {0:?}")]
    UnknownTable(String),
}

/// One named table: a column schema and positional rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table, padding short rows with empty cells.
    /// Rows wider than the schema are rejected.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, TableError> {
        let mut table = Self {
            name: name.into(),
            columns,
            rows,
        };
        table.normalize()?;
        Ok(table)
    }

    pub(crate) fn normalize(&mut self) -> Result<(), TableError> {
        let width = self.columns.len();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if row.len() > width {
                return Err(TableError::RaggedRow {
                    table: self.name.clone(),
                    row: i,
                    width: row.len(),
                    columns: width,
                });
            }
            row.resize(width, Cell::Empty);
        }
        Ok(())
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Index of `column`, appending it (filled with `""`) when absent.
    /// Existing cells and row order are left untouched.
    pub fn ensure_column(&mut self, column: &str) -> usize {
        if let Some(idx) = self.column_index(column) {
            return idx;
        }
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.push(Cell::text(""));
        }
        self.columns.len() - 1
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Cell value by column name (`None` when either the row or the column is missing).
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        self.cell(row, self.column_index(column)?)
    }

    pub fn set(&mut self, row: usize, column: usize, value: Cell) -> Result<(), TableError> {
        let name = &self.name;
        let slot = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(column))
            .ok_or_else(|| TableError::UnknownRow {
                table: name.clone(),
                row,
            })?;
        *slot = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// All tables of one store, in store order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub tables: Vec<Table>,
}

impl Workbook {
    /// Build a workbook; table names must be unique.
    pub fn new(tables: Vec<Table>) -> Result<Self, TableError> {
        let mut wb = Self { tables };
        wb.validate()?;
        Ok(wb)
    }

    pub(crate) fn validate(&mut self) -> Result<(), TableError> {
        let mut seen = std::collections::HashSet::new();
        for table in &mut self.tables {
            if !seen.insert(table.name.clone()) {
                return Err(TableError::DuplicateTable(table.name.clone()));
            }
            table.normalize()?;
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }
}

/// Loads and persists a [`Workbook`] at one location.
pub trait TableStore: Send + Sync {
    fn load(&self) -> Result<Workbook, TableError>;

    /// Overwrite the store with every table of `workbook`.
    fn save(&self, workbook: &Workbook) -> Result<(), TableError>;

    fn location(&self) -> &Path;
}

/// Pick a store for `path`: a directory of `.csv` tables, a single `.csv`
/// table, or a JSON workbook (anything else).
pub fn open_store(path: &Path) -> Result<Box<dyn TableStore>, TableError> {
    if !path.exists() {
        return Err(TableError::NotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        return Ok(Box::new(CsvStore::directory(path)));
    }
    let is_csv = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        Ok(Box::new(CsvStore::file(path)))
    } else {
        Ok(Box::new(JsonStore::new(path)))
    }
}
