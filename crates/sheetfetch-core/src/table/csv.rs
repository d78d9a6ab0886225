//! CSV tables: one file per table, header row = columns, table name = file stem.

use std::path::{Path, PathBuf};

use super::{Cell, Table, TableError, TableStore, Workbook};
use crate::storage::PartFile;

/// Either a single `.csv` file (one table) or a directory of them.
pub struct CsvStore {
    path: PathBuf,
    is_dir: bool,
}

impl CsvStore {
    pub fn file(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            is_dir: false,
        }
    }

    pub fn directory(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            is_dir: true,
        }
    }

    fn table_files(&self) -> Result<Vec<PathBuf>, TableError> {
        if !self.is_dir {
            return Ok(vec![self.path.clone()]);
        }
        let entries = std::fs::read_dir(&self.path).map_err(|source| TableError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TableError::Io {
                path: self.path.clone(),
                source,
            })?;
            let p = entry.path();
            let is_csv = p
                .extension()
                .map(|e| e.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if is_csv && p.is_file() {
                files.push(p);
            }
        }
        files.sort();
        Ok(files)
    }

    /// File a table is written back to: the file it was loaded from when one
    /// exists (whatever the extension's case), else `<dir>/<table>.csv`.
    fn path_for(&self, table: &str, existing: &[PathBuf]) -> PathBuf {
        if !self.is_dir {
            return self.path.clone();
        }
        existing
            .iter()
            .find(|p| table_name(p) == table)
            .cloned()
            .unwrap_or_else(|| self.path.join(format!("{}.csv", table)))
    }
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_table(path: &Path) -> Result<Table, TableError> {
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let columns: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(Cell::text).collect());
    }
    Table::new(table_name(path), columns, rows)
}

fn write_table(path: &Path, table: &Table) -> Result<(), TableError> {
    let io_err = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let part = PartFile::create(path).map_err(io_err)?;
    let mut writer = ::csv::Writer::from_writer(part);
    writer.write_record(&table.columns).map_err(csv_err)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|c| c.to_string()))
            .map_err(csv_err)?;
    }
    let part = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
    part.finalize().map_err(io_err)?;
    Ok(())
}

impl TableStore for CsvStore {
    fn load(&self) -> Result<Workbook, TableError> {
        let tables = self
            .table_files()?
            .iter()
            .map(|p| read_table(p))
            .collect::<Result<Vec<_>, _>>()?;
        Workbook::new(tables)
    }

    fn save(&self, workbook: &Workbook) -> Result<(), TableError> {
        let existing = self.table_files()?;
        for table in &workbook.tables {
            write_table(&self.path_for(&table.name, &existing), table)?;
        }
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
