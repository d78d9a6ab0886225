//! JSON workbook: `{"tables": [{"name", "columns", "rows"}]}`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{TableError, TableStore, Workbook};
use crate::storage::PartFile;

pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn io_err(&self, source: std::io::Error) -> TableError {
        TableError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TableStore for JsonStore {
    fn load(&self) -> Result<Workbook, TableError> {
        let file = File::open(&self.path).map_err(|e| self.io_err(e))?;
        let mut wb: Workbook =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| TableError::Json {
                path: self.path.clone(),
                source,
            })?;
        wb.validate()?;
        Ok(wb)
    }

    fn save(&self, workbook: &Workbook) -> Result<(), TableError> {
        let part = PartFile::create(&self.path).map_err(|e| self.io_err(e))?;
        let mut out = BufWriter::new(part);
        serde_json::to_writer_pretty(&mut out, workbook).map_err(|source| TableError::Json {
            path: self.path.clone(),
            source,
        })?;
        out.write_all(b"\n").map_err(|e| self.io_err(e))?;
        let part = out.into_inner().map_err(|e| self.io_err(e.into_error()))?;
        part.finalize().map_err(|e| self.io_err(e))?;
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
