//! Destination file lifecycle.
//!
//! Each writer gets its own uniquely named `.<name>.XXXXXX.part` file in the
//! destination folder and only moves it onto the final path once the write
//! completed, so a file at the final path is always whole. Two writers aiming
//! at the same destination never share a temp file. A dropped writer removes
//! its temp file; a killed process leaves a `.part` file that nothing reads.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Suffix shared by every temp file.
pub const TEMP_SUFFIX: &str = ".part";

/// True for temp files of an unfinished write.
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(TEMP_SUFFIX))
        .unwrap_or(false)
}

/// Result of [`PartFile::publish_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    /// The file was moved onto the final path; carries the byte count.
    Written(u64),
    /// Another writer got there first. The temp file was removed and the
    /// existing file left untouched.
    AlreadyExists,
}

/// Sequential writer for one destination file.
pub struct PartFile {
    file: NamedTempFile,
    final_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create a fresh temp file next to `final_path`.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let dir = match final_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)?;
        Ok(Self {
            file,
            final_path: final_path.to_path_buf(),
            written: 0,
        })
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Sync and atomically replace the final path. Returns the byte count.
    pub fn finalize(self) -> io::Result<u64> {
        self.file.as_file().sync_all()?;
        self.file
            .persist(&self.final_path)
            .map_err(|e| e.error)?;
        Ok(self.written)
    }

    /// Sync and move onto the final path unless something is already there.
    pub fn publish_new(self) -> io::Result<Published> {
        self.file.as_file().sync_all()?;
        match self.file.persist_noclobber(&self.final_path) {
            Ok(_) => Ok(Published::Written(self.written)),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                drop(e.file);
                Ok(Published::AlreadyExists)
            }
            Err(e) => Err(e.error),
        }
    }

    /// Remove the temp file without touching the final path.
    pub fn discard(self) {
        let temp_path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("could not remove {}: {}", temp_path.display(), e);
            }
        }
    }

    fn inner(&mut self) -> &mut File {
        self.file.as_file_mut()
    }
}

impl Write for PartFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner().write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner().flush()
    }
}

// Zip output seeks back to patch local headers.
impl Seek for PartFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner().seek(pos)
    }
}
