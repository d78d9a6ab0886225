//! Per-table zip archives of the download tree.
//!
//! Each immediate sub-folder of the download root becomes
//! `archive_root/<folder>[_YYYYMMDD-HHMM].zip`. Empty folders are skipped.
//! Works purely on the filesystem, so it can run any time after downloads;
//! re-running overwrites archives of the same name.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::checksum;
use crate::config::SheetfetchConfig;
use crate::storage::{self, PartFile};

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub download_root: PathBuf,
    pub archive_root: PathBuf,
    /// Append `_YYYYMMDD-HHMM` (local time) to each archive name.
    pub timestamp: bool,
}

impl From<&SheetfetchConfig> for ArchiveOptions {
    fn from(cfg: &SheetfetchConfig) -> Self {
        Self {
            download_root: cfg.download_root.clone(),
            archive_root: cfg.archive_root.clone(),
            timestamp: cfg.timestamp_archives,
        }
    }
}

/// What happened to one download folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderResult {
    Archived {
        folder: String,
        archive: PathBuf,
        files: usize,
        sha256: String,
    },
    SkippedEmpty {
        folder: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    /// One entry per sub-folder, sorted by folder name.
    pub folders: Vec<FolderResult>,
}

impl ArchiveReport {
    /// Number of archives written.
    pub fn created(&self) -> usize {
        self.folders
            .iter()
            .filter(|f| matches!(f, FolderResult::Archived { .. }))
            .count()
    }
}

/// `_YYYYMMDD-HHMM` suffix for archive names.
pub fn timestamp_tag(now: DateTime<Local>) -> String {
    now.format("_%Y%m%d-%H%M").to_string()
}

/// `<folder><tag>.zip`
pub fn archive_name(folder: &str, tag: &str) -> String {
    format!("{}{}.zip", folder, tag)
}

/// Archive every non-empty sub-folder of `opts.download_root`.
///
/// A missing download root is an error; everything else about a folder is reported in the result.
pub fn archive_all(opts: &ArchiveOptions) -> Result<ArchiveReport> {
    if !opts.download_root.is_dir() {
        anyhow::bail!(
            "folder {} not found, nothing to archive",
            opts.download_root.display()
        );
    }
    fs::create_dir_all(&opts.archive_root)
        .with_context(|| format!("create archive root {}", opts.archive_root.display()))?;

    let tag = if opts.timestamp {
        timestamp_tag(Local::now())
    } else {
        String::new()
    };

    let mut folders: Vec<PathBuf> = fs::read_dir(&opts.download_root)
        .with_context(|| format!("read {}", opts.download_root.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    folders.sort();

    let mut report = ArchiveReport::default();
    for dir in folders {
        let folder = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !has_content(&dir)? {
            tracing::info!(folder = %folder, "skipping empty folder");
            report.folders.push(FolderResult::SkippedEmpty { folder });
            continue;
        }

        let archive = opts.archive_root.join(archive_name(&folder, &tag));
        let files = archive_folder(&dir, &archive)
            .with_context(|| format!("archive {} into {}", dir.display(), archive.display()))?;
        let sha256 = checksum::sha256_path(&archive)?;
        tracing::info!(folder = %folder, files, archive = %archive.display(), "archive written");
        report.folders.push(FolderResult::Archived {
            folder,
            archive,
            files,
            sha256,
        });
    }
    Ok(report)
}

/// True when `dir` holds anything besides leftover `.part` files.
fn has_content(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        if !storage::is_temp_file(&entry.path()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Zip the contents of `src` (recursively, paths relative to `src`) into `dest`.
/// Written to a temp file next to `dest` and moved over it on success.
/// Returns the number of files stored.
pub fn archive_folder(src: &Path, dest: &Path) -> Result<usize> {
    let part = PartFile::create(dest).with_context(|| format!("create temp file for {}", dest.display()))?;
    let (part, count) = write_zip(src, part)?;
    part.finalize()
        .with_context(|| format!("move archive onto {}", dest.display()))?;
    Ok(count)
}

fn write_zip(src: &Path, out: PartFile) -> Result<(PartFile, usize)> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let mut zip = ZipWriter::new(out);
    let mut count = 0usize;

    let mut stack = vec![src.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("read {}", dir.display()))?
            .map(|e| e.map(|e| e.path()))
            .collect::<io::Result<_>>()?;
        entries.sort();
        for path in entries {
            let name = entry_name(src, &path)?;
            if path.is_dir() {
                zip.add_directory(name, options)?;
                stack.push(path);
            } else if !storage::is_temp_file(&path) {
                zip.start_file(name, options)?;
                let mut f = File::open(&path).with_context(|| format!("open {}", path.display()))?;
                io::copy(&mut f, &mut zip).with_context(|| format!("compress {}", path.display()))?;
                count += 1;
            }
        }
    }

    let out = zip.finish()?;
    Ok((out, count))
}

/// Archive entry name: path relative to the archived folder, `/`-separated.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
