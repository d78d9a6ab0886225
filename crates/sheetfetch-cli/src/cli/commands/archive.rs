//! `sheetfetch archive` – one zip per table folder.

use anyhow::Result;
use sheetfetch_core::archiver::{self, ArchiveOptions, FolderResult};
use sheetfetch_core::config::SheetfetchConfig;

pub fn run_archive(cfg: &SheetfetchConfig) -> Result<()> {
    let report = archiver::archive_all(&ArchiveOptions::from(cfg))?;
    for folder in &report.folders {
        match folder {
            FolderResult::Archived {
                archive,
                files,
                sha256,
                ..
            } => println!("{}  {} ({} files)", sha256, archive.display(), files),
            FolderResult::SkippedEmpty { folder } => println!("skipped empty folder {}", folder),
        }
    }
    println!("Created {} archive(s).", report.created());
    Ok(())
}
