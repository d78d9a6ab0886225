//! `sheetfetch download` – plan, fetch, record, write back.

use anyhow::{Context, Result};
use sheetfetch_core::config::SheetfetchConfig;
use sheetfetch_core::pipeline;
use sheetfetch_core::table;
use std::path::Path;

use crate::cli::progress::BarProgress;

pub async fn run_download(store_path: &Path, cfg: &SheetfetchConfig) -> Result<()> {
    let store = table::open_store(store_path)
        .with_context(|| format!("open table store {}", store_path.display()))?;
    let mut progress = BarProgress::default();
    let report = pipeline::run_download(store.as_ref(), cfg, &mut progress).await?;

    if !report.saved {
        println!("Nothing to do: all tables already completed.");
        return Ok(());
    }
    println!("Statuses written back to {}", store.location().display());
    tracing::info!(
        ok = report.summary.ok,
        exists = report.summary.exists,
        failed = report.summary.failed,
        peak_in_flight = report.peak_in_flight,
        "download command finished"
    );
    Ok(())
}
