//! `sheetfetch plan` – show pending rows per table without fetching.

use anyhow::{Context, Result};
use sheetfetch_core::config::SheetfetchConfig;
use sheetfetch_core::pipeline;
use sheetfetch_core::table;
use std::path::Path;

use crate::cli::progress::format_plan;

pub fn run_plan(store_path: &Path, cfg: &SheetfetchConfig) -> Result<()> {
    let store = table::open_store(store_path)
        .with_context(|| format!("open table store {}", store_path.display()))?;
    let (_, plan) = pipeline::plan_only(store.as_ref(), cfg)?;
    print!("{}", format_plan(&plan.summary, plan.total()));
    if plan.is_empty() {
        println!("Nothing to do: all tables already completed.");
    }
    Ok(())
}
