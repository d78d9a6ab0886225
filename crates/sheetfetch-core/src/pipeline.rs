//! One download run: load → plan → fetch → record → write back.

use anyhow::{Context, Result};

use crate::config::SheetfetchConfig;
use crate::engine::DownloadEngine;
use crate::planner::{self, Plan, TableSummary};
use crate::recorder::{ProgressSink, Recorder, RunSummary};
use crate::table::{TableStore, Workbook};

/// What a run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Queued rows per table, as planned.
    pub planned: Vec<TableSummary>,
    pub summary: RunSummary,
    /// Highest number of simultaneous fetches observed.
    pub peak_in_flight: usize,
    /// False when nothing was planned and the store was left untouched.
    pub saved: bool,
}

/// Load the store and plan without fetching or writing anything.
pub fn plan_only(store: &dyn TableStore, cfg: &SheetfetchConfig) -> Result<(Workbook, Plan)> {
    let mut workbook = store
        .load()
        .with_context(|| format!("load tables from {}", store.location().display()))?;
    let plan = planner::plan(&mut workbook, &cfg.url_column)?;
    Ok((workbook, plan))
}

/// Run every pending row of `store` and persist the updated statuses.
///
/// Only setup problems (unreadable store, malformed table, failed write-back)
/// return `Err`; individual fetch failures are recorded in the rows.
pub async fn run_download(
    store: &dyn TableStore,
    cfg: &SheetfetchConfig,
    progress: &mut dyn ProgressSink,
) -> Result<RunReport> {
    let (mut workbook, plan) = plan_only(store, cfg)?;
    progress.planned(&plan.summary, plan.total());

    if plan.is_empty() {
        tracing::info!("nothing to do: all tables already completed");
        return Ok(RunReport {
            planned: plan.summary,
            summary: RunSummary::default(),
            peak_in_flight: 0,
            saved: false,
        });
    }

    tokio::fs::create_dir_all(&cfg.download_root)
        .await
        .with_context(|| format!("create download root {}", cfg.download_root.display()))?;

    let engine = DownloadEngine::new(cfg);
    tracing::info!(
        jobs = plan.total(),
        limit = engine.limit(),
        root = %cfg.download_root.display(),
        "starting downloads"
    );
    let Plan { jobs, summary: planned } = plan;
    let mut in_flight = engine.spawn_all(jobs);

    let summary = {
        let mut recorder = Recorder::new(&mut workbook, &cfg.url_column);
        recorder.record_all(&mut in_flight, progress).await?
    };

    store
        .save(&workbook)
        .with_context(|| format!("write tables back to {}", store.location().display()))?;
    tracing::info!(
        peak_in_flight = engine.gauge().peak(),
        "tables written back to {}",
        store.location().display()
    );

    Ok(RunReport {
        planned,
        summary,
        peak_in_flight: engine.gauge().peak(),
        saved: true,
    })
}
