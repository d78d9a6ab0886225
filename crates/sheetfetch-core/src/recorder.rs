//! Outcome recorder: the only writer of table rows during a run.
//!
//! Outcomes arrive in completion order. Each one is applied to the row it
//! names by exact (table, row index), never searched, so arrival order has no
//! effect on which row is written.

use std::collections::HashMap;

use crate::engine::{FetchStatus, InFlight, Outcome};
use crate::planner::{TableSummary, REASON_COLUMN, STATUS_COLUMN};
use crate::table::{Cell, TableError, Workbook};

/// Per-status counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ok: usize,
    pub exists: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.ok + self.exists + self.failed
    }

    fn count(&mut self, status: FetchStatus) {
        match status {
            FetchStatus::Ok => self.ok += 1,
            FetchStatus::Exists => self.exists += 1,
            FetchStatus::Fail => self.failed += 1,
        }
    }
}

/// Receives run progress. The CLI draws a progress bar; [`LogProgress`] only logs.
pub trait ProgressSink: Send {
    /// Called once with the plan, before any fetch starts.
    fn planned(&mut self, _summary: &[TableSummary], _total: usize) {}

    /// Called once per recorded outcome; `done` counts outcomes recorded so far.
    fn completed(&mut self, outcome: &Outcome, url: &str, done: usize, total: usize);

    fn finished(&mut self, _summary: &RunSummary) {}
}

/// Progress sink that writes one log line per outcome.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn planned(&mut self, summary: &[TableSummary], total: usize) {
        for s in summary {
            tracing::info!(table = %s.table, queued = s.queued, "download plan");
        }
        tracing::info!(total, "download plan total");
    }

    fn completed(&mut self, outcome: &Outcome, url: &str, done: usize, total: usize) {
        tracing::info!(
            "[{}/{}] {:7} [{}] {}",
            done,
            total,
            outcome.status.as_str(),
            outcome.table,
            url
        );
    }

    fn finished(&mut self, summary: &RunSummary) {
        tracing::info!(
            ok = summary.ok,
            exists = summary.exists,
            failed = summary.failed,
            "download run finished"
        );
    }
}

struct TableColumns {
    table: usize,
    status: usize,
    reason: usize,
    url: Option<usize>,
}

/// Applies outcomes onto an in-memory workbook.
pub struct Recorder<'a> {
    workbook: &'a mut Workbook,
    columns: HashMap<String, TableColumns>,
}

impl<'a> Recorder<'a> {
    /// Index every table's bookkeeping columns, adding them if the planner has not.
    pub fn new(workbook: &'a mut Workbook, url_column: &str) -> Self {
        let mut columns = HashMap::with_capacity(workbook.tables.len());
        for (idx, table) in workbook.tables.iter_mut().enumerate() {
            let status = table.ensure_column(STATUS_COLUMN);
            let reason = table.ensure_column(REASON_COLUMN);
            columns.insert(
                table.name.clone(),
                TableColumns {
                    table: idx,
                    status,
                    reason,
                    url: table.column_index(url_column),
                },
            );
        }
        Self { workbook, columns }
    }

    /// Overwrite Status and Reason of the outcome's row. Returns the row's URL.
    pub fn apply(&mut self, outcome: &Outcome) -> Result<String, TableError> {
        let cols = self
            .columns
            .get(&outcome.table)
            .ok_or_else(|| TableError::UnknownTable(outcome.table.clone()))?;
        let table = &mut self.workbook.tables[cols.table];
        table.set(outcome.row, cols.status, Cell::text(outcome.status.as_str()))?;
        table.set(outcome.row, cols.reason, Cell::text(outcome.reason.clone()))?;
        let url = cols
            .url
            .and_then(|c| table.cell(outcome.row, c))
            .map(|c| c.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    /// Drain `in_flight`, applying each outcome as it arrives and reporting progress.
    pub async fn record_all(
        &mut self,
        in_flight: &mut InFlight,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunSummary, TableError> {
        let total = in_flight.total();
        let mut summary = RunSummary::default();
        while let Some(outcome) = in_flight.next().await {
            let url = self.apply(&outcome)?;
            summary.count(outcome.status);
            progress.completed(&outcome, &url, summary.total(), total);
        }
        if summary.total() != total {
            tracing::error!(
                recorded = summary.total(),
                total,
                "some jobs ended without an outcome; their rows keep the previous status"
            );
        }
        progress.finished(&summary);
        Ok(summary)
    }
}
