//! Work planner: decide which rows need a fetch.
//!
//! Every table gets `Status` and `Reason` columns (added empty when missing).
//! A row is selected when its Status is empty, not a string, or starts with
//! `fail`; rows marked `ok` or `exists` are done and never re-fetched.

use crate::table::{Cell, TableError, Workbook};

pub const STATUS_COLUMN: &str = "Status";
pub const REASON_COLUMN: &str = "Reason";

/// One row to fetch. Produced by the planner, consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub url: String,
    pub table: String,
    pub row: usize,
}

/// Selected row count for one table (0 when the table is complete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub table: String,
    pub queued: usize,
}

/// Jobs for all tables plus the per-table counts, both in table order.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub jobs: Vec<Job>,
    pub summary: Vec<TableSummary>,
}

impl Plan {
    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// True when a row with this Status must be (re)fetched.
pub fn needs_work(status: Option<&Cell>) -> bool {
    match status {
        Some(Cell::Text(s)) => s.is_empty() || s.starts_with("fail"),
        // Missing or non-string values (null, numbers, booleans).
        _ => true,
    }
}

/// Ensure bookkeeping columns exist and collect the rows needing work.
///
/// A table with rows to fetch but without `url_column` is malformed and
/// aborts planning.
pub fn plan(workbook: &mut Workbook, url_column: &str) -> Result<Plan, TableError> {
    let mut plan = Plan::default();
    for table in &mut workbook.tables {
        let status_idx = table.ensure_column(STATUS_COLUMN);
        table.ensure_column(REASON_COLUMN);

        let selected: Vec<usize> = (0..table.len())
            .filter(|&row| needs_work(table.cell(row, status_idx)))
            .collect();

        if !selected.is_empty() {
            let url_idx =
                table
                    .column_index(url_column)
                    .ok_or_else(|| TableError::MissingColumn {
                        table: table.name.clone(),
                        column: url_column.to_string(),
                    })?;
            for &row in &selected {
                let url = table
                    .cell(row, url_idx)
                    .map(|c| c.to_string().trim().to_string())
                    .unwrap_or_default();
                plan.jobs.push(Job {
                    url,
                    table: table.name.clone(),
                    row,
                });
            }
        }

        tracing::debug!(table = %table.name, queued = selected.len(), rows = table.len(), "planned table");
        plan.summary.push(TableSummary {
            table: table.name.clone(),
            queued: selected.len(),
        });
    }
    Ok(plan)
}
