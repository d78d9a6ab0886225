//! Terminal progress: plan table, a bar over all jobs, one line per outcome.

use indicatif::{ProgressBar, ProgressStyle};
use sheetfetch_core::engine::Outcome;
use sheetfetch_core::planner::TableSummary;
use sheetfetch_core::recorder::{ProgressSink, RunSummary};

/// Per-table queued counts followed by a TOTAL line.
pub fn format_plan(summary: &[TableSummary], total: usize) -> String {
    let width = summary
        .iter()
        .map(|s| s.table.chars().count())
        .chain(std::iter::once("TOTAL".len()))
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for s in summary {
        out.push_str(&format!("{:<width$}  {:>6}\n", s.table, s.queued, width = width));
    }
    out.push_str(&format!("{:<width$}  {:>6}\n", "TOTAL", total, width = width));
    out
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  [{elapsed_precise}] [{bar:30.cyan/blue}] {pos:>5}/{len:5} {wide_msg:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Draws a bar on stderr and prints `status [table] url` above it per outcome.
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl ProgressSink for BarProgress {
    fn planned(&mut self, summary: &[TableSummary], total: usize) {
        print!("{}", format_plan(summary, total));
        if total > 0 {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(bar_style());
            self.bar = Some(bar);
        }
    }

    fn completed(&mut self, outcome: &Outcome, url: &str, done: usize, _total: usize) {
        let line = if outcome.reason.is_empty() {
            format!("{:<6} [{}] {}", outcome.status, outcome.table, url)
        } else {
            format!(
                "{:<6} [{}] {} ({})",
                outcome.status, outcome.table, url, outcome.reason
            )
        };
        match &self.bar {
            Some(bar) => {
                bar.println(line);
                bar.set_position(done as u64);
                bar.set_message(outcome.table.clone());
            }
            None => println!("{}", line),
        }
    }

    fn finished(&mut self, summary: &RunSummary) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        println!(
            "done: {} ok, {} exists, {} failed",
            summary.ok, summary.exists, summary.failed
        );
    }
}
