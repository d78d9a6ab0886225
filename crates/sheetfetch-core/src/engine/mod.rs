//! Download engine: bounded-concurrency fetches with per-job failure isolation.
//!
//! Every job is spawned up front. A job whose destination already exists
//! finishes as `exists` without touching the network or the limiter; all
//! others wait for a permit, then stream the body to disk on the blocking
//! pool. Each job yields exactly one [`Outcome`], in completion order.

mod error;
mod gauge;
mod transfer;

pub use error::FetchError;
pub use gauge::{GaugeGuard, InFlightGauge};
pub use transfer::TransferOptions;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::SheetfetchConfig;
use crate::planner::Job;
use crate::storage::Published;
use crate::url_model;

/// Final state of one job, as written to the Status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Destination was already on disk; nothing fetched.
    Exists,
    Ok,
    Fail,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Exists => "exists",
            FetchStatus::Ok => "ok",
            FetchStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one job: where to record it and what to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub table: String,
    pub row: usize,
    pub status: FetchStatus,
    /// Empty unless `status` is `Fail`.
    pub reason: String,
}

impl Outcome {
    fn new(job: &Job, status: FetchStatus, reason: String) -> Self {
        Self {
            table: job.table.clone(),
            row: job.row,
            status,
            reason,
        }
    }

    pub fn ok(job: &Job) -> Self {
        Self::new(job, FetchStatus::Ok, String::new())
    }

    pub fn exists(job: &Job) -> Self {
        Self::new(job, FetchStatus::Exists, String::new())
    }

    pub fn failed(job: &Job, err: &FetchError) -> Self {
        Self::new(job, FetchStatus::Fail, err.reason())
    }
}

/// Shared engine state; cheap to clone into each job task.
#[derive(Clone)]
pub struct DownloadEngine {
    download_root: PathBuf,
    limiter: Arc<Semaphore>,
    limit: usize,
    opts: TransferOptions,
    gauge: Arc<InFlightGauge>,
}

impl DownloadEngine {
    pub fn new(cfg: &SheetfetchConfig) -> Self {
        let limit = cfg.concurrency();
        if limit != cfg.max_concurrent {
            tracing::warn!(requested = cfg.max_concurrent, limit, "concurrency limit adjusted");
        }
        Self {
            download_root: cfg.download_root.clone(),
            limiter: Arc::new(Semaphore::new(limit)),
            limit,
            opts: TransferOptions {
                user_agent: cfg.user_agent.clone(),
                timeout: cfg.request_timeout(),
                buffer_size: cfg.chunk_size.max(1024),
            },
            gauge: Arc::new(InFlightGauge::new()),
        }
    }

    /// Maximum fetches allowed in flight.
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn gauge(&self) -> &InFlightGauge {
        &self.gauge
    }

    /// `download_root/<sanitized table>`.
    pub fn folder_for(&self, job: &Job) -> PathBuf {
        self.download_root
            .join(url_model::folder_for_table(&job.table))
    }

    /// `download_root/<sanitized table>/<filename from url>`.
    pub fn destination(&self, job: &Job) -> PathBuf {
        self.folder_for(job)
            .join(url_model::destination_filename(&job.url))
    }

    /// Run one job to completion. Never fails: every error becomes a `fail` outcome.
    pub async fn fetch(&self, job: &Job) -> Outcome {
        match self.try_fetch(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(table = %job.table, row = job.row, url = %job.url, "fetch failed: {}", e.reason());
                Outcome::failed(job, &e)
            }
        }
    }

    async fn try_fetch(&self, job: &Job) -> Result<Outcome, FetchError> {
        let folder = self.folder_for(job);
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(FetchError::Filesystem)?;

        let dest = folder.join(url_model::destination_filename(&job.url));
        if tokio::fs::try_exists(&dest)
            .await
            .map_err(FetchError::Filesystem)?
        {
            tracing::debug!(path = %dest.display(), "destination exists, skipping");
            return Ok(Outcome::exists(job));
        }
        transfer::check_url(&job.url)?;

        let _permit = Arc::clone(&self.limiter)
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Task("concurrency limiter closed".into()))?;
        let _running = self.gauge.enter();

        tracing::debug!(url = %job.url, path = %dest.display(), "fetch start");
        let url = job.url.clone();
        let opts = self.opts.clone();
        let published = tokio::task::spawn_blocking(move || transfer::download_to(&url, &dest, &opts))
            .await
            .map_err(|e| FetchError::Task(format!("fetch task: {}", e)))??;
        match published {
            Published::Written(bytes) => {
                tracing::debug!(url = %job.url, bytes, "fetch done");
                Ok(Outcome::ok(job))
            }
            Published::AlreadyExists => {
                // Another row of this run wrote the same destination first.
                tracing::debug!(url = %job.url, "destination appeared during fetch, keeping it");
                Ok(Outcome::exists(job))
            }
        }
    }

    /// Spawn every job at once; outcomes are pulled from the returned set as they complete.
    pub fn spawn_all(&self, jobs: Vec<Job>) -> InFlight {
        let engine = self.clone();
        spawn_jobs(jobs, move |job| {
            let engine = engine.clone();
            async move { engine.fetch(&job).await }
        })
    }
}

/// Run `fetch` for each job in its own task. A task that panics still yields
/// a `fail` outcome for its row.
fn spawn_jobs<F, Fut>(jobs: Vec<Job>, fetch: F) -> InFlight
where
    F: Fn(Job) -> Fut,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    let total = jobs.len();
    let mut set = JoinSet::new();
    for job in jobs {
        let inner = tokio::spawn(fetch(job.clone()));
        set.spawn(async move {
            match inner.await {
                Ok(outcome) => outcome,
                Err(e) => Outcome::failed(&job, &FetchError::Task(e.to_string())),
            }
        });
    }
    InFlight { set, total }
}

/// Jobs spawned by [`DownloadEngine::spawn_all`] that have not been collected yet.
pub struct InFlight {
    set: JoinSet<Outcome>,
    total: usize,
}

impl InFlight {
    /// Number of jobs spawned.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Jobs whose outcome has not been collected.
    pub fn remaining(&self) -> usize {
        self.set.len()
    }

    /// Next outcome in completion order; `None` once every job has been collected.
    pub async fn next(&mut self) -> Option<Outcome> {
        loop {
            match self.set.join_next().await? {
                Ok(outcome) => return Some(outcome),
                Err(e) => tracing::error!("job task join: {}", e),
            }
        }
    }
}
