//! CLI for the sheetfetch table-driven downloader.

mod commands;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sheetfetch_core::config::{self, SheetfetchConfig};
use std::path::{Path, PathBuf};

use commands::{run_archive, run_checksum, run_completions, run_download, run_plan};

/// Top-level CLI for sheetfetch.
#[derive(Debug, Parser)]
#[command(name = "sheetfetch")]
#[command(about = "sheetfetch: resumable bulk downloads driven by URL tables", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/sheetfetch/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch every pending row of a table store and write statuses back.
    Download {
        /// Workbook (.json), single table (.csv), or directory of .csv tables.
        store: PathBuf,
        /// Maximum fetches in flight at once.
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Per-request timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Root folder for downloads; each table gets a sub-folder.
        #[arg(long, value_name = "DIR")]
        download_root: Option<PathBuf>,
        /// Column holding the URL in every table.
        #[arg(long, value_name = "NAME")]
        url_column: Option<String>,
    },

    /// Show how many rows each table would fetch, without fetching.
    Plan {
        /// Workbook (.json), single table (.csv), or directory of .csv tables.
        store: PathBuf,
        /// Column holding the URL in every table.
        #[arg(long, value_name = "NAME")]
        url_column: Option<String>,
    },

    /// Zip each table folder of the download root into its own archive.
    Archive {
        /// Root folder holding one sub-folder per table.
        #[arg(long, value_name = "DIR")]
        download_root: Option<PathBuf>,
        /// Where archives are written.
        #[arg(long, value_name = "DIR")]
        archive_root: Option<PathBuf>,
        /// Append _YYYYMMDD-HHMM to archive names.
        #[arg(long)]
        timestamp: bool,
    },

    /// Compute SHA-256 of a file (e.g. a download or an archive).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Print a shell completion script to stdout.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

fn load_config(path: Option<&Path>) -> Result<SheetfetchConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // These two never touch config.
        match &cli.command {
            CliCommand::Checksum { path } => return run_checksum(path),
            CliCommand::Completions { shell } => return run_completions(*shell),
            _ => {}
        }

        let mut cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Download {
                store,
                concurrency,
                timeout,
                download_root,
                url_column,
            } => {
                if let Some(n) = concurrency {
                    cfg.max_concurrent = n;
                }
                if let Some(secs) = timeout {
                    cfg.request_timeout_secs = secs;
                }
                if let Some(root) = download_root {
                    cfg.download_root = root;
                }
                if let Some(col) = url_column {
                    cfg.url_column = col;
                }
                run_download(&store, &cfg).await?;
            }
            CliCommand::Plan { store, url_column } => {
                if let Some(col) = url_column {
                    cfg.url_column = col;
                }
                run_plan(&store, &cfg)?;
            }
            CliCommand::Archive {
                download_root,
                archive_root,
                timestamp,
            } => {
                if let Some(root) = download_root {
                    cfg.download_root = root;
                }
                if let Some(root) = archive_root {
                    cfg.archive_root = root;
                }
                cfg.timestamp_archives |= timestamp;
                run_archive(&cfg)?;
            }
            CliCommand::Checksum { .. } | CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
