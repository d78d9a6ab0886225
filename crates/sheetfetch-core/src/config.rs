use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identifying User-Agent sent with every GET unless overridden in config.toml.
pub const DEFAULT_USER_AGENT: &str = concat!("sheetfetch/", env!("CARGO_PKG_VERSION"));

/// Upper bound for `max_concurrent`. Each fetch occupies a thread of the
/// runtime's blocking pool (512 by default), which `tokio::fs` shares.
pub const MAX_CONCURRENT: usize = 256;

/// Global configuration loaded from `~/.config/sheetfetch/config.toml`.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetfetchConfig {
    /// Maximum number of fetches in flight at once.
    pub max_concurrent: usize,
    /// Wall-clock timeout for a whole GET (connect + headers + body), in seconds.
    pub request_timeout_secs: u64,
    /// Root folder; each table gets a sub-folder.
    pub download_root: PathBuf,
    /// Where per-table zip archives are written.
    pub archive_root: PathBuf,
    /// Append `_YYYYMMDD-HHMM` to archive names.
    pub timestamp_archives: bool,
    /// User-Agent header value.
    pub user_agent: String,
    /// Column holding the source URL in every table.
    pub url_column: String,
    /// Receive buffer size handed to the transport, in bytes.
    pub chunk_size: usize,
}

impl Default for SheetfetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 20,
            request_timeout_secs: 60,
            download_root: PathBuf::from("downloads"),
            archive_root: PathBuf::from("archives"),
            timestamp_archives: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            url_column: "URL".to_string(),
            chunk_size: 8 * 1024,
        }
    }
}

impl SheetfetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Concurrency limit, between one permit and [`MAX_CONCURRENT`].
    pub fn concurrency(&self) -> usize {
        self.max_concurrent.clamp(1, MAX_CONCURRENT)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sheetfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SheetfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SheetfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file (e.g. `--config`). The file must exist.
pub fn load_from_path(path: &Path) -> Result<SheetfetchConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: SheetfetchConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
