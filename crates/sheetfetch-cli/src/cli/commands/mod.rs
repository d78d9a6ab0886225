//! CLI command handlers, one per file.

mod archive;
mod checksum;
mod completions;
mod download;
mod plan;

pub use archive::run_archive;
pub use checksum::run_checksum;
pub use completions::run_completions;
pub use download::run_download;
pub use plan::run_plan;
