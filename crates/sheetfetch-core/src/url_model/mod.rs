//! Destination naming: table name → folder, URL → filename.
//!
//! Both are pure functions of their input so every run re-derives the same
//! destination path; the on-disk existence check relies on that.

mod path;
mod sanitize;

pub use path::filename_from_url_path;
pub use sanitize::sanitize_path_segment;

/// Filename used when the URL has no usable final path segment.
pub const FALLBACK_FILENAME: &str = "file";

/// Folder name for a table: reserved characters replaced with `_`.
pub fn folder_for_table(table: &str) -> String {
    sanitize_path_segment(table)
}

/// Filename for a URL: its last path segment, sanitized, or [`FALLBACK_FILENAME`].
///
/// # Examples
///
/// - `destination_filename("https://example.com/a/report.pdf")` → `"report.pdf"`
/// - `destination_filename("https://example.com/")` → `"file"`
pub fn destination_filename(url: &str) -> String {
    match filename_from_url_path(url) {
        Some(segment) if !segment.chars().all(|c| c == '.') => sanitize_path_segment(&segment),
        _ => FALLBACK_FILENAME.to_string(),
    }
}
