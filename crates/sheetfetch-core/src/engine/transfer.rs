//! Blocking HTTP GET streamed into a `.part` file.
//!
//! Runs on the tokio blocking pool while the caller holds a limiter permit.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use super::FetchError;
use crate::storage::{PartFile, Published};

/// Transport settings shared by every fetch of a run.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub user_agent: String,
    /// Covers connect, headers and body.
    pub timeout: Duration,
    /// Receive buffer size; the body reaches disk in pieces of at most this size.
    pub buffer_size: usize,
}

/// Only absolute http(s) URLs are fetched.
pub(super) fn check_url(url: &str) -> Result<(), FetchError> {
    match url::Url::parse(url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Ok(()),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

/// GET `url` into `dest`. The body goes to a temp file of its own next to
/// `dest` and is moved onto `dest` only after a 2xx transfer completed and
/// only if nothing is there yet; on any failure the temp file is removed.
pub(super) fn download_to(
    url: &str,
    dest: &Path,
    opts: &TransferOptions,
) -> Result<Published, FetchError> {
    let mut part = PartFile::create(dest).map_err(FetchError::Filesystem)?;
    match perform(url, opts, &mut part) {
        Ok(()) => part.publish_new().map_err(FetchError::Filesystem),
        Err(e) => {
            part.discard();
            Err(e)
        }
    }
}

fn perform(url: &str, opts: &TransferOptions, part: &mut PartFile) -> Result<(), FetchError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(FetchError::from_curl)?;
    easy.follow_location(true).map_err(FetchError::from_curl)?;
    easy.max_redirections(10).map_err(FetchError::from_curl)?;
    easy.useragent(&opts.user_agent)
        .map_err(FetchError::from_curl)?;
    easy.timeout(opts.timeout).map_err(FetchError::from_curl)?;
    easy.buffer_size(opts.buffer_size)
        .map_err(FetchError::from_curl)?;
    // Stop at the first >= 400 status instead of saving an error page.
    easy.fail_on_error(true).map_err(FetchError::from_curl)?;

    let mut write_error: Option<std::io::Error> = None;
    let perform_result = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match part.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    write_error = Some(e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(FetchError::from_curl)?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if let Some(io_err) = write_error.take() {
            return Err(FetchError::Filesystem(io_err));
        }
        if e.is_http_returned_error() {
            let code = easy.response_code().unwrap_or(0);
            return Err(FetchError::HttpStatus(code));
        }
        return Err(FetchError::from_curl(e));
    }

    let code = easy.response_code().map_err(FetchError::from_curl)?;
    if !(200..300).contains(&code) {
        return Err(FetchError::HttpStatus(code));
    }
    Ok(())
}
