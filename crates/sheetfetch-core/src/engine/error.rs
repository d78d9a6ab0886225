//! Per-fetch failure taxonomy.

use std::fmt;

/// Why a single fetch failed. Never escapes the job: the engine turns it
/// into a `fail` outcome whose reason is [`FetchError::reason`].
#[derive(Debug)]
pub enum FetchError {
    /// URL is not an absolute http(s) URL.
    InvalidUrl(String),
    /// Connection, DNS, TLS or transfer failure reported by curl.
    Network(curl::Error),
    /// The whole-request timeout expired.
    Timeout(curl::Error),
    /// Response status outside 2xx.
    HttpStatus(u32),
    /// Creating the folder, writing the body or renaming the temp file failed.
    Filesystem(std::io::Error),
    /// The fetch task ended without producing a result.
    Task(String),
}

impl FetchError {
    /// Classify a curl error (timeouts are kept apart from other network errors).
    pub fn from_curl(e: curl::Error) -> Self {
        if e.is_operation_timedout() {
            FetchError::Timeout(e)
        } else {
            FetchError::Network(e)
        }
    }

    /// Tag naming the error kind, used as the prefix of the recorded reason.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl(_) => "InvalidURL",
            FetchError::Network(_) => "NetworkError",
            FetchError::Timeout(_) => "TimeoutError",
            FetchError::HttpStatus(_) => "HTTPError",
            FetchError::Filesystem(_) => "FilesystemError",
            FetchError::Task(_) => "TaskError",
        }
    }

    /// `"<kind>: <detail>"`, e.g. `HTTPError: 404`.
    pub fn reason(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidUrl(url) => write!(f, "{:?}", url),
            FetchError::Network(e) | FetchError::Timeout(e) => write!(f, "{}", e),
            FetchError::HttpStatus(code) => write!(f, "{}", code),
            FetchError::Filesystem(e) => write!(f, "{}", e),
            FetchError::Task(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Network(e) | FetchError::Timeout(e) => Some(e),
            FetchError::Filesystem(e) => Some(e),
            FetchError::InvalidUrl(_) | FetchError::HttpStatus(_) | FetchError::Task(_) => None,
        }
    }
}
