//! Filename extraction from URL path.

/// Extracts the last path segment from a URL for use as a filename.
///
/// Parsed URLs use their path (query and fragment are ignored). Strings that
/// do not parse as URLs fall back to the text after the last `/`.
/// Returns `None` if no non-empty segment remains.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let segment = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string)?,
        Err(_) => {
            let without_query = url.split(['?', '#']).next().unwrap_or(url);
            without_query.rsplit('/').next()?.trim().to_string()
        }
    };
    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }
    Some(segment)
}
