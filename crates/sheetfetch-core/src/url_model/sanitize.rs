//! Path segment sanitization.

/// Replaces characters that are illegal in common filesystem path segments
/// (`< > : " / \ | ? *` and control characters) with `_`.
///
/// Everything else, including spaces, is kept as is. A segment made only of
/// dots would escape its parent, so its dots are replaced as well.
pub fn sanitize_path_segment(name: &str) -> String {
    let out: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if !out.is_empty() && out.chars().all(|c| c == '.') {
        return "_".repeat(out.len());
    }
    out
}
