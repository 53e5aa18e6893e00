/// Trim whitespace and strip any residual wrapping quotes.
///
/// Returns `None` (the missing marker) when nothing is left.
pub fn clean_field(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Like [`clean_field`] but keeps an empty header name as `""` so column
/// positions stay aligned.
pub fn clean_header(raw: &str) -> String {
    clean_field(raw.trim_start_matches('\u{FEFF}')).unwrap_or_default()
}
