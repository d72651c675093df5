use hyper::header::{HeaderMap, CONTENT_LENGTH};

/// Formats a byte count the way the dashboard shows it, e.g. `4.5kb`.
pub fn size_label(bytes: u64) -> String {
    format!("{:.1}kb", bytes as f64 / 1024.0)
}

/// Reads a numeric `content-length` header, if present.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
