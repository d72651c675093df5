use url::Url;

/// Normalizes a user supplied target into an absolute http(s) URL.
///
/// Inputs without a scheme get `https://` prepended. Other schemes and
/// host-less URLs are rejected with a human readable reason.
pub fn normalize_target(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("URL is empty".to_string());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&candidate).map_err(|e| format!("{}: {}", trimmed, e))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(format!("{}: URL has no host", trimmed));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_https() {
        let url = normalize_target("example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_keeps_explicit_scheme() {
        let url = normalize_target("http://example.com/a?b=1").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.path(), "/a");
        assert_eq!(url.query(), Some("b=1"));
    }

    #[test]
    fn test_trims_whitespace() {
        let url = normalize_target("  example.com/path ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/path");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(normalize_target("ftp://example.com").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(normalize_target("").is_err());
        assert!(normalize_target("   ").is_err());
        assert!(normalize_target("http://").is_err());
        assert!(normalize_target("exa mple.com").is_err());
    }
}
