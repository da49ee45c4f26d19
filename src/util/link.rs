use thiserror::Error;
use url::Url;

/// Reasons a fetched link is unusable as an article's canonical link
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
}

/// Parse a fetched article link, accepting only absolute http(s) URLs.
///
/// The returned string is the URL's serialized form, so trivially different
/// spellings (`HTTPS://Example.com` vs `https://example.com/`) dedup alike.
pub fn normalize_link(raw: &str) -> Result<String, LinkError> {
    let url = Url::parse(raw.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(LinkError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(LinkError::MissingHost);
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert_eq!(
            normalize_link("https://news.example.com/a?id=1").unwrap(),
            "https://news.example.com/a?id=1"
        );
        assert!(normalize_link("http://news.example.com/a").is_ok());
    }

    #[test]
    fn test_normalizes_case_and_trailing_slash() {
        assert_eq!(
            normalize_link("  HTTPS://News.Example.com  ").unwrap(),
            "https://news.example.com/"
        );
    }

    #[test]
    fn test_rejects_other_schemes_and_garbage() {
        assert!(matches!(
            normalize_link("ftp://example.com/a"),
            Err(LinkError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            normalize_link("javascript:alert(1)"),
            Err(LinkError::UnsupportedScheme(_))
        ));
        assert!(matches!(normalize_link("not a url"), Err(LinkError::InvalidUrl(_))));
        assert!(normalize_link("").is_err());
    }
}
