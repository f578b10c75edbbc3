//! Base URL validation shared by the model and relay clients.

use reqwest::Url;

/// Trims whitespace and trailing slashes from an absolute http(s) URL.
///
/// Returns `None` for anything without an http(s) scheme and a host.
#[must_use]
pub fn normalize_base_url(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_and_whitespace_are_trimmed() {
        assert_eq!(
            normalize_base_url(" http://127.0.0.1:4010/ ").as_deref(),
            Some("http://127.0.0.1:4010")
        );
        assert_eq!(
            normalize_base_url("https://contoso.openai.azure.com/").as_deref(),
            Some("https://contoso.openai.azure.com")
        );
    }

    #[test]
    fn non_http_or_hostless_values_are_rejected() {
        for value in ["", "127.0.0.1:4010", "localhost:4010", "ftp://example.com", "http://", "httpfoo"] {
            assert!(normalize_base_url(value).is_none(), "{value:?} should be rejected");
        }
    }
}
