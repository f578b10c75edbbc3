//! HTTP access to the OData reporting API.

use std::{error::Error, fmt, time::Duration};

use futures::future::BoxFuture;
use odata_model::schema::ODATA_METADATA_PATH;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, Url};

/// Generous default so a cold-starting backend can answer.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub enum UpstreamError {
    InvalidBaseUrl(String),
    Status { status: u16, body: String },
    Transport(reqwest::Error),
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid OData base url: {value}"),
            Self::Status { status, body } => {
                write!(f, "OData API returned status {status}: {body}")
            }
            Self::Transport(err) => write!(f, "OData API request failed: {err}"),
        }
    }
}

impl Error for UpstreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

/// Raw upstream answer, passed through without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam between the reporting services and the OData API.
pub trait UpstreamSource: Send + Sync + 'static {
    /// Fetches the raw `$metadata` document.
    fn fetch_metadata(&self) -> BoxFuture<'_, Result<String, UpstreamError>>;

    /// Issues a GET for a path and query relative to the base address.
    fn get(&self, path_and_query: String) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamError>>;
}

/// Configuration for the OData API client.
#[derive(Debug, Clone)]
pub struct ODataClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ODataClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `reqwest`-backed client for the OData reporting API.
#[derive(Debug, Clone)]
pub struct ODataClient {
    client: Client,
    base_url: String,
}

impl ODataClient {
    /// Builds a client for the configured base address.
    ///
    /// # Errors
    /// Returns `UpstreamError::InvalidBaseUrl` for anything but an absolute
    /// http(s) URL, or `UpstreamError::Transport` if the client cannot be built.
    pub fn new(config: &ODataClientConfig) -> Result<Self, UpstreamError> {
        let base_url = normalize_base_url(&config.base_url)?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
    }
}

impl UpstreamSource for ODataClient {
    fn fetch_metadata(&self) -> BoxFuture<'_, Result<String, UpstreamError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url_for(ODATA_METADATA_PATH))
                .header(ACCEPT, "application/xml")
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UpstreamError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(response.text().await?)
        })
    }

    fn get(&self, path_and_query: String) -> BoxFuture<'_, Result<UpstreamResponse, UpstreamError>> {
        Box::pin(async move {
            let response = self.client.get(self.url_for(&path_and_query)).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(UpstreamResponse { status, body })
        })
    }
}

fn normalize_base_url(value: &str) -> Result<String, UpstreamError> {
    let trimmed = value.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|_| UpstreamError::InvalidBaseUrl(value.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(UpstreamError::InvalidBaseUrl(value.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ODataClient::new(&ODataClientConfig::new("http://localhost:7066/"))
            .expect("client should build");
        assert_eq!(client.base_url(), "http://localhost:7066");
        assert_eq!(
            client.url_for("/odata/Customers"),
            "http://localhost:7066/odata/Customers"
        );
    }

    #[test]
    fn rejects_non_http_base_urls() {
        for value in ["", "localhost:7066", "ftp://example.com", "not a url"] {
            let result = ODataClient::new(&ODataClientConfig::new(value));
            assert!(
                matches!(result, Err(UpstreamError::InvalidBaseUrl(_))),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn success_range_is_2xx() {
        let ok = UpstreamResponse {
            status: 204,
            body: String::new(),
        };
        let missing = UpstreamResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }
}
