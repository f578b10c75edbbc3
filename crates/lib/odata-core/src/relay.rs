//! Forwards raw OData queries to the reporting API.
//!
//! Query parsing is left entirely to the upstream OData middleware; the relay
//! only joins the query onto the `/odata` prefix and passes the answer back.

use std::sync::Arc;

use odata_model::schema::odata_path;
use reqwest::StatusCode;
use tracing::{error, info, warn};

use crate::upstream::UpstreamSource;

pub const MISSING_QUERY_MESSAGE: &str =
    "Error: 'query' parameter not provided. Expected format: /EntitySet?$filter=...&$select=...";

/// Result of relaying one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Success { status: u16, body: String },
    Failed { status: u16, body: String },
    MissingQuery,
    Unreachable(String),
}

impl QueryOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Upstream status code, when the upstream answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } | Self::Failed { status, .. } => Some(*status),
            Self::MissingQuery | Self::Unreachable(_) => None,
        }
    }

    /// Text handed back to the caller: the body on success, an `Error:` line otherwise.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Success { body, .. } => body,
            Self::Failed { status, body } => {
                format!(
                    "Error: Query failed with status {}. Details: {body}",
                    describe_status(status)
                )
            }
            Self::MissingQuery => MISSING_QUERY_MESSAGE.to_string(),
            Self::Unreachable(message) => format!("Error: {message}"),
        }
    }
}

/// Ensures the query starts with `/`; everything else is forwarded unmodified.
pub fn normalize_query(raw: &str) -> String {
    if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    }
}

pub struct QueryRelay<S: UpstreamSource> {
    source: Arc<S>,
}

impl<S: UpstreamSource> Clone for QueryRelay<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<S: UpstreamSource> QueryRelay<S> {
    pub const fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Relays `query` to `/odata{query}`.
    pub async fn execute(&self, query: Option<&str>) -> QueryOutcome {
        let Some(query) = query else {
            warn!("query parameter not provided");
            return QueryOutcome::MissingQuery;
        };

        info!("executing OData query: {query}");
        let path = odata_path(&normalize_query(query));
        match self.source.get(path).await {
            Ok(response) if response.is_success() => {
                info!("query executed successfully");
                QueryOutcome::Success {
                    status: response.status,
                    body: response.body,
                }
            }
            Ok(response) => {
                warn!(
                    "query failed with status {}: {}",
                    response.status, response.body
                );
                QueryOutcome::Failed {
                    status: response.status,
                    body: response.body,
                }
            }
            Err(err) => {
                error!("error relaying OData query: {err}");
                QueryOutcome::Unreachable(err.to_string())
            }
        }
    }
}

fn describe_status(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map_or_else(|| status.to_string(), |reason| format!("{status} ({reason})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_slash_is_added_once() {
        assert_eq!(normalize_query("Customers?$top=5"), "/Customers?$top=5");
        assert_eq!(normalize_query("/Customers?$top=5"), "/Customers?$top=5");
        assert_eq!(normalize_query(""), "/");
    }

    #[test]
    fn failure_text_carries_status_and_body() {
        let text = QueryOutcome::Failed {
            status: 400,
            body: "bad $filter".to_string(),
        }
        .into_text();
        assert_eq!(
            text,
            "Error: Query failed with status 400 (Bad Request). Details: bad $filter"
        );
    }

    #[test]
    fn unknown_status_codes_render_as_numbers() {
        assert_eq!(describe_status(599), "599");
    }

    #[test]
    fn success_text_is_body_verbatim() {
        let body = r#"{"value":[{"CustomerId":1}]}"#.to_string();
        let outcome = QueryOutcome::Success {
            status: 200,
            body: body.clone(),
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.status(), Some(200));
        assert_eq!(outcome.into_text(), body);
    }

    #[test]
    fn missing_query_has_no_status() {
        assert_eq!(QueryOutcome::MissingQuery.status(), None);
        assert_eq!(QueryOutcome::MissingQuery.into_text(), MISSING_QUERY_MESSAGE);
    }
}
