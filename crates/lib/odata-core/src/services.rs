use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use odata_model::CachedDescription;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::metadata::{FALLBACK_DESCRIPTION, MetadataSummarizer};
use crate::upstream::UpstreamSource;

/// How long a summarized description is served before it is refetched.
pub const DEFAULT_CACHE_EXPIRATION: Duration = Duration::from_secs(30 * 60);

/// Produces the `GetData` tool description from the live `$metadata`
/// document, memoized in a single time-boxed slot.
///
/// The service never fails: an unreachable upstream or a malformed document
/// yields the static fallback text and leaves the cached value untouched.
pub struct MetadataService<S: UpstreamSource> {
    inner: Arc<MetadataServiceInner<S>>,
}

struct MetadataServiceInner<S: UpstreamSource> {
    source: Arc<S>,
    expiration: Duration,
    slot: RwLock<Option<CachedDescription>>,
}

impl<S: UpstreamSource> Clone for MetadataService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: UpstreamSource> MetadataService<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_expiration(source, DEFAULT_CACHE_EXPIRATION)
    }

    pub fn with_expiration(source: Arc<S>, expiration: Duration) -> Self {
        Self {
            inner: Arc::new(MetadataServiceInner {
                source,
                expiration,
                slot: RwLock::new(None),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn expiration(&self) -> Duration {
        self.inner.expiration
    }

    /// Returns the cached description while it is fresh, otherwise fetches
    /// and summarizes `$metadata` again.
    pub async fn get_tool_description(&self) -> String {
        if let Some(text) = self.fresh_cached().await {
            debug!("serving cached OData metadata description");
            return text;
        }

        let xml = match self.inner.source.fetch_metadata().await {
            Ok(xml) => xml,
            Err(err) => {
                warn!("failed to fetch OData metadata: {err}");
                return FALLBACK_DESCRIPTION.to_string();
            }
        };
        let fetched_at = Utc::now();

        match MetadataSummarizer::try_summarize_async(xml).await {
            Ok(description) => {
                self.store(description.clone(), fetched_at).await;
                info!("cached OData metadata description ({} bytes)", description.len());
                description
            }
            Err(err) => {
                error!("error parsing OData metadata: {err}");
                FALLBACK_DESCRIPTION.to_string()
            }
        }
    }

    /// Current slot contents, fresh or not.
    pub async fn cached(&self) -> Option<CachedDescription> {
        self.inner.slot.read().await.clone()
    }

    /// Empties the slot so the next call refetches.
    pub async fn invalidate(&self) {
        self.inner.slot.write().await.take();
    }

    async fn fresh_cached(&self) -> Option<String> {
        let slot = self.inner.slot.read().await;
        let cached = slot.as_ref()?;
        is_fresh(cached.fetched_at, Utc::now(), self.inner.expiration).then(|| cached.text.clone())
    }

    async fn store(&self, text: String, fetched_at: DateTime<Utc>) {
        let mut slot = self.inner.slot.write().await;
        // Concurrent refreshes may finish out of order; keep the newest fetch.
        if slot
            .as_ref()
            .is_some_and(|existing| existing.fetched_at > fetched_at)
        {
            return;
        }
        *slot = Some(CachedDescription { text, fetched_at });
    }
}

fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, expiration: Duration) -> bool {
    let Ok(expiration) = TimeDelta::from_std(expiration) else {
        return true;
    };
    now.signed_duration_since(fetched_at) < expiration
}
