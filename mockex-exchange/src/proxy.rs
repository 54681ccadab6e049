use bytes::Bytes;
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Bound applied to every per-method cache.
const CACHE_CAPACITY: u64 = 128;

/// Raw reply captured from a real venue's public endpoint, replayed verbatim
/// (status and body) to the caller.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Bytes,
}

/// Failure talking to (or interpreting) a real venue's public API.
///
/// `Venue` carries a business failure reported inside the upstream payload and is
/// rendered through the adapter's error envelope; `Transport` is an I/O or decode
/// problem and surfaces as an internal error.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Venue(String),
    #[error("upstream request failed: {0}")]
    Transport(String),
}

/// One upstream method's bounded TTL cache, keyed by the parameter tuple.
pub struct MethodCache {
    cache: Cache<String, UpstreamReply>,
}

impl std::fmt::Debug for MethodCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodCache").finish_non_exhaustive()
    }
}

impl MethodCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Return the cached reply for `key`, fetching (and caching) it on a miss.
    /// Transport failures are not cached.
    pub async fn fetch<F>(&self, key: String, fetch: F) -> Result<UpstreamReply, UpstreamError>
    where
        F: Future<Output = Result<UpstreamReply, reqwest::Error>>,
    {
        self.cache
            .try_get_with(key, async move {
                fetch
                    .await
                    .map_err(|error| UpstreamError::Transport(error.to_string()))
            })
            .await
            .map_err(|error: Arc<UpstreamError>| (*error).clone())
    }
}

/// Cache of one parsed reference-data map (markets, currencies, tickers), shared
/// behind an [`Arc`] so validation paths read it without re-parsing.
pub struct ReferenceCache<T> {
    cache: Cache<(), Arc<T>>,
}

impl<T> std::fmt::Debug for ReferenceCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCache").finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> ReferenceCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn fetch<F>(&self, fetch: F) -> Result<Arc<T>, UpstreamError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        self.cache
            .try_get_with((), async move { fetch.await.map(Arc::new) })
            .await
            .map_err(|error: Arc<UpstreamError>| (*error).clone())
    }

    /// Pre-populate the cache, bypassing the upstream fetch. Test support.
    pub async fn seed(&self, value: T) {
        self.cache.insert((), Arc::new(value)).await;
    }
}

/// GET `url` with the non-absent parameters attached, capturing status and body.
pub(crate) async fn fetch_raw(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, Option<&str>)],
) -> Result<UpstreamReply, reqwest::Error> {
    let query: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(name, value)| value.map(|value| (*name, value)))
        .collect();

    debug!(url, ?query, "fetching upstream");
    let response = client
        .get(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .query(&query)
        .send()
        .await?;

    Ok(UpstreamReply {
        status: response.status().as_u16(),
        body: response.bytes().await?,
    })
}

/// Cache key for a parameter tuple: absent parameters collapse to the same key as
/// omitted ones, matching the upstream query that is actually sent.
pub(crate) fn cache_key(params: &[(&str, Option<&str>)]) -> String {
    params
        .iter()
        .filter_map(|(name, value)| value.map(|value| format!("{name}={value}")))
        .collect::<Vec<_>>()
        .join("&")
}
