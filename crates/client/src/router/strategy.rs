//! Caching strategies.
//!
//! One handler per [`Strategy`] variant. Handlers read the precache bucket
//! then the runtime bucket, and write only to the runtime bucket. A handler
//! that cannot produce a response returns [`StrategyError::Network`]; the
//! worker turns that into a fallback response.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::task::JoinSet;

use crate::fetch::{FetchError, Fetcher};
use crate::message::{Request, Response};
use swrouter_core::{CacheDb, Error, Strategy};

/// Why a strategy produced no response.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// Network failed and no usable cached copy exists.
    #[error(transparent)]
    Network(#[from] FetchError),

    /// The bucket store itself failed.
    #[error(transparent)]
    Cache(#[from] Error),
}

/// Response handed to a non-navigation caller whose strategy failed.
pub fn fallback_response(strategy: Strategy, err: &FetchError) -> Response {
    match strategy {
        Strategy::CacheFirstFallback => {
            Response::synthetic(StatusCode::REQUEST_TIMEOUT, format!("Network unavailable and not cached: {err}"))
        }
        Strategy::NetworkFirstTimeout => {
            Response::synthetic(StatusCode::SERVICE_UNAVAILABLE, format!("Service unavailable: {err}"))
        }
        Strategy::CacheFirst | Strategy::StaleWhileRevalidate | Strategy::NetworkOnly => Response::error(),
    }
}

/// Executes strategies against the bucket store and the network.
#[derive(Clone)]
pub struct StrategyRunner {
    cache: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    precache_bucket: String,
    runtime_bucket: String,
    network_timeout: Duration,
    background: Arc<Mutex<JoinSet<()>>>,
}

impl StrategyRunner {
    pub fn new(
        cache: CacheDb, fetcher: Arc<dyn Fetcher>, precache_bucket: String, runtime_bucket: String,
        network_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            fetcher,
            precache_bucket,
            runtime_bucket,
            network_timeout,
            background: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// A runner reading and writing a different bucket pair. Background
    /// revalidations stay in the shared set drained by [`settle`](Self::settle).
    pub fn with_buckets(&self, precache_bucket: String, runtime_bucket: String) -> Self {
        Self { precache_bucket, runtime_bucket, ..self.clone() }
    }

    pub fn precache_bucket(&self) -> &str {
        &self.precache_bucket
    }

    pub fn runtime_bucket(&self) -> &str {
        &self.runtime_bucket
    }

    /// Resolve `request` with `strategy`.
    pub async fn run(&self, strategy: Strategy, request: &Request) -> Result<Response, StrategyError> {
        match strategy {
            Strategy::CacheFirstFallback | Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirstTimeout => self.network_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::NetworkOnly => Ok(self.fetcher.fetch(request).await?),
        }
    }

    /// Wait for every background revalidation started so far.
    pub async fn settle(&self) {
        let mut pending = {
            let mut set = self.background.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *set)
        };
        while pending.join_next().await.is_some() {}
    }

    /// Cached copy of `request` from the precache bucket, then the runtime bucket.
    pub async fn lookup(&self, request: &Request) -> Result<Option<Response>, Error> {
        let key = request.cache_key();
        for bucket in [&self.precache_bucket, &self.runtime_bucket] {
            if let Some(entry) = self.cache.match_entry(bucket, &key).await? {
                tracing::debug!(url = %request.url(), bucket = %bucket, "cache hit");
                return Response::from_stored(entry).map(Some);
            }
        }
        tracing::debug!(url = %request.url(), "cache miss");
        Ok(None)
    }

    async fn cache_first(&self, request: &Request) -> Result<Response, StrategyError> {
        if let Some(cached) = self.lookup(request).await? {
            return Ok(cached);
        }

        let response = self.fetcher.fetch(request).await?;
        store(&self.cache, &self.runtime_bucket, request, &response).await;
        Ok(response)
    }

    async fn network_first(&self, request: &Request) -> Result<Response, StrategyError> {
        // On timeout the fetch future is dropped, which aborts the request.
        let failure = match tokio::time::timeout(self.network_timeout, self.fetcher.fetch(request)).await {
            Ok(Ok(response)) => {
                store(&self.cache, &self.runtime_bucket, request, &response).await;
                return Ok(response);
            }
            Ok(Err(err)) => err,
            Err(_) => FetchError::Timeout(self.network_timeout),
        };

        tracing::warn!(url = %request.url(), error = %failure, "network-first falling back to cache");
        match self.lookup(request).await? {
            Some(cached) => Ok(cached),
            None => Err(failure.into()),
        }
    }

    async fn stale_while_revalidate(&self, request: &Request) -> Result<Response, StrategyError> {
        match self.lookup(request).await? {
            Some(cached) => {
                self.revalidate_in_background(request.clone());
                Ok(cached)
            }
            None => {
                let response = self.fetcher.fetch(request).await?;
                store(&self.cache, &self.runtime_bucket, request, &response).await;
                Ok(response)
            }
        }
    }

    fn revalidate_in_background(&self, request: Request) {
        let cache = self.cache.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let bucket = self.runtime_bucket.clone();

        let mut set = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        while set.try_join_next().is_some() {}
        set.spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) => store(&cache, &bucket, &request, &response).await,
                Err(err) => tracing::warn!(url = %request.url(), error = %err, "background revalidation failed"),
            }
        });
    }
}

/// Write a cacheable response into `bucket`.
///
/// Write failures are logged and swallowed: the caller already holds a good
/// response and the next request will simply miss.
async fn store(cache: &CacheDb, bucket: &str, request: &Request, response: &Response) {
    if !response.is_cacheable() {
        tracing::debug!(url = %request.url(), status = response.status, "response not cacheable");
        return;
    }
    match cache.put(bucket, &response.to_stored(request)).await {
        Ok(()) => tracing::debug!(url = %request.url(), bucket = %bucket, "stored response"),
        Err(err) => tracing::warn!(url = %request.url(), bucket = %bucket, error = %err, "failed to store response"),
    }
}
