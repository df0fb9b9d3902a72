//! The service worker: fetch routing plus the install/activate/message lifecycle.
//!
//! ### Fetch contract
//! - Non-GET and non-http(s) requests are not intercepted.
//! - Everything else is classified by the route table and resolved by the
//!   selected strategy. A failed strategy never surfaces as an error: the
//!   caller gets a synthetic response, a network-error response, or for
//!   navigations the precached offline document.
//! - Only a failing bucket store propagates as `Err`.
//!
//! ### Concurrency
//! - Each call to [`ServiceWorker::handle_fetch`] is one independent task.
//! - The runtime bucket is the only state written during routing; concurrent
//!   writers are not coordinated and the last write wins.
//!
//! ### Versions
//! - Until this worker activates, requests are served from the newest bucket
//!   pair of an earlier version when one exists, so a pending or failed
//!   install never takes the running version offline.

mod lifecycle;

pub use lifecycle::{WorkerMessage, WorkerState, WorkerStatus};

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use url::Url;

use crate::fetch::{Fetcher, is_interceptable};
use crate::message::{Request, Response, ResponseSource};
use crate::router::{RouteTable, StrategyError, StrategyRunner, fallback_response};
use swrouter_core::{AppConfig, CacheDb, Error, RouteSpec, Strategy};

/// A manifest entry resolved against the worker scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheEntry {
    pub url: Url,
    pub revision: Option<String>,
}

/// Everything the worker needs, resolved up front so no global state is consulted.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Leading part of every bucket name, shared by all versions.
    pub cache_prefix: String,
    pub precache_bucket: String,
    pub runtime_bucket: String,
    pub scope: Url,
    pub offline_document: Url,
    pub manifest: Vec<PrecacheEntry>,
    pub network_timeout: Duration,
    pub skip_waiting_on_install: bool,
    pub routes: Vec<RouteSpec>,
}

impl WorkerConfig {
    /// Resolve an application config.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if a manifest entry or the offline document
    /// does not resolve against the scope.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let manifest = config
            .precache_manifest
            .iter()
            .map(|entry| {
                Ok(PrecacheEntry {
                    url: config.resolve(&entry.url).map_err(|e| Error::InvalidUrl(e.to_string()))?,
                    revision: entry.revision.clone(),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            cache_prefix: config.cache_prefix.clone(),
            precache_bucket: config.precache_bucket_name(),
            runtime_bucket: config.runtime_bucket_name(),
            scope: config.scope.clone(),
            offline_document: config.offline_document_url().map_err(|e| Error::InvalidUrl(e.to_string()))?,
            manifest,
            network_timeout: config.network_timeout(),
            skip_waiting_on_install: config.skip_waiting_on_install,
            routes: config.routes.clone(),
        })
    }
}

/// How the worker answered a fetch event.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request itself.
    Passthrough,
    /// Answered by the route named `route`.
    Respond { route: String, strategy: Strategy, response: Response },
}

/// A cache-routing service worker bound to one bucket store and one network.
pub struct ServiceWorker {
    config: WorkerConfig,
    routes: RouteTable,
    cache: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    runner: StrategyRunner,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl ServiceWorker {
    /// Build a worker in the `Parsed` state.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the route table does not compile.
    pub fn new(config: WorkerConfig, cache: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let routes = RouteTable::compile(&config.routes)?;
        let runner = StrategyRunner::new(
            cache.clone(),
            Arc::clone(&fetcher),
            config.precache_bucket.clone(),
            config.runtime_bucket.clone(),
            config.network_timeout,
        );

        Ok(Self {
            config,
            routes,
            cache,
            fetcher,
            runner,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Handle one fetch event.
    ///
    /// # Errors
    ///
    /// Only bucket-store failures are returned; network failures always
    /// resolve to a response.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if request.method() != Method::GET {
            tracing::debug!(method = %request.method(), url = %request.url(), "not intercepting non-GET request");
            return Ok(FetchOutcome::Passthrough);
        }
        if !is_interceptable(request.url()) {
            tracing::debug!(url = %request.url(), "not intercepting non-http request");
            return Ok(FetchOutcome::Passthrough);
        }

        let route = self.routes.select(request);
        tracing::debug!(url = %request.url(), route = %route.name, strategy = %route.strategy, "routing request");

        let runner = self.serving_runner().await?;
        let response = match runner.run(route.strategy, request).await {
            Ok(response) => response,
            Err(StrategyError::Cache(err)) => return Err(err),
            Err(StrategyError::Network(err)) if request.is_navigation() => {
                tracing::warn!(url = %request.url(), error = %err, "navigation failed, serving offline fallback");
                self.navigation_fallback(request, runner.precache_bucket()).await?
            }
            Err(StrategyError::Network(err)) => {
                tracing::warn!(url = %request.url(), route = %route.name, error = %err, "strategy failed");
                fallback_response(route.strategy, &err)
            }
        };

        Ok(FetchOutcome::Respond { route: route.name.clone(), strategy: route.strategy, response })
    }

    /// Fetch a request the worker declined to intercept.
    ///
    /// # Errors
    ///
    /// Returns the network failure; pass-through traffic has no fallback.
    pub async fn passthrough(&self, request: &Request) -> Result<Response, Error> {
        Ok(self.fetcher.fetch(request).await?)
    }

    /// Wait for background cache refreshes started by earlier fetches.
    pub async fn settle(&self) {
        self.runner.settle().await;
    }

    /// Runner bound to the buckets that currently answer requests.
    async fn serving_runner(&self) -> Result<StrategyRunner, Error> {
        if self.state() == WorkerState::Activated {
            return Ok(self.runner.clone());
        }
        match self.previous_buckets().await? {
            Some((precache, runtime)) => {
                let runner = self.runner.with_buckets(precache, runtime);
                tracing::debug!(
                    precache = runner.precache_bucket(),
                    runtime = runner.runtime_bucket(),
                    "serving from previous version"
                );
                Ok(runner)
            }
            None => Ok(self.runner.clone()),
        }
    }

    /// Newest precache/runtime pair left by another version of this app.
    async fn previous_buckets(&self) -> Result<Option<(String, String)>, Error> {
        let precache_prefix = format!("{}-precache-", self.config.cache_prefix);
        let runtime_prefix = format!("{}-runtime-", self.config.cache_prefix);

        let version = self
            .cache
            .keys()
            .await?
            .into_iter()
            .rev()
            .filter(|name| !self.is_current_bucket(name))
            .find_map(|name| {
                name.strip_prefix(&precache_prefix)
                    .or_else(|| name.strip_prefix(&runtime_prefix))
                    .map(str::to_string)
            });

        Ok(version.map(|version| {
            // A configured runtime name carries no version and is shared.
            let runtime = if self.config.runtime_bucket.starts_with(&runtime_prefix) {
                format!("{runtime_prefix}{version}")
            } else {
                self.config.runtime_bucket.clone()
            };
            (format!("{precache_prefix}{version}"), runtime)
        }))
    }

    /// Cached copy of the URL from any bucket, else the offline document from
    /// `precache_bucket`, else a network-error response.
    async fn navigation_fallback(&self, request: &Request, precache_bucket: &str) -> Result<Response, Error> {
        if request.url().origin() != self.config.scope.origin() {
            tracing::debug!(url = %request.url(), "cross-origin navigation has no offline fallback");
            return Ok(Response::error());
        }

        if let Some(entry) = self.cache.match_any(&request.cache_key()).await? {
            return Response::from_stored(entry);
        }

        let offline_key = Request::get(self.config.offline_document.clone()).cache_key();
        match self.cache.match_entry(precache_bucket, &offline_key).await? {
            Some(entry) => Ok(Response::from_stored(entry)?.with_source(ResponseSource::OfflineFallback)),
            None => {
                tracing::warn!(
                    offline_document = %self.config.offline_document,
                    bucket = %precache_bucket,
                    "offline document is not precached"
                );
                Ok(Response::error())
            }
        }
    }
}
