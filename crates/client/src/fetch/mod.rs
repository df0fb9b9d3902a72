//! Network access for the router.
//!
//! ### Fetcher seam
//! - Strategies talk to the network only through the [`Fetcher`] trait, so a
//!   scripted fetcher can stand in for the network in tests.
//! - A fetch resolves with any HTTP status; only transport failures are errors.
//!
//! ### HttpFetcher
//! - reqwest client with rustls, compression, bounded redirects.
//! - Max body bytes: 5MB (configurable).
//! - Dropping the returned future aborts the in-flight request, which is how
//!   the network-first deadline cancels work instead of ignoring it.

pub mod url;

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, is_interceptable};

use crate::message::{Request, Response};
use swrouter_core::{AppConfig, Error};

/// Transport-level fetch failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{url} answered status {status}")]
    Status { url: String, status: u16 },

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("{len} bytes exceeds {max}")]
    TooLarge { len: usize, max: usize },
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout(_) => Error::FetchTimeout(err.to_string()),
            other => Error::FetchFailed(other.to_string()),
        }
    }
}

/// Something that can put a request on the wire.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `request`, resolving with whatever status the server answered.
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swrouter/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Overall request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "swrouter/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.fetch_timeout(), ..Default::default() }
    }
}

/// reqwest-backed [`Fetcher`].
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::FetchFailed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() { FetchError::Timeout(self.config.timeout) } else { FetchError::Network(err.to_string()) }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url();
        if !is_interceptable(url) {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        let start = Instant::now();
        let response = self
            .http
            .request(request.method().clone(), url.as_str())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { len: len as usize, max: self.config.max_bytes });
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(|e| self.map_error(e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { len: bytes.len(), max: self.config.max_bytes });
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method(),
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response::from_network(status, headers, bytes, final_url))
    }
}
