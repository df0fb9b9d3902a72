//! Request and response values exchanged with the router.
//!
//! Both are cheap to clone: bodies are reference-counted `Bytes`, so storing
//! "a clone" of a live response in a bucket does not copy the payload.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use swrouter_core::cache::request_key;
use swrouter_core::{Destination, Error, StoredResponse};

/// An intercepted outbound request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    destination: Destination,
    headers: HeaderMap,
}

impl Request {
    /// Build a request; the URL fragment is dropped since it never reaches the network.
    pub fn new(method: Method, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method, url, destination: Destination::Empty, headers: HeaderMap::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A top-level navigation (`destination == document`).
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_destination(Destination::Document)
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_navigation(&self) -> bool {
        self.destination.is_navigation()
    }

    /// Key of this request inside a cache bucket.
    pub fn cache_key(&self) -> String {
        request_key(self.method.as_str(), self.url.as_str())
    }
}

/// Where a response handed back to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Built locally to report a failure (408, 503).
    Synthetic,
    /// The precached offline document served for a failed navigation.
    OfflineFallback,
    /// A network-error response (status 0), the equivalent of `Response.error()`.
    Error,
}

/// A response produced by the network, a bucket, or the router itself.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status; 0 for network-error responses.
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Option<Url>,
    pub source: ResponseSource,
}

impl Response {
    /// A live response received from the network.
    pub fn from_network(status: StatusCode, headers: HeaderMap, body: Bytes, url: Url) -> Self {
        Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            url: Some(url),
            source: ResponseSource::Network,
        }
    }

    /// A locally built response carrying `status` and a plain-text body.
    pub fn synthetic(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.into(),
            url: None,
            source: ResponseSource::Synthetic,
        }
    }

    /// The network-error response.
    pub fn error() -> Self {
        Self {
            status: 0,
            status_text: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            url: None,
            source: ResponseSource::Error,
        }
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only complete `200 OK` responses are written to buckets.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Snapshot this response for storage under `request`'s key.
    pub fn to_stored(&self, request: &Request) -> StoredResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();
        StoredResponse::new(
            request.cache_key(),
            request.url().to_string(),
            request.method().to_string(),
            self.status,
            self.status_text.clone(),
            headers,
            self.body.to_vec(),
        )
    }

    /// Rebuild a response from a stored entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::CorruptEntry` if a stored header or URL is malformed.
    pub fn from_stored(entry: StoredResponse) -> Result<Self, Error> {
        let mut headers = HeaderMap::with_capacity(entry.headers.len());
        for (name, value) in &entry.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            headers.append(name, value);
        }
        let url = Url::parse(&entry.url).map_err(|e| Error::CorruptEntry(e.to_string()))?;

        Ok(Self {
            status: entry.status,
            status_text: entry.status_text,
            headers,
            body: Bytes::from(entry.body),
            url: Some(url),
            source: ResponseSource::Cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_request_drops_fragment() {
        let a = Request::get(url("https://example.com/page#top"));
        let b = Request::get(url("https://example.com/page"));
        assert_eq!(a.url().as_str(), "https://example.com/page");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_navigation_request() {
        let req = Request::navigate(url("https://example.com/ratewise/"));
        assert!(req.is_navigation());
        assert_eq!(req.method(), &Method::GET);
        assert!(!Request::get(url("https://example.com/")).is_navigation());
    }

    #[test]
    fn test_synthetic_response() {
        let res = Response::synthetic(StatusCode::SERVICE_UNAVAILABLE, "offline");
        assert_eq!(res.status, 503);
        assert_eq!(res.status_text, "Service Unavailable");
        assert_eq!(res.source, ResponseSource::Synthetic);
        assert!(!res.ok());
        assert_eq!(res.content_type(), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_error_response() {
        let res = Response::error();
        assert_eq!(res.status, 0);
        assert!(res.body.is_empty());
        assert!(!res.is_cacheable());
    }

    #[test]
    fn test_only_200_is_cacheable() {
        let u = url("https://example.com/");
        let ok = Response::from_network(StatusCode::OK, HeaderMap::new(), Bytes::new(), u.clone());
        let partial = Response::from_network(StatusCode::PARTIAL_CONTENT, HeaderMap::new(), Bytes::new(), u.clone());
        let missing = Response::from_network(StatusCode::NOT_FOUND, HeaderMap::new(), Bytes::new(), u);
        assert!(ok.is_cacheable());
        assert!(partial.ok() && !partial.is_cacheable());
        assert!(!missing.is_cacheable());
    }

    #[test]
    fn test_stored_response_keeps_body_and_headers() {
        let req = Request::get(url("https://cdn.example/rates/history/2025-01-01.json"));
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let res = Response::from_network(StatusCode::OK, headers, Bytes::from_static(b"{\"rate\":1.2}"), req.url().clone());

        let stored = res.to_stored(&req);
        assert_eq!(stored.key, req.cache_key());
        assert_eq!(stored.method, "GET");

        let restored = Response::from_stored(stored).unwrap();
        assert_eq!(restored.body, res.body);
        assert_eq!(restored.content_type(), Some("application/json"));
        assert_eq!(restored.source, ResponseSource::Cache);
    }

    #[test]
    fn test_from_stored_rejects_bad_header() {
        let req = Request::get(url("https://example.com/"));
        let mut stored = Response::synthetic(StatusCode::OK, "x").to_stored(&req);
        stored.headers.push(("bad header".into(), "v".into()));
        assert!(matches!(Response::from_stored(stored), Err(Error::CorruptEntry(_))));
    }
}
