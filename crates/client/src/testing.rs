//! Scripted network for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::fetch::{FetchError, Fetcher};
use crate::message::{Request, Response};

/// Fetcher answering from a table of canned responses.
///
/// Unknown URLs and offline mode fail like a refused connection.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, (u16, Bytes)>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Mutex<Duration>,
    offline: AtomicBool,
    cancelled: AtomicUsize,
}

struct InFlight<'a> {
    cancelled: &'a AtomicUsize,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, Bytes::from(body.to_string())));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Fetches dropped before completing.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url().as_str().to_string();
        *self.calls.lock().unwrap().entry(url.clone()).or_default() += 1;

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".into()));
        }

        let delay = *self.delay.lock().unwrap();
        let mut guard = InFlight { cancelled: &self.cancelled, finished: false };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        guard.finished = true;

        let canned = self.responses.lock().unwrap().get(&url).cloned();
        match canned {
            Some((status, body)) => {
                let status = StatusCode::from_u16(status).map_err(|e| FetchError::Network(e.to_string()))?;
                Ok(Response::from_network(status, HeaderMap::new(), body, request.url().clone()))
            }
            None => Err(FetchError::Network(format!("connection refused: {url}"))),
        }
    }
}
