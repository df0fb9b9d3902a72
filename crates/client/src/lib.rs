//! Request routing for the swrouter service worker.
//!
//! This crate provides the network fetcher, the route table with its caching
//! strategies, and the [`ServiceWorker`] that ties them to the bucket store.

pub mod fetch;
pub mod message;
pub mod router;
pub mod worker;

#[cfg(test)]
mod testing;

pub use fetch::{FetchConfig, FetchError, Fetcher, HttpFetcher};
pub use message::{Request, Response, ResponseSource};
pub use router::{Route, RouteTable};
pub use worker::{FetchOutcome, PrecacheEntry, ServiceWorker, WorkerConfig, WorkerMessage, WorkerState, WorkerStatus};
pub use reqwest::Method;
pub use reqwest::header::{HeaderName, HeaderValue};
