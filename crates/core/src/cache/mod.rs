//! SQLite-backed cache buckets.
//!
//! This module provides the persistent bucket store behind the router, using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named buckets holding responses keyed by a SHA-256 request hash
//! - Atomic batch writes for install-time precaching
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! There is no size bound or eviction: runtime buckets grow until their
//! version is retired.

pub mod buckets;
pub mod connection;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use buckets::StoredResponse;
pub use connection::CacheDb;
pub use hash::request_key;
