//! Core types and shared functionality for swrouter.
//!
//! This crate provides:
//! - Cache bucket store with SQLite backend
//! - Unified error types
//! - Configuration structures and the declarative route table

pub mod cache;
pub mod config;
pub mod error;
pub mod route;

pub use cache::{CacheDb, StoredResponse};
pub use config::{AppConfig, ConfigError, ManifestEntry};
pub use error::Error;
pub use route::{Destination, PredicateSpec, RouteSpec, Strategy};
