//! Declarative route table.
//!
//! A route pairs a predicate over the request with the caching strategy that
//! resolves it. Routes are evaluated in order and the first match wins. The
//! types here are plain data so the table can be loaded from configuration;
//! the client crate compiles them into matchers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caching policy applied to a routed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Serve from cache; on miss fetch and store; on failure answer 408.
    CacheFirstFallback,
    /// Fetch with a deadline; on failure serve cache or answer 503.
    NetworkFirstTimeout,
    /// Serve from cache; on miss fetch and store; failures propagate.
    CacheFirst,
    /// Serve cache immediately and refresh it in the background.
    StaleWhileRevalidate,
    /// Always go to the network, never touch the cache.
    NetworkOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirstFallback => "cache_first_fallback",
            Strategy::NetworkFirstTimeout => "network_first_timeout",
            Strategy::CacheFirst => "cache_first",
            Strategy::StaleWhileRevalidate => "stale_while_revalidate",
            Strategy::NetworkOnly => "network_only",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the requesting context intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// A top-level navigation.
    Document,
    Font,
    Image,
    Script,
    Style,
    Manifest,
    /// `fetch()`/XHR and anything else without a destination.
    #[default]
    Empty,
}

impl Destination {
    pub fn is_navigation(&self) -> bool {
        matches!(self, Destination::Document)
    }
}

/// Condition a request must satisfy for a route to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateSpec {
    /// Host is one of `hosts` and the path contains `path_contains`
    /// (and ends with `path_suffix` when given).
    HostPath {
        hosts: Vec<String>,
        path_contains: String,
        #[serde(default)]
        path_suffix: Option<String>,
    },
    /// Host is one of `hosts`.
    Host { hosts: Vec<String> },
    /// Path ends with `suffix`.
    PathSuffix { suffix: String },
    /// Path matches a regular expression.
    PathRegex { pattern: String },
    /// Request destination is one of `destinations`.
    Destination { destinations: Vec<Destination> },
    /// Matches every request.
    Any,
}

/// One entry of the ordered route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub name: String,
    pub when: PredicateSpec,
    pub strategy: Strategy,
}

impl RouteSpec {
    pub fn new(name: impl Into<String>, when: PredicateSpec, strategy: Strategy) -> Self {
        Self { name: name.into(), when, strategy }
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self.when, PredicateSpec::Any)
    }
}

/// Route name of the catch-all appended to every table.
pub const DEFAULT_ROUTE: &str = "default";

/// Path suffix of the connectivity probe that must never be answered from cache.
pub const NETWORK_PROBE_SUFFIX: &str = "/__network_probe__";

fn hosts(list: &[&str]) -> Vec<String> {
    list.iter().map(|h| h.to_string()).collect()
}

/// The built-in route table for the rate converter app.
pub fn default_routes() -> Vec<RouteSpec> {
    vec![
        RouteSpec::new(
            "network-probe",
            PredicateSpec::PathSuffix { suffix: NETWORK_PROBE_SUFFIX.into() },
            Strategy::NetworkOnly,
        ),
        RouteSpec::new(
            "history-rates",
            PredicateSpec::HostPath {
                hosts: hosts(&["cdn.jsdelivr.net", "raw.githubusercontent.com"]),
                path_contains: "/rates/history/".into(),
                path_suffix: Some(".json".into()),
            },
            Strategy::CacheFirstFallback,
        ),
        RouteSpec::new(
            "rates-api",
            PredicateSpec::Host { hosts: hosts(&["api.frankfurter.app"]) },
            Strategy::NetworkFirstTimeout,
        ),
        RouteSpec::new(
            "web-fonts",
            PredicateSpec::Host { hosts: hosts(&["fonts.googleapis.com", "fonts.gstatic.com"]) },
            Strategy::CacheFirst,
        ),
        RouteSpec::new(DEFAULT_ROUTE, PredicateSpec::Any, Strategy::StaleWhileRevalidate),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes_end_with_catch_all() {
        let routes = default_routes();
        let last = routes.last().unwrap();
        assert!(last.is_catch_all());
        assert_eq!(last.strategy, Strategy::StaleWhileRevalidate);
        assert_eq!(routes.iter().filter(|r| r.is_catch_all()).count(), 1);
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&Strategy::NetworkFirstTimeout).unwrap();
        assert_eq!(json, "\"network_first_timeout\"");
        let parsed: Strategy = serde_json::from_str("\"stale_while_revalidate\"").unwrap();
        assert_eq!(parsed, Strategy::StaleWhileRevalidate);
        assert_eq!(Strategy::CacheFirst.to_string(), "cache_first");
    }

    #[test]
    fn test_predicate_tagged_deserialize() {
        let spec: RouteSpec = serde_json::from_str(
            r#"{"name":"cdn","strategy":"cache_first_fallback",
                "when":{"kind":"host_path","hosts":["cdn.example"],"path_contains":"/rates/history/"}}"#,
        )
        .unwrap();
        assert_eq!(spec.strategy, Strategy::CacheFirstFallback);
        assert!(matches!(spec.when, PredicateSpec::HostPath { path_suffix: None, .. }));
    }

    #[test]
    fn test_destination_navigation() {
        assert!(Destination::Document.is_navigation());
        assert!(!Destination::Font.is_navigation());
        assert_eq!(Destination::default(), Destination::Empty);
    }
}
