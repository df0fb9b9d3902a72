//! Ordered route table.
//!
//! Each request is classified by the first route whose predicate matches.
//! The table always ends with a catch-all, so every GET resolves to exactly
//! one strategy.

pub mod predicate;
pub mod strategy;

pub use predicate::Predicate;
pub use strategy::{StrategyError, StrategyRunner, fallback_response};

use crate::message::Request;
use swrouter_core::route::DEFAULT_ROUTE;
use swrouter_core::{Error, RouteSpec, Strategy};

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub predicate: Predicate,
    pub strategy: Strategy,
}

/// Routes in evaluation order.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile specs in order, appending a stale-while-revalidate catch-all
    /// when the table has none.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if a predicate fails to compile.
    pub fn compile(specs: &[RouteSpec]) -> Result<Self, Error> {
        let mut routes = Vec::with_capacity(specs.len() + 1);
        for spec in specs {
            if let Some(catch_all) = routes.iter().find(|r: &&Route| r.predicate.is_catch_all()) {
                tracing::warn!(route = %spec.name, shadowed_by = %catch_all.name, "route is unreachable");
            }
            routes.push(Route {
                name: spec.name.clone(),
                predicate: Predicate::compile(&spec.when)?,
                strategy: spec.strategy,
            });
        }

        if !routes.iter().any(|r| r.predicate.is_catch_all()) {
            routes.push(Route {
                name: DEFAULT_ROUTE.to_string(),
                predicate: Predicate::Any,
                strategy: Strategy::StaleWhileRevalidate,
            });
        }

        Ok(Self { routes })
    }

    /// First route matching `request`.
    pub fn select(&self, request: &Request) -> &Route {
        // `compile` appends a catch-all, so the table is never empty.
        let last = &self.routes[self.routes.len() - 1];
        self.routes
            .iter()
            .find(|route| route.predicate.matches(request))
            .unwrap_or(last)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
