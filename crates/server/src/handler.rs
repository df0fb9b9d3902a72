//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker.
use std::sync::Arc;

use crate::tools::cache::{CachePurgeParams, purge_impl, status_impl};
use crate::tools::sw_fetch::fetch_impl;
use crate::tools::sw_lifecycle::lifecycle_impl;
use crate::tools::sw_message::message_impl;
use crate::tools::{SwFetchParams, SwLifecycleParams, SwMessageParams};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swrouter_client::{ServiceWorker, WorkerState};

/// The main MCP server handler for swrouter.
#[derive(Clone)]
pub struct SwRouterServer {
    worker: Arc<ServiceWorker>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwRouterServer {
    /// Create a new server handler around a worker.
    pub fn new(worker: Arc<ServiceWorker>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    /// Install the worker and activate it unless it already activated itself.
    ///
    /// A failed install is logged and leaves the worker redundant; whatever
    /// buckets already exist keep serving.
    pub async fn bootstrap(&self) {
        match self.worker.install().await {
            Ok(WorkerState::Installed) => {
                if let Err(err) = self.worker.activate().await {
                    tracing::error!(error = %err, "activation failed");
                }
            }
            Ok(state) => tracing::info!(state = %state, "worker ready"),
            Err(err) => tracing::error!(error = %err, "install failed, continuing with existing buckets"),
        }
    }

    /// Dispatch a fetch event through the worker.
    #[tool(
        description = "Route a request through the service worker. Returns status, body, and which route, strategy and source produced it."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    /// Deliver an install or activate event.
    #[tool(description = "Deliver a lifecycle event (install or activate) to the service worker.")]
    async fn sw_lifecycle(&self, params: Parameters<SwLifecycleParams>) -> Result<CallToolResult, McpError> {
        lifecycle_impl(&self.worker, params.0).await
    }

    /// Post a message such as `{"type": "SKIP_WAITING"}`.
    #[tool(description = "Post a message to the service worker. SKIP_WAITING activates a waiting worker and is acknowledged.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "Report the worker state and every cache bucket with its entry count.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }

    #[tool(description = "Delete one cache bucket by name, or every bucket when no name is given.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for SwRouterServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swrouter".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
