//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swrouter server.

pub mod cache;
pub mod sw_fetch;
pub mod sw_lifecycle;
pub mod sw_message;

pub use sw_fetch::SwFetchParams;
pub use sw_lifecycle::SwLifecycleParams;
pub use sw_message::SwMessageParams;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Encode a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ToolError::Serialize(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;
    use swrouter_client::{FetchConfig, HttpFetcher, ServiceWorker, WorkerConfig};
    use swrouter_core::{AppConfig, CacheDb, ManifestEntry};
    use url::Url;

    /// A worker scoped to `{base}/app/` that precaches `index.html` and `offline.html`.
    pub async fn worker(base: &str) -> Arc<ServiceWorker> {
        let config = AppConfig {
            scope: Url::parse(&format!("{base}/app/")).unwrap(),
            precache_manifest: vec![ManifestEntry::new("index.html", Some("1")), ManifestEntry::new("offline.html", None)],
            network_timeout_ms: 500,
            fetch_timeout_ms: 1000,
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(FetchConfig::from_app(&config)).unwrap();
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = ServiceWorker::new(WorkerConfig::from_app(&config).unwrap(), cache, Arc::new(fetcher)).unwrap();
        Arc::new(worker)
    }

    pub fn parse<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
