//! cache_status tool implementation.
//!
//! Reports the worker state and every bucket with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use swrouter_client::ServiceWorker;

use crate::tools::json_result;

/// Implementation of the cache_status tool.
pub async fn status_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let status = worker.status().await?;
    json_result(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{parse, worker};
    use swrouter_client::{WorkerState, WorkerStatus};

    #[tokio::test]
    async fn test_status_lists_buckets() {
        let worker = worker("http://127.0.0.1:9").await;
        worker.cache().open_bucket("ratewise-runtime-v1").await.unwrap();
        worker.cache().open_bucket("other-cache").await.unwrap();

        let status: WorkerStatus = parse(&status_impl(&worker).await.unwrap());
        assert_eq!(status.state, WorkerState::Parsed);
        assert_eq!(status.precache_bucket, "ratewise-precache-v1");
        assert_eq!(status.buckets.len(), 2);
        assert!(status.buckets[0].current);
        assert!(!status.buckets[1].current);
        assert_eq!(status.buckets[1].entries, 0);
    }
}
