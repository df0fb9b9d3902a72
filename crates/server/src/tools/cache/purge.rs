//! cache_purge tool implementation.
//!
//! Deletes one bucket by name, or every bucket when no name is given.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swrouter_client::ServiceWorker;
use swrouter_core::Error;

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Bucket to delete. Omit to delete every bucket.
    #[serde(default)]
    pub bucket: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of buckets deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(worker: &ServiceWorker, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let deleted = match params.bucket {
        Some(bucket) if bucket.trim().is_empty() => {
            return Err(Error::InvalidInput("bucket cannot be empty".to_string()).into());
        }
        Some(bucket) => {
            if !worker.cache().delete_bucket(&bucket).await? {
                return Err(Error::CacheMiss(format!("no bucket named {bucket}")).into());
            }
            tracing::info!(bucket = %bucket, "purged bucket");
            1
        }
        None => worker.clear_caches().await?,
    };

    json_result(&CachePurgeOutput { deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{parse, worker};

    #[tokio::test]
    async fn test_purge_one_bucket() {
        let worker = worker("http://127.0.0.1:9").await;
        worker.cache().open_bucket("ratewise-runtime-v0").await.unwrap();
        worker.cache().open_bucket("ratewise-runtime-v1").await.unwrap();

        let params = CachePurgeParams { bucket: Some("ratewise-runtime-v0".into()) };
        let output: CachePurgeOutput = parse(&purge_impl(&worker, params).await.unwrap());
        assert_eq!(output.deleted, 1);
        assert_eq!(worker.cache().keys().await.unwrap(), vec!["ratewise-runtime-v1"]);
    }

    #[tokio::test]
    async fn test_purge_all() {
        let worker = worker("http://127.0.0.1:9").await;
        worker.cache().open_bucket("a").await.unwrap();
        worker.cache().open_bucket("b").await.unwrap();

        let output: CachePurgeOutput = parse(&purge_impl(&worker, CachePurgeParams::default()).await.unwrap());
        assert_eq!(output.deleted, 2);
        assert!(worker.cache().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_missing_bucket() {
        let worker = worker("http://127.0.0.1:9").await;
        let params = CachePurgeParams { bucket: Some("nope".into()) };
        assert!(purge_impl(&worker, params).await.is_err());
    }
}
