//! sw_lifecycle tool implementation.
//!
//! Delivers install and activate events to the worker.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swrouter_client::{ServiceWorker, WorkerState};

use super::json_result;

/// Lifecycle event to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Install,
    Activate,
}

/// Parameters for the sw_lifecycle tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwLifecycleParams {
    pub event: LifecycleEvent,
}

/// Output from the sw_lifecycle tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwLifecycleOutput {
    pub event: LifecycleEvent,
    /// Worker state after the event.
    pub state: WorkerState,
    /// Buckets removed by activation.
    pub deleted_buckets: Vec<String>,
}

/// Implementation of the sw_lifecycle tool.
pub async fn lifecycle_impl(worker: &ServiceWorker, params: SwLifecycleParams) -> Result<CallToolResult, McpError> {
    let deleted_buckets = match params.event {
        LifecycleEvent::Install => {
            worker.install().await?;
            Vec::new()
        }
        LifecycleEvent::Activate => worker.activate().await?,
    };

    json_result(&SwLifecycleOutput { event: params.event, state: worker.state(), deleted_buckets })
}
