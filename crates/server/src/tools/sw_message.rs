//! sw_message tool implementation.
//!
//! Posts a message to the worker, optionally with a reply port.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swrouter_client::{ServiceWorker, WorkerState};
use tokio::sync::oneshot;

use super::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message payload, e.g. `{"type": "SKIP_WAITING"}`.
    pub data: Value,

    /// Attach a reply port (default: true).
    #[serde(default = "default_true")]
    pub want_reply: bool,
}

fn default_true() -> bool {
    true
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// Reply posted by the worker, if any.
    pub reply: Option<Value>,
    pub state: WorkerState,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(worker: &ServiceWorker, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let reply = if params.want_reply {
        let (tx, rx) = oneshot::channel();
        worker.on_message(&params.data, Some(tx)).await?;
        // The port is dropped unanswered for messages the worker ignores.
        rx.await.ok()
    } else {
        worker.on_message(&params.data, None).await?;
        None
    };

    json_result(&SwMessageOutput { reply, state: worker.state() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{parse, worker};
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_skip_waiting_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("shell"))
            .mount(&server)
            .await;
        let worker = worker(&server.uri()).await;
        worker.install().await.unwrap();

        let params = SwMessageParams { data: json!({ "type": "SKIP_WAITING" }), want_reply: true };
        let output: SwMessageOutput = parse(&message_impl(&worker, params).await.unwrap());
        let reply = output.reply.unwrap();
        assert_eq!(reply["type"], "SKIP_WAITING");
        assert_eq!(reply["ok"], true);
        assert_eq!(output.state, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_unknown_message_has_no_reply() {
        let worker = worker("http://127.0.0.1:9").await;
        let params = SwMessageParams { data: json!({ "type": "PING" }), want_reply: true };
        let output: SwMessageOutput = parse(&message_impl(&worker, params).await.unwrap());
        assert!(output.reply.is_none());
        assert_eq!(output.state, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_skip_waiting_without_reply_port() {
        let worker = worker("http://127.0.0.1:9").await;
        let params = SwMessageParams { data: json!({ "type": "SKIP_WAITING" }), want_reply: false };
        let output: SwMessageOutput = parse(&message_impl(&worker, params).await.unwrap());
        assert!(output.reply.is_none());
    }
}
