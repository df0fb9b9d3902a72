//! sw_fetch tool implementation.
//!
//! Dispatches a fetch event through the worker. Requests the worker does not
//! intercept are fetched directly and reported with `handled: false`.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swrouter_client::fetch::canonicalize;
use swrouter_client::{FetchOutcome, HeaderName, HeaderValue, Method, Request, Response, ResponseSource, ServiceWorker};
use swrouter_core::{Destination, Error, Strategy};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// The URL to request. A missing scheme defaults to https.
    pub url: String,

    /// HTTP method (default: GET). Only GET is intercepted.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination; `document` marks a navigation.
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Extra request headers, sent to the network on a miss.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// Whether the worker answered the request.
    pub handled: bool,
    /// Name of the route that matched.
    pub route: Option<String>,
    pub strategy: Option<Strategy>,
    /// HTTP status; 0 for a network-error response.
    pub status: u16,
    pub status_text: String,
    pub source: ResponseSource,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

impl SwFetchOutput {
    fn new(handled: bool, route: Option<String>, strategy: Option<Strategy>, response: Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();
        Self {
            handled,
            route,
            strategy,
            status: response.status,
            status_text: response.status_text.clone(),
            source: response.source,
            content_type: response.content_type().map(str::to_string),
            headers,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(worker: &ServiceWorker, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ToolError::InvalidInput(format!("invalid method: {}", params.method)))?;
    let mut request = Request::new(method, url).with_destination(params.destination.unwrap_or_default());
    for (name, value) in &params.headers {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| ToolError::InvalidInput(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ToolError::InvalidInput(format!("invalid value for header {name}")))?;
        request = request.with_header(name, value);
    }

    let output = match worker.handle_fetch(&request).await? {
        FetchOutcome::Passthrough => {
            tracing::debug!(url = %request.url(), "request passed through");
            SwFetchOutput::new(false, None, None, worker.passthrough(&request).await?)
        }
        FetchOutcome::Respond { route, strategy, response } => {
            SwFetchOutput::new(true, Some(route), Some(strategy), response)
        }
    };

    json_result(&output)
}
