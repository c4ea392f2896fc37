//! Remote tool transport
//!
//! JSON-RPC client for the remote branch service. Every call is retried with
//! exponential backoff; a call either returns one normalized JSON value or
//! fails with a [`TransportError`] after the retry budget is spent.

pub mod sse;

use crate::config::McpConfig;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Inner tool names on the remote service
pub const PARALLEL_EXPLORE: &str = "parallel_explore";
pub const GET_BRANCH: &str = "get_branch";
pub const BRANCH_READ_FILE: &str = "branch_read_file";

const LOG_PREVIEW_CHARS: usize = 1000;

/// Errors raised by the transport
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("MCP HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unparsable response: {0}")]
    Parse(String),

    #[error("MCP call {method} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        method: String,
        attempts: u32,
        last: Box<TransportError>,
    },
}

impl From<TransportError> for sdk::errors::EngineError {
    fn from(err: TransportError) -> Self {
        sdk::errors::EngineError::Transport(err.to_string())
    }
}

/// JSON-RPC client for the remote branch service
pub struct McpClient {
    endpoint: String,
    client: reqwest::Client,
    session_id: String,
    request_id: AtomicU64,
    max_retries: u32,
    retry_base: Duration,
    request_timeout: Duration,
    status_timeout: Duration,
}

impl McpClient {
    pub fn new(config: &McpConfig) -> Self {
        Self {
            endpoint: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            session_id: uuid::Uuid::new_v4().to_string(),
            request_id: AtomicU64::new(0),
            max_retries: config.max_retries.max(1),
            retry_base: Duration::from_millis(config.retry_backoff_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            status_timeout: Duration::from_secs(config.status_timeout_secs),
        }
    }

    /// Session token sent with every request of this client
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one JSON-RPC call, retrying on any failure
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::RetriesExhausted`] wrapping the last failure
    /// once every attempt has failed.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed) + 1;
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            debug!(
                "MCP POST {} attempt {} to {}",
                method,
                attempt + 1,
                self.endpoint
            );

            match self.attempt(method, &payload, timeout).await {
                Ok(value) => return Ok(sse::normalize(value)),
                Err(e) => {
                    if attempt + 1 < self.max_retries {
                        let wait = backoff_delay(self.retry_base, attempt);
                        warn!(
                            "MCP call {} failed (attempt {}/{}): {}. Retrying in {:?}",
                            method,
                            attempt + 1,
                            self.max_retries,
                            e,
                            wait
                        );
                        tokio::time::sleep(wait).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| TransportError::Network("no attempt made".into()));
        error!("MCP call {} gave up: {}", method, last);
        Err(TransportError::RetriesExhausted {
            method: method.to_string(),
            attempts: self.max_retries,
            last: Box::new(last),
        })
    }

    async fn attempt(
        &self,
        method: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json, text/event-stream")
            .header("Content-Type", "application/json")
            .header("Mcp-Session-Id", &self.session_id)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            error!(
                "MCP HTTP error {} for {} (CT={}): {}",
                status.as_u16(),
                method,
                content_type,
                sse::preview(&body, 500)
            );
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        if content_type.contains("text/event-stream") {
            debug!("MCP SSE preview: {:?}", sse::preview(&body, LOG_PREVIEW_CHARS));
            return sse::first_json(&body).ok_or_else(|| {
                error!(
                    "Failed to parse SSE JSON for {}: {}",
                    method,
                    sse::preview(&body, LOG_PREVIEW_CHARS)
                );
                TransportError::Parse("no JSON data event in SSE response".to_string())
            });
        }

        serde_json::from_str(&body)
            .ok()
            .or_else(|| sse::scan_first_json(&body))
            .ok_or_else(|| {
                error!(
                    "MCP response not JSON (CT={}): {:?}",
                    content_type,
                    sse::preview(&body, LOG_PREVIEW_CHARS)
                );
                TransportError::Parse(format!("response body is not JSON (CT={})", content_type))
            })
    }

    /// Call a remote tool through `tools/call`
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, TransportError> {
        self.invoke_with_timeout(name, arguments, self.request_timeout)
            .await
    }

    async fn invoke_with_timeout(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.call(
            "tools/call",
            json!({"name": name, "arguments": arguments}),
            timeout,
        )
        .await
    }

    /// Start `num_branches` agent runs from `parent_branch_id`
    pub async fn parallel_explore(
        &self,
        project_name: &str,
        parent_branch_id: &str,
        prompt: &str,
        agent: &str,
        num_branches: u32,
    ) -> Result<Value, TransportError> {
        self.invoke(
            PARALLEL_EXPLORE,
            json!({
                "project_name": project_name,
                "parent_branch_id": parent_branch_id,
                "shared_prompt_sequence": [prompt],
                "num_branches": num_branches,
                "agent": agent,
            }),
        )
        .await
    }

    /// Fetch a branch record, including its status
    pub async fn get_branch(&self, branch_id: &str) -> Result<Value, TransportError> {
        self.invoke_with_timeout(
            GET_BRANCH,
            json!({"branch_id": branch_id}),
            self.status_timeout,
        )
        .await
    }

    /// Read a file from a branch workspace
    pub async fn branch_read_file(
        &self,
        branch_id: &str,
        file_path: &str,
    ) -> Result<Value, TransportError> {
        self.invoke(
            BRANCH_READ_FILE,
            json!({"branch_id": branch_id, "file_path": file_path}),
        )
        .await
    }
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`, saturating
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 40), base * u32::MAX);
        assert_eq!(backoff_delay(Duration::MAX, 5), Duration::MAX);
    }

    #[test]
    fn test_client_trims_endpoint_and_has_session() {
        let config = McpConfig {
            base_url: "http://localhost:8000/mcp/sse/".into(),
            ..McpConfig::default()
        };
        let client = McpClient::new(&config);
        assert_eq!(client.endpoint(), "http://localhost:8000/mcp/sse");
        assert!(uuid::Uuid::parse_str(client.session_id()).is_ok());
    }

    #[test]
    fn test_exhausted_error_names_last_failure() {
        let err = TransportError::RetriesExhausted {
            method: "tools/call".into(),
            attempts: 3,
            last: Box::new(TransportError::Http {
                status: 502,
                body: "bad gateway".into(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("502"));
    }
}
