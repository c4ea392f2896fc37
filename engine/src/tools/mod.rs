//! Tool dispatch
//!
//! The Brain can call exactly three tools. [`ToolDispatcher::handle`] parses
//! the call, validates the typed arguments, talks to the remote service and
//! always answers with a [`ToolResult`] envelope, so a failing tool never
//! aborts the conversation.

pub mod check_status;
pub mod execute_agent;
pub mod lineage;
pub mod read_artifact;
pub mod schema;

pub use check_status::CheckStatusArgs;
pub use execute_agent::ExecuteAgentArgs;
pub use lineage::BranchTracker;
pub use read_artifact::ReadArtifactArgs;

use crate::config::{Config, PollingConfig};
use crate::llm::ToolCall;
use crate::mcp::{McpClient, TransportError};
use sdk::types::ToolResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Errors raised while executing a tool call
#[derive(Debug, thiserror::Error)]
pub enum ToolExecutionError {
    #[error("Missing tool name in call.")]
    MissingName,

    #[error("Unsupported tool: {0}")]
    Unsupported(String),

    #[error("Invalid JSON arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Validation(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Missing branch id in {0} response.")]
    MissingBranchId(&'static str),

    #[error("Timed out waiting for branch {branch_id} (last status={status})")]
    Timeout { branch_id: String, status: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<ToolExecutionError> for sdk::errors::EngineError {
    fn from(err: ToolExecutionError) -> Self {
        sdk::errors::EngineError::ToolExecution(err.to_string())
    }
}

/// The closed set of dispatchable tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ExecuteAgent,
    CheckStatus,
    ReadArtifact,
}

const TOOL_TABLE: [(&str, ToolKind); 3] = [
    ("execute_agent", ToolKind::ExecuteAgent),
    ("check_status", ToolKind::CheckStatus),
    ("read_artifact", ToolKind::ReadArtifact),
];

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::ExecuteAgent,
        ToolKind::CheckStatus,
        ToolKind::ReadArtifact,
    ];

    /// Look a tool up by its exact name
    pub fn from_name(name: &str) -> Option<Self> {
        TOOL_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ExecuteAgent => "execute_agent",
            ToolKind::CheckStatus => "check_status",
            ToolKind::ReadArtifact => "read_artifact",
        }
    }

    /// Status polling is a passive sub-step of the previous action
    pub fn is_passive(self) -> bool {
        matches!(self, ToolKind::CheckStatus)
    }
}

/// Bridges Brain tool calls to the remote service
///
/// The dispatcher holds no per-run state; lineage lives in the
/// [`BranchTracker`] passed to every call.
pub struct ToolDispatcher {
    client: Arc<McpClient>,
    default_project: Option<String>,
    max_branches: u32,
    polling: PollingConfig,
}

impl ToolDispatcher {
    pub fn new(client: Arc<McpClient>, config: &Config) -> Self {
        Self {
            client,
            default_project: config.core.project_name.clone(),
            max_branches: config.orchestrator.max_branches,
            polling: config.polling.clone(),
        }
    }

    /// Project used when a call omits `project_name`
    pub fn with_default_project(mut self, project: Option<String>) -> Self {
        if project.is_some() {
            self.default_project = project;
        }
        self
    }

    pub fn default_project(&self) -> Option<&str> {
        self.default_project.as_deref()
    }

    pub fn max_branches(&self) -> u32 {
        self.max_branches
    }

    /// Tool definitions to offer the Brain
    pub fn definitions(&self) -> Vec<Value> {
        schema::tool_definitions(self.max_branches)
    }

    /// Execute one tool call and wrap the outcome in an envelope
    pub async fn handle(&self, call: &ToolCall, tracker: &mut BranchTracker) -> ToolResult {
        debug!("Dispatching tool '{}' with args: {}", call.name, call.arguments);

        match self.try_handle(call, tracker).await {
            Ok(data) => ToolResult::success(data),
            Err(e) => {
                warn!(tool = %call.name, "Tool call failed: {}", e);
                ToolResult::error(e.to_string())
            }
        }
    }

    async fn try_handle(
        &self,
        call: &ToolCall,
        tracker: &mut BranchTracker,
    ) -> Result<Value, ToolExecutionError> {
        if call.name.trim().is_empty() {
            return Err(ToolExecutionError::MissingName);
        }
        let kind = ToolKind::from_name(&call.name)
            .ok_or_else(|| ToolExecutionError::Unsupported(call.name.clone()))?;
        let arguments = parse_arguments(&call.arguments)?;

        match kind {
            ToolKind::ExecuteAgent => self.execute_agent(decode(arguments)?, tracker).await,
            ToolKind::CheckStatus => self.check_status(decode(arguments)?, tracker).await,
            ToolKind::ReadArtifact => self.read_artifact(decode(arguments)?).await,
        }
    }
}

/// Parse call arguments into a JSON object; blank text means no arguments
fn parse_arguments(raw: &str) -> Result<Value, ToolExecutionError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ToolExecutionError::InvalidArguments(e.to_string()))?;
    if !value.is_object() {
        return Err(ToolExecutionError::InvalidArguments(
            "arguments must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

fn decode<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolExecutionError> {
    serde_json::from_value(arguments).map_err(|e| ToolExecutionError::InvalidArguments(e.to_string()))
}

/// Reject blank required strings
fn require(field: &str, value: &str) -> Result<(), ToolExecutionError> {
    if value.trim().is_empty() {
        return Err(ToolExecutionError::Validation(format!(
            "`{}` must be a non-empty string",
            field
        )));
    }
    Ok(())
}

/// Remote-reported failure carried inside an otherwise successful response
pub fn remote_error(response: &Value) -> Option<String> {
    let describe = |v: &Value| match v {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        other => other.to_string(),
    };

    if response.get("isError").and_then(Value::as_bool) == Some(true) {
        let detail = response
            .get("error")
            .or_else(|| response.get("content"))
            .map(describe)
            .unwrap_or_else(|| "remote tool reported an error".to_string());
        return Some(detail);
    }
    response.get("error").filter(|e| !e.is_null()).map(describe)
}

/// Branch identifier of a record: `branch_id` or `id`, then the same keys
/// under a nested `branch` object
pub fn extract_branch_id(record: &Value) -> Option<String> {
    const KEYS: [&str; 2] = ["branch_id", "id"];

    let direct = |obj: &Value| {
        KEYS.iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    };

    direct(record).or_else(|| record.get("branch").and_then(direct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_table() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("Execute_Agent"), None);
        assert_eq!(ToolKind::from_name("rm_rf"), None);
        assert!(ToolKind::CheckStatus.is_passive());
        assert!(!ToolKind::ExecuteAgent.is_passive());
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert_eq!(parse_arguments(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(matches!(
            parse_arguments("{not json"),
            Err(ToolExecutionError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_arguments("[1,2]"),
            Err(ToolExecutionError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_extract_branch_id() {
        assert_eq!(extract_branch_id(&json!({"branch_id": "b1"})), Some("b1".into()));
        assert_eq!(extract_branch_id(&json!({"id": "b2"})), Some("b2".into()));
        assert_eq!(
            extract_branch_id(&json!({"branch_id": "", "branch": {"id": "b3"}})),
            Some("b3".into())
        );
        assert_eq!(extract_branch_id(&json!({"id": 7})), None);
        assert_eq!(extract_branch_id(&json!({})), None);
    }

    #[test]
    fn test_remote_error() {
        assert_eq!(
            remote_error(&json!({"isError": true, "error": "quota"})),
            Some("quota".into())
        );
        assert_eq!(
            remote_error(&json!({"error": {"code": -32601, "message": "Method not found"}})),
            Some("Method not found".into())
        );
        assert_eq!(remote_error(&json!({"isError": false, "branches": []})), None);
        assert_eq!(remote_error(&json!({"error": null})), None);
    }
}
