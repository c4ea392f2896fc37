//! Tool result and run report types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform envelope returned by every tool dispatch.
///
/// Serializes as `{"status": "success", "data": ...}` or
/// `{"status": "error", "error": "..."}`. The Brain only ever sees this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Success { data: Value },
    Error { error: String },
}

impl ToolResult {
    /// Create a success envelope
    pub fn success(data: Value) -> Self {
        Self::Success { data }
    }

    /// Create an error envelope
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Payload of a success envelope
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data } => Some(data),
            Self::Error { .. } => None,
        }
    }

    /// Message of an error envelope
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error } => Some(error),
        }
    }

    /// Compact JSON used as the content of a tool-result message
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({"status": "error", "error": format!("unserializable result: {}", e)})
                .to_string()
        })
    }
}

/// Terminal report emitted by the Brain as plain assistant content.
///
/// Canonical schema: `{"is_finished": true, "task": "...", "summary": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub is_finished: bool,

    #[serde(default)]
    pub task: String,

    #[serde(default)]
    pub summary: String,
}

/// Observed branch lineage of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_branch_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_branch_id: Option<String>,
}

/// Structured result of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Original task text
    pub task: String,

    /// Human-readable completion summary from the final report
    pub summary: String,

    pub is_finished: bool,

    #[serde(flatten)]
    pub lineage: Lineage,

    /// Branch that holds the committed and pushed workspace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_branch_id: Option<String>,

    /// Non-fatal annotation when the publish step failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_error: Option<String>,

    /// Bound units consumed (iterations or review cycles)
    pub iterations: usize,

    /// Brain turns issued
    pub turns: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let ok = ToolResult::success(json!({"branch_id": "b1"}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "data": {"branch_id": "b1"}})
        );

        let err = ToolResult::error("Unsupported tool: rm_rf");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"status": "error", "error": "Unsupported tool: rm_rf"})
        );
        assert_eq!(err.error_message(), Some("Unsupported tool: rm_rf"));
        assert!(err.data().is_none());
    }

    #[test]
    fn test_final_report_defaults_missing_text() {
        let report: FinalReport = serde_json::from_str(r#"{"is_finished": true}"#).unwrap();
        assert!(report.is_finished);
        assert!(report.task.is_empty());
        assert!(report.summary.is_empty());
    }

    #[test]
    fn test_run_report_flattens_lineage() {
        let report = RunReport {
            task: "T".into(),
            summary: "S".into(),
            is_finished: true,
            lineage: Lineage {
                start_branch_id: Some("a".into()),
                latest_branch_id: Some("c".into()),
            },
            publish_branch_id: None,
            publish_error: None,
            iterations: 2,
            turns: 5,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["start_branch_id"], "a");
        assert_eq!(value["latest_branch_id"], "c");
        assert!(value.get("publish_branch_id").is_none());
    }
}
