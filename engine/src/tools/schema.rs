//! Tool definitions offered to the Brain

use serde_json::{json, Value};

/// Function-calling definitions for every dispatchable tool
pub fn tool_definitions(max_branches: u32) -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": "execute_agent",
                "description": "Launch a parallel_explore job for a specialist agent.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "agent": {"type": "string", "description": "Target specialist agent name."},
                        "prompt": {"type": "string", "description": "Prompt for the agent."},
                        "project_name": {"type": "string", "description": "Remote project name."},
                        "parent_branch_id": {"type": "string", "description": "Branch UUID to branch from."},
                        "num_branches": {
                            "type": "integer",
                            "description": "Optional number of sibling branches.",
                            "default": 1,
                            "minimum": 1,
                            "maximum": max_branches
                        }
                    },
                    "required": ["agent", "prompt", "project_name", "parent_branch_id"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "check_status",
                "description": "Wait for a branch to finish and return its status record.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "branch_id": {"type": "string", "description": "Branch UUID returned from execute_agent."},
                        "timeout_seconds": {"type": "number", "default": 1800},
                        "poll_interval_seconds": {"type": "number", "default": 3},
                        "max_poll_interval_seconds": {"type": "number", "default": 30}
                    },
                    "required": ["branch_id"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "read_artifact",
                "description": "Read a text artifact produced by a branch.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "branch_id": {"type": "string", "description": "Branch that produced the artifact."},
                        "path": {"type": "string", "description": "Artifact path or filename."}
                    },
                    "required": ["branch_id", "path"]
                }
            }
        }),
    ]
}
