//! `execute_agent`: start a specialist agent run on a new branch

use super::{extract_branch_id, remote_error, require, BranchTracker, ToolDispatcher, ToolExecutionError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteAgentArgs {
    pub agent: String,
    pub prompt: String,

    /// Falls back to the dispatcher's default project when absent
    #[serde(default)]
    pub project_name: Option<String>,

    pub parent_branch_id: String,

    /// Any JSON number; only integral values in range are accepted
    #[serde(default)]
    pub num_branches: Option<f64>,
}

impl ToolDispatcher {
    /// Validate, launch `parallel_explore`, and record the first new branch
    ///
    /// Returns `{"parallel_explore": <raw response>, "branch_id": <id>}`.
    pub async fn execute_agent(
        &self,
        args: ExecuteAgentArgs,
        tracker: &mut BranchTracker,
    ) -> Result<Value, ToolExecutionError> {
        let project = args
            .project_name
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.default_project.clone())
            .unwrap_or_default();

        require("agent", &args.agent)?;
        require("prompt", &args.prompt)?;
        require("project_name", &project)?;
        require("parent_branch_id", &args.parent_branch_id)?;

        let num_branches = args.num_branches.unwrap_or(1.0);
        if num_branches.fract() != 0.0
            || num_branches < 1.0
            || num_branches > f64::from(self.max_branches)
        {
            return Err(ToolExecutionError::Validation(format!(
                "num_branches must be 1..{}",
                self.max_branches
            )));
        }

        info!(
            "Executing agent {} on project {} from parent {}",
            args.agent, project, args.parent_branch_id
        );
        let response = self
            .client
            .parallel_explore(
                &project,
                &args.parent_branch_id,
                &args.prompt,
                &args.agent,
                num_branches as u32,
            )
            .await?;

        if let Some(message) = remote_error(&response) {
            return Err(ToolExecutionError::Remote(message));
        }

        let branch_id = response
            .get("branches")
            .and_then(Value::as_array)
            .and_then(|branches| branches.first())
            .and_then(extract_branch_id)
            .ok_or(ToolExecutionError::MissingBranchId("parallel_explore"))?;

        tracker.record(&branch_id);
        info!("Agent {} started on branch {}", args.agent, branch_id);

        Ok(json!({
            "parallel_explore": response,
            "branch_id": branch_id,
        }))
    }
}
