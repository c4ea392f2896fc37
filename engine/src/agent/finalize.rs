//! Publish step run at the end of every orchestration run
//!
//! The implementer agent is asked to commit and push the workspace from the
//! latest branch of the run. The publish credential is only ever written into
//! that one instruction.

use super::core::{RunOutcome, RunRequest};
use crate::secrets::{SecretString, REDACTED};
use crate::tools::check_status::branch_status;
use crate::tools::{BranchTracker, CheckStatusArgs, ExecuteAgentArgs, ToolDispatcher};
use sdk::errors::EngineError;
use tracing::info;

/// Settings shared by every publish of a process
#[derive(Debug, Clone)]
pub struct Publisher {
    token: Option<SecretString>,
    agent: String,
    workspace_dir: String,
    worklog_filename: String,
}

impl Publisher {
    pub fn new(
        token: Option<SecretString>,
        agent: impl Into<String>,
        workspace_dir: impl Into<String>,
        worklog_filename: impl Into<String>,
    ) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            agent: agent.into(),
            workspace_dir: workspace_dir.into(),
            worklog_filename: worklog_filename.into(),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn worklog_path(&self) -> String {
        format!(
            "{}/{}",
            self.workspace_dir.trim_end_matches('/'),
            self.worklog_filename
        )
    }

    /// Instruction handed to the publishing agent
    fn instruction(
        &self,
        token: &SecretString,
        request: &RunRequest,
        outcome: &RunOutcome,
        tracker: &BranchTracker,
    ) -> String {
        let token_literal = serde_json::Value::String(token.unsecure().to_string()).to_string();
        let meta = format!(
            "commit-meta: start_branch={} latest_branch={}",
            tracker.start().unwrap_or_default(),
            tracker.latest().unwrap_or_default()
        );

        format!(
            "Finalize the task by committing and pushing the current workspace state.\n\
             \n\
             Task: {task}\n\
             Outcome: {outcome}\n\
             GitHub access token (export for git auth and unset afterwards): {token_literal}\n\
             Meta (include in the commit message if helpful): {meta}\n\
             \n\
             The worklog is located at '{worklog}'.\n\
             \n\
             Choose an appropriate git branch name for this task, commit the related file changes \
             (only files related to the user task; do not commit intermediate files such as the \
             worklog, review logs, temporary tests or scripts), push to the remote repository, and \
             reply with the branch name and commit hash. Do not print the raw token anywhere except \
             when configuring git.",
            task = request.task,
            outcome = outcome.summary_text(),
            worklog = self.worklog_path(),
        )
    }

    /// Ask the publishing agent to commit and push, then wait for it
    ///
    /// The parent is the latest branch of `tracker`, else the run's original
    /// parent. Returns the publish branch id once its status is `succeed`.
    ///
    /// # Errors
    ///
    /// `EngineError::Publish` when the token or a parent is missing, or either
    /// remote step fails. Error text never contains the token.
    pub async fn publish(
        &self,
        dispatcher: &ToolDispatcher,
        tracker: &BranchTracker,
        request: &RunRequest,
        outcome: &RunOutcome,
    ) -> Result<String, EngineError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| EngineError::Publish("missing GitHub token for publish step".into()))?;

        let parent = tracker
            .latest()
            .map(str::to_string)
            .or_else(|| Some(request.parent_branch_id.trim().to_string()))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                EngineError::Publish(
                    "unable to determine parent branch id for publish step".into(),
                )
            })?;

        let scrub = |text: String| text.replace(token.unsecure(), REDACTED);

        info!(
            "Finalizing workflow by asking {} to push from branch {}",
            self.agent, parent
        );

        // Publish branches are not part of the run's lineage
        let mut scratch = tracker.clone();

        let args = ExecuteAgentArgs {
            agent: self.agent.clone(),
            prompt: self.instruction(token, request, outcome, tracker),
            project_name: request.project_name.clone(),
            parent_branch_id: parent,
            num_branches: None,
        };
        let started = dispatcher
            .execute_agent(args, &mut scratch)
            .await
            .map_err(|e| {
                EngineError::Publish(scrub(format!("publish execute_agent failed: {}", e)))
            })?;

        let branch_id = started
            .get("branch_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::Publish("publish execute_agent missing branch id".into()))?;

        let record = dispatcher
            .check_status(CheckStatusArgs::new(branch_id.clone()), &mut scratch)
            .await
            .map_err(|e| {
                EngineError::Publish(scrub(format!("publish check_status failed: {}", e)))
            })?;

        let status = branch_status(&record);
        if status != "succeed" {
            return Err(EngineError::Publish(format!(
                "publish branch {} ended with status '{}'",
                branch_id, status
            )));
        }

        info!("Workspace published to branch {}", branch_id);
        Ok(branch_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::types::FinalReport;

    fn request() -> RunRequest {
        RunRequest::new("Add retries", "b-root")
    }

    #[test]
    fn test_instruction_contents() {
        let publisher = Publisher::new(
            Some("ghp_\"quoted\"".into()),
            "claude_code",
            "/workspace/",
            "worklog.md",
        );
        let mut tracker = BranchTracker::new(None);
        tracker.record("b1");
        tracker.record("b4");

        let outcome = RunOutcome::Completed(FinalReport {
            is_finished: true,
            task: "Add retries".into(),
            summary: String::new(),
        });
        let token = SecretString::from("ghp_\"quoted\"");
        let text = publisher.instruction(&token, &request(), &outcome, &tracker);

        assert!(text.contains("Task: Add retries"));
        assert!(text.contains("Outcome: Workflow completed successfully."));
        assert!(text.contains(r#""ghp_\"quoted\"""#));
        assert!(text.contains("commit-meta: start_branch=b1 latest_branch=b4"));
        assert!(text.contains("'/workspace/worklog.md'"));
    }

    #[test]
    fn test_blank_token_counts_as_missing() {
        let publisher = Publisher::new(Some("  ".into()), "claude_code", "/w", "worklog.md");
        assert!(!publisher.has_token());
    }
}
