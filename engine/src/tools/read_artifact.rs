//! `read_artifact`: fetch a file a branch produced

use super::{remote_error, require, ToolDispatcher, ToolExecutionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadArtifactArgs {
    pub branch_id: String,
    pub path: String,
}

impl ToolDispatcher {
    /// Return the remote `branch_read_file` payload verbatim
    pub async fn read_artifact(&self, args: ReadArtifactArgs) -> Result<Value, ToolExecutionError> {
        require("branch_id", &args.branch_id)?;
        require("path", &args.path)?;

        info!("Reading artifact {} from branch {}", args.path, args.branch_id);
        let response = self
            .client
            .branch_read_file(&args.branch_id, &args.path)
            .await?;

        if let Some(message) = remote_error(&response) {
            return Err(ToolExecutionError::Remote(message));
        }
        Ok(response)
    }
}
