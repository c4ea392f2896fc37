//! Orchestration loop
//!
//! Drives the Brain turn by turn:
//!
//! 1. Send the full conversation plus the tool schema to the Brain
//! 2. Append the assistant turn to the conversation
//! 3. Tool calls: dispatch each in order, append one tool message per call
//! 4. No tool calls: check the content for a final report
//! 5. Stop on a final report (COMPLETED) or when the bound is used up
//!    (EXHAUSTED)
//!
//! Either way the workspace is published before the run returns.
//!
//! # Limits
//!
//! - Bound of `max_iterations` units, counted by a [`BoundStrategy`]
//! - Absolute ceiling of `turn_ceiling` Brain turns
//! - `llm.timeout_secs` per Brain call

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{BoundKind, Config};
use crate::llm::{extract_fenced_json, LLMProvider, Message, ToolCall};
use crate::tools::{BranchTracker, ToolDispatcher, ToolKind};
use sdk::errors::EngineError;
use sdk::types::{FinalReport, RunReport, ToolResult};

use super::finalize::Publisher;
use super::prompt::{self, PromptContext};
use super::Conversation;

/// Recognizes the terminal report in plain assistant content
pub type CompletionMarker = fn(&str) -> Option<FinalReport>;

/// Canonical marker: a JSON object with `"is_finished": true`
///
/// The object may be the whole content or the first fenced code block.
pub fn is_finished_marker(content: &str) -> Option<FinalReport> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(trimmed)
        .ok()
        .or_else(|| extract_fenced_json(trimmed).and_then(|body| serde_json::from_str(body.trim()).ok()))?;

    if value.get("is_finished").and_then(Value::as_bool) != Some(true) {
        return None;
    }

    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Some(FinalReport {
        is_finished: true,
        task: text("task"),
        summary: text("summary"),
    })
}

/// What one unit of the iteration bound is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundStrategy {
    /// Every turn counts, except tool batches made only of status checks
    Iterations,

    /// Only turns with a successful `execute_agent` for `reviewer` count
    ReviewCycles { reviewer: String },
}

impl BoundStrategy {
    pub fn from_config(config: &Config) -> Self {
        match config.orchestrator.bound {
            BoundKind::Iterations => Self::Iterations,
            BoundKind::ReviewCycles => Self::ReviewCycles {
                reviewer: config.orchestrator.reviewer_agent.clone(),
            },
        }
    }

    /// Whether a dispatched tool batch consumes a bound unit
    pub fn counts_batch(&self, batch: &[(ToolCall, ToolResult)]) -> bool {
        match self {
            Self::Iterations => !batch.iter().all(|(call, _)| {
                ToolKind::from_name(&call.name).is_some_and(ToolKind::is_passive)
            }),
            Self::ReviewCycles { reviewer } => batch.iter().any(|(call, result)| {
                ToolKind::from_name(&call.name) == Some(ToolKind::ExecuteAgent)
                    && result.is_success()
                    && requested_agent(call).as_deref() == Some(reviewer.as_str())
            }),
        }
    }

    /// Whether a plain-content turn that is not a final report consumes a unit
    pub fn counts_text_turn(&self) -> bool {
        matches!(self, Self::Iterations)
    }
}

fn requested_agent(call: &ToolCall) -> Option<String> {
    serde_json::from_str::<Value>(&call.arguments)
        .ok()?
        .get("agent")?
        .as_str()
        .map(str::to_string)
}

/// Loop limits
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_iterations: usize,
    pub turn_ceiling: usize,
    pub bound: BoundStrategy,
    pub llm_timeout: Duration,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.orchestrator.max_iterations,
            turn_ceiling: config.orchestrator.turn_ceiling,
            bound: BoundStrategy::from_config(config),
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
        }
    }
}

/// One run's inputs
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub task: String,
    pub parent_branch_id: String,
    pub project_name: Option<String>,
}

impl RunRequest {
    pub fn new(task: impl Into<String>, parent_branch_id: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            parent_branch_id: parent_branch_id.into(),
            project_name: None,
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project_name = Some(project.into());
        self
    }
}

/// How the loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A final report was recognized
    Completed(FinalReport),

    /// The bound or the turn ceiling was reached first
    Exhausted,

    /// The Brain failed
    Aborted,
}

impl RunOutcome {
    /// Outcome line handed to the publishing agent
    pub fn summary_text(&self) -> &str {
        match self {
            Self::Completed(report) if !report.summary.trim().is_empty() => &report.summary,
            Self::Completed(_) => "Workflow completed successfully.",
            Self::Exhausted => "Reached iteration limit before clean review sign-off.",
            Self::Aborted => "Run aborted by a Brain failure before clean review sign-off.",
        }
    }
}

/// Counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopState {
    /// Bound units consumed
    pub iterations: usize,

    /// Brain turns issued
    pub turns: usize,
}

/// Orchestrator that runs the Brain against the dispatcher
pub struct Orchestrator {
    brain: Arc<dyn LLMProvider>,
    dispatcher: Arc<ToolDispatcher>,
    publisher: Publisher,
    settings: LoopSettings,
    marker: CompletionMarker,
    workspace_dir: String,
    implementer: String,
    reviewer: String,
    worklog: String,
}

impl Orchestrator {
    pub fn new(
        brain: Arc<dyn LLMProvider>,
        dispatcher: Arc<ToolDispatcher>,
        publisher: Publisher,
        config: &Config,
    ) -> Self {
        Self {
            brain,
            dispatcher,
            publisher,
            settings: LoopSettings::from_config(config),
            marker: is_finished_marker,
            workspace_dir: config.core.workspace_dir.clone(),
            implementer: config.orchestrator.implementer_agent.clone(),
            reviewer: config.orchestrator.reviewer_agent.clone(),
            worklog: config.core.worklog_filename.clone(),
        }
    }

    /// Replace the loop limits
    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the final report predicate
    pub fn with_marker(mut self, marker: CompletionMarker) -> Self {
        self.marker = marker;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    fn priming(&self, request: &RunRequest) -> Vec<Message> {
        let project = request
            .project_name
            .as_deref()
            .or(self.dispatcher.default_project())
            .unwrap_or_default();

        prompt::initial_messages(&PromptContext {
            task: &request.task,
            parent_branch_id: &request.parent_branch_id,
            project_name: project,
            workspace_dir: &self.workspace_dir,
            implementer: &self.implementer,
            reviewer: &self.reviewer,
            worklog: &self.worklog,
        })
    }

    /// Run one task to completion or exhaustion, then publish
    ///
    /// # Errors
    ///
    /// - `OrchestrationExhausted` when no final report arrived in time; the
    ///   message carries the publish outcome
    /// - `LLMProvider` / `LLMTimeout` when the Brain failed (publish is still
    ///   attempted)
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, EngineError> {
        info!(
            "Starting run from parent {}: {}",
            request.parent_branch_id, request.task
        );

        let mut conversation = Conversation::new(self.priming(request));
        let mut tracker = BranchTracker::new(None);
        let mut state = LoopState::default();

        let exit = self.drive(&mut conversation, &mut tracker, &mut state).await;

        match exit {
            Ok(RunOutcome::Completed(report)) => {
                info!(
                    "Final report received after {} turns ({} iterations)",
                    state.turns, state.iterations
                );
                let outcome = RunOutcome::Completed(report.clone());
                let (publish_branch_id, publish_error) = match self
                    .publisher
                    .publish(&self.dispatcher, &tracker, request, &outcome)
                    .await
                {
                    Ok(branch_id) => (Some(branch_id), None),
                    Err(e) => {
                        warn!("Publish step failed: {}", e);
                        (None, Some(e.to_string()))
                    }
                };

                let task = if report.task.trim().is_empty() {
                    request.task.clone()
                } else {
                    report.task
                };

                Ok(RunReport {
                    task,
                    summary: report.summary,
                    is_finished: true,
                    lineage: tracker.range(),
                    publish_branch_id,
                    publish_error,
                    iterations: state.iterations,
                    turns: state.turns,
                })
            }
            Ok(outcome) => {
                error!("Reached maximum iterations without final report.");
                let publish = match self
                    .publisher
                    .publish(&self.dispatcher, &tracker, request, &outcome)
                    .await
                {
                    Ok(branch_id) => {
                        info!(
                            "Workspace published to branch (branch_id={}) after iteration limit.",
                            branch_id
                        );
                        format!("workspace published to branch {}", branch_id)
                    }
                    Err(e) => format!("publish failed: {}", e),
                };
                Err(EngineError::OrchestrationExhausted {
                    limit: self.settings.max_iterations,
                    publish,
                })
            }
            Err(brain_error) => {
                error!("Run aborted: {}", brain_error);
                match self
                    .publisher
                    .publish(&self.dispatcher, &tracker, request, &RunOutcome::Aborted)
                    .await
                {
                    Ok(branch_id) => info!("Partial work published to branch {}", branch_id),
                    Err(e) => warn!("Best-effort publish after Brain failure failed: {}", e),
                }
                Err(brain_error)
            }
        }
    }

    /// The turn loop proper
    ///
    /// Returns `Completed` or `Exhausted`; Brain failures are returned as
    /// errors. Never publishes.
    pub async fn drive(
        &self,
        conversation: &mut Conversation,
        tracker: &mut BranchTracker,
        state: &mut LoopState,
    ) -> Result<RunOutcome, EngineError> {
        let tools = self.dispatcher.definitions();

        loop {
            if state.iterations >= self.settings.max_iterations {
                return Ok(RunOutcome::Exhausted);
            }
            if state.turns >= self.settings.turn_ceiling {
                warn!(
                    "Turn ceiling ({}) reached with {}/{} iterations used",
                    self.settings.turn_ceiling, state.iterations, self.settings.max_iterations
                );
                return Ok(RunOutcome::Exhausted);
            }

            state.turns += 1;
            info!(
                "LLM turn {} (iteration {}/{})",
                state.turns,
                state.iterations + 1,
                self.settings.max_iterations
            );

            let turn = match timeout(
                self.settings.llm_timeout,
                self.brain.generate(conversation.messages(), &tools),
            )
            .await
            {
                Ok(Ok(turn)) => turn,
                Ok(Err(e)) => {
                    error!("LLM call failed: {}", e);
                    return Err(EngineError::LLMProvider(e.to_string()));
                }
                Err(_) => {
                    error!("LLM call timed out after {:?}", self.settings.llm_timeout);
                    return Err(EngineError::LLMTimeout);
                }
            };

            conversation.push(turn.to_message());

            if turn.has_tool_calls() {
                let mut batch = Vec::with_capacity(turn.tool_calls.len());
                for call in turn.tool_calls {
                    debug!("Tool call: {} ({})", call.name, call.id);
                    let result = self.dispatcher.handle(&call, tracker).await;
                    conversation.push(Message::tool_result(result.to_content(), &call.id));
                    batch.push((call, result));
                }

                if self.settings.bound.counts_batch(&batch) {
                    state.iterations += 1;
                } else {
                    debug!("Tool batch does not consume an iteration");
                }
                continue;
            }

            if let Some(report) = (self.marker)(&turn.content) {
                return Ok(RunOutcome::Completed(report));
            }

            info!("Assistant response was not a final report; continuing.");
            if self.settings.bound.counts_text_turn() {
                state.iterations += 1;
            }
        }
    }
}
