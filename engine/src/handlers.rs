//! Command handlers for CLI operations
//!
//! - run: Run the TDD workflow for one task
//! - tools: Print the tool schema
//! - config show / config path: Inspect configuration

use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::agent::{Orchestrator, Publisher, RunRequest};
use crate::cli::RunArgs;
use crate::config::Config;
use crate::llm::openai::OpenAIProvider;
use crate::mcp::McpClient;
use crate::secrets::Credentials;
use crate::tools::ToolDispatcher;
use sdk::errors::{EngineError, EngineErrorExt};
use sdk::types::RunReport;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Apply `run` flag overrides to a copy of the configuration
pub fn effective_config(config: &Config, args: &RunArgs) -> Result<Config> {
    let mut config = config.clone();
    if let Some(max) = args.max_iterations {
        config.orchestrator.max_iterations = max;
        config.orchestrator.turn_ceiling = config.orchestrator.turn_ceiling.max(max);
    }
    if let Some(bound) = args.bound {
        config.orchestrator.bound = bound.into();
    }
    if let Some(project) = &args.project_name {
        config.core.project_name = Some(project.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Wire the Brain, transport, dispatcher and publisher for one process
pub fn build_orchestrator(config: &Config, credentials: &Credentials) -> Result<Orchestrator> {
    let api_key = credentials.require_llm_key()?;
    let brain = Arc::new(OpenAIProvider::new(config.llm.clone(), api_key));

    let client = Arc::new(McpClient::new(&config.mcp));
    let dispatcher = Arc::new(ToolDispatcher::new(client, config));

    if credentials.github_token.is_none() {
        tracing::warn!("GITHUB_ACCESS_TOKEN is not set; the publish step will fail");
    }
    let publisher = Publisher::new(
        credentials.github_token.clone(),
        config.orchestrator.implementer_agent.clone(),
        config.core.workspace_dir.clone(),
        config.core.worklog_filename.clone(),
    );

    Ok(Orchestrator::new(brain, dispatcher, publisher, config))
}

fn read_task(args: &RunArgs) -> Result<String> {
    let task = match &args.task {
        Some(task) => task.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read task from stdin")?;
            buf
        }
    };

    let task = task.trim().to_string();
    if task.is_empty() {
        anyhow::bail!("Task is empty. Pass --task or pipe the task on stdin");
    }
    Ok(task)
}

/// Render a run report for the terminal
pub fn render_report(report: &RunReport, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }

    let mut lines = vec![
        "✓ Workflow completed".to_string(),
        format!("  Task: {}", report.task),
        format!("  Summary: {}", report.summary),
        format!(
            "  Lineage: {} -> {}",
            report.lineage.start_branch_id.as_deref().unwrap_or("-"),
            report.lineage.latest_branch_id.as_deref().unwrap_or("-")
        ),
        format!(
            "  Iterations: {} ({} Brain turns)",
            report.iterations, report.turns
        ),
    ];
    match (&report.publish_branch_id, &report.publish_error) {
        (Some(branch), _) => lines.push(format!("  Published: {}", branch)),
        (None, Some(err)) => lines.push(format!("  Publish failed: {}", err)),
        (None, None) => {}
    }
    Ok(lines.join("\n"))
}

/// Render a failed run with secrets removed from the error text
pub fn render_failure(
    error: &EngineError,
    task: &str,
    credentials: &Credentials,
    format: OutputFormat,
) -> Result<String> {
    let message = credentials.scrub(&error.to_string());
    match format {
        OutputFormat::Text => Ok(format!(
            "✗ Workflow failed\n  Error: {}\n  Hint: {}",
            message,
            error.user_hint()
        )),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "status": "failed",
                "task": task,
                "error": message,
                "hint": error.user_hint(),
                "recoverable": error.is_recoverable(),
            });
            Ok(serde_json::to_string_pretty(&output)?)
        }
    }
}

/// Run the workflow for one task
///
/// A failed run is reported here and turned into a failing exit code, so the
/// caller has nothing left to print.
pub async fn handle_run(
    args: RunArgs,
    config: &Config,
    format: OutputFormat,
) -> Result<ExitCode> {
    let config = effective_config(config, &args)?;
    let task = read_task(&args)?;
    let credentials = Credentials::from_env();
    let orchestrator = build_orchestrator(&config, &credentials)?;

    let mut request = RunRequest::new(task, args.parent_branch_id.clone());
    request.project_name = config.core.project_name.clone();

    if format == OutputFormat::Text {
        println!("Executing task: {}", request.task);
        println!();
    }

    match orchestrator.run(&request).await {
        Ok(report) => {
            println!("{}", render_report(&report, format)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let rendered = render_failure(&e, &request.task, &credentials, format)?;
            match format {
                OutputFormat::Text => eprintln!("{}", rendered),
                OutputFormat::Json => println!("{}", rendered),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print the tool schema offered to the Brain
pub fn handle_tools(config: &Config, format: OutputFormat) -> Result<()> {
    let definitions = crate::tools::schema::tool_definitions(config.orchestrator.max_branches);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&definitions)?),
        OutputFormat::Text => {
            for def in &definitions {
                let function = &def["function"];
                println!(
                    "{:<15} {}",
                    function["name"].as_str().unwrap_or_default(),
                    function["description"].as_str().unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

/// Print the effective configuration
///
/// Secrets are not part of [`Config`], so nothing needs masking.
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Text => {
            toml::to_string_pretty(config).context("Failed to serialize configuration")?
        }
    };
    println!("{}", rendered);
    Ok(())
}

/// Print the configuration file path in use
pub fn handle_config_path(explicit: Option<&Path>) -> Result<()> {
    let path: PathBuf = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    println!("{}", path.display());
    Ok(())
}
