//! Configuration management
//!
//! This module handles loading, validation, and management of the devagent
//! configuration. Configuration is stored in TOML format at
//! ~/.devagent/config.toml and can be overridden from the environment (and a
//! `.env` file in the working directory).
//!
//! # Configuration Sections
//!
//! - **core**: Log level, project name, remote workspace directory
//! - **llm**: Brain endpoint (OpenAI or Azure OpenAI), retries, timeouts
//! - **mcp**: Remote tool service endpoint, request timeouts, retry budget
//! - **polling**: Default `check_status` polling schedule
//! - **orchestrator**: Iteration bound, bound strategy, agent names
//!
//! Secrets (API keys, publish token) never live in this file; see
//! [`crate::secrets`].
//!
//! # Examples
//!
//! ```no_run
//! use devagent_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Remote tools at: {}", config.mcp.base_url);
//! println!("Max iterations: {}", config.orchestrator.max_iterations);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Brain (LLM) settings
    #[serde(default)]
    pub llm: LLMConfig,

    /// Remote tool service settings
    #[serde(default)]
    pub mcp: McpConfig,

    /// Default polling schedule for `check_status`
    #[serde(default)]
    pub polling: PollingConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Remote project the specialist agents work in
    #[serde(default)]
    pub project_name: Option<String>,

    /// Workspace directory as seen by the specialist agents
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// Worklog file the agents append to, relative to the workspace
    #[serde(default = "default_worklog_filename")]
    pub worklog_filename: String,
}

/// Brain configuration
///
/// When `api_version` is set the provider talks to Azure OpenAI: `base_url` is
/// the resource endpoint and `model` the deployment name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model (or Azure deployment) name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Azure OpenAI API version
    #[serde(default)]
    pub api_version: Option<String>,

    /// Attempts per completion before giving up
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Timeout for a single Brain turn (seconds)
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Completion token ceiling per turn
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
}

/// Remote tool service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// JSON-RPC endpoint
    #[serde(default = "default_mcp_base_url")]
    pub base_url: String,

    /// Default per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for branch status requests (seconds)
    #[serde(default = "default_status_timeout")]
    pub status_timeout_secs: u64,

    /// Attempts per call before the call fails
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Base delay between attempts; doubles after every failure (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Default `check_status` polling schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// First sleep between polls (seconds)
    #[serde(default = "default_poll_initial")]
    pub initial_secs: f64,

    /// Sleep ceiling (seconds)
    #[serde(default = "default_poll_max")]
    pub max_secs: f64,

    /// Wall-clock deadline for one `check_status` call (seconds)
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: f64,

    /// Multiplier applied to the sleep after every non-terminal poll
    #[serde(default = "default_poll_backoff")]
    pub backoff_factor: f64,
}

/// What the iteration bound counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    /// Every Brain turn except status-only batches
    #[default]
    Iterations,

    /// Only turns that complete a review cycle
    ReviewCycles,
}

/// Orchestration loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Bound on iterations (or review cycles)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Bound counting strategy
    #[serde(default)]
    pub bound: BoundKind,

    /// Specialist that implements, fixes and publishes
    #[serde(default = "default_implementer_agent")]
    pub implementer_agent: String,

    /// Specialist that reviews
    #[serde(default = "default_reviewer_agent")]
    pub reviewer_agent: String,

    /// Ceiling for `num_branches` in `execute_agent`
    #[serde(default = "default_max_branches")]
    pub max_branches: u32,

    /// Absolute ceiling on Brain turns, status-only batches included
    #[serde(default = "default_turn_ceiling")]
    pub turn_ceiling: usize,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_workspace_dir() -> String {
    "/workspace".to_string()
}

fn default_worklog_filename() -> String {
    "worklog.md".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-5".to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_llm_timeout() -> u64 {
    300
}

fn default_max_completion_tokens() -> u32 {
    4000
}

fn default_mcp_base_url() -> String {
    "http://localhost:8000/mcp/sse".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_status_timeout() -> u64 {
    300
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_poll_initial() -> f64 {
    3.0
}

fn default_poll_max() -> f64 {
    30.0
}

fn default_poll_timeout() -> f64 {
    1800.0
}

fn default_poll_backoff() -> f64 {
    1.5
}

fn default_max_iterations() -> usize {
    8
}

fn default_implementer_agent() -> String {
    "claude_code".to_string()
}

fn default_reviewer_agent() -> String {
    "codex".to_string()
}

fn default_max_branches() -> u32 {
    4
}

fn default_turn_ceiling() -> usize {
    200
}

/// Azure API version used when only the endpoint is configured
const DEFAULT_AZURE_API_VERSION: &str = "2024-12-01-preview";

/// Upper bound for `llm.max_retries` and `mcp.max_retries`
pub const MAX_RETRY_BUDGET: u32 = 10;

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            project_name: None,
            workspace_dir: default_workspace_dir(),
            worklog_filename: default_worklog_filename(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_version: None,
            max_retries: default_retries(),
            timeout_secs: default_llm_timeout(),
            max_completion_tokens: default_max_completion_tokens(),
        }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            base_url: default_mcp_base_url(),
            request_timeout_secs: default_request_timeout(),
            status_timeout_secs: default_status_timeout(),
            max_retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_secs: default_poll_initial(),
            max_secs: default_poll_max(),
            timeout_secs: default_poll_timeout(),
            backoff_factor: default_poll_backoff(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            bound: BoundKind::default(),
            implementer_agent: default_implementer_agent(),
            reviewer_agent: default_reviewer_agent(),
            max_branches: default_max_branches(),
            turn_ceiling: default_turn_ceiling(),
        }
    }
}

impl LLMConfig {
    /// True when the Brain endpoint is Azure OpenAI
    pub fn is_azure(&self) -> bool {
        self.api_version.is_some()
    }
}

impl Config {
    /// Load configuration from the default location (~/.devagent/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    /// Environment overrides are applied and the result validated.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - An environment override is malformed
    /// - Validation fails
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::parse(&contents)?;
        config.apply_process_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse and validate TOML without consulting the environment
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let config = Self::parse(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(contents: &str) -> Result<Self, EngineError> {
        toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.apply_process_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.devagent/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".devagent").join("config.toml"))
    }

    /// Apply overrides from `.env` and the process environment
    fn apply_process_env(&mut self) -> Result<(), EngineError> {
        // A missing .env file is normal; existing variables win over it
        dotenvy::dotenv().ok();
        self.apply_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply environment overrides through `lookup`
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("AZURE_OPENAI_ENDPOINT") {
            self.llm.base_url = endpoint.trim_end_matches('/').to_string();
            if self.llm.api_version.is_none() {
                self.llm.api_version = Some(DEFAULT_AZURE_API_VERSION.to_string());
            }
        }
        if let Some(deployment) = get("AZURE_OPENAI_DEPLOYMENT") {
            self.llm.model = deployment;
        }
        if let Some(version) = get("AZURE_OPENAI_API_VERSION") {
            self.llm.api_version = Some(version);
        }
        if let Some(base_url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.llm.model = model;
        }

        if let Some(base_url) = get("MCP_BASE_URL") {
            self.mcp.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("MCP_POLL_INITIAL_SECONDS") {
            self.polling.initial_secs = parse_env("MCP_POLL_INITIAL_SECONDS", &v)?;
        }
        if let Some(v) = get("MCP_POLL_MAX_SECONDS") {
            self.polling.max_secs = parse_env("MCP_POLL_MAX_SECONDS", &v)?;
        }
        if let Some(v) = get("MCP_POLL_TIMEOUT_SECONDS") {
            self.polling.timeout_secs = parse_env("MCP_POLL_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("MCP_POLL_BACKOFF_FACTOR") {
            self.polling.backoff_factor = parse_env("MCP_POLL_BACKOFF_FACTOR", &v)?;
        }

        if let Some(project) = get("PROJECT_NAME") {
            self.core.project_name = Some(project);
        }
        if let Some(workspace) = get("WORKSPACE_DIR") {
            self.core.workspace_dir = workspace;
        }
        if let Some(v) = get("DEVAGENT_MAX_ITERATIONS") {
            self.orchestrator.max_iterations = parse_env("DEVAGENT_MAX_ITERATIONS", &v)?;
            self.orchestrator.turn_ceiling = self
                .orchestrator
                .turn_ceiling
                .max(self.orchestrator.max_iterations);
        }

        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` naming the first offending setting.
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !is_http_url(&self.llm.base_url) {
            return Err(EngineError::Config(
                "llm.base_url must be a valid HTTP/HTTPS URL".to_string(),
            ));
        }
        if self.llm.is_azure() && !self.llm.base_url.starts_with("https://") {
            return Err(EngineError::Config(
                "AZURE_OPENAI_ENDPOINT must start with 'https://'".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(EngineError::Config(
                "llm.model (or AZURE_OPENAI_DEPLOYMENT) must be set".to_string(),
            ));
        }
        if matches!(&self.llm.api_version, Some(v) if v.trim().is_empty()) {
            return Err(EngineError::Config(
                "AZURE_OPENAI_API_VERSION must be non-empty".to_string(),
            ));
        }
        if !(1..=MAX_RETRY_BUDGET).contains(&self.llm.max_retries) {
            return Err(EngineError::Config(format!(
                "llm.max_retries must be 1..={}",
                MAX_RETRY_BUDGET
            )));
        }

        if !is_http_url(&self.mcp.base_url) {
            return Err(EngineError::Config(
                "MCP_BASE_URL must be a valid HTTP/HTTPS URL".to_string(),
            ));
        }
        if !(1..=MAX_RETRY_BUDGET).contains(&self.mcp.max_retries) {
            return Err(EngineError::Config(format!(
                "mcp.max_retries must be 1..={}",
                MAX_RETRY_BUDGET
            )));
        }

        if self.polling.initial_secs <= 0.0 {
            return Err(EngineError::Config(
                "MCP_POLL_INITIAL_SECONDS must be positive".to_string(),
            ));
        }
        if self.polling.initial_secs >= self.polling.max_secs {
            return Err(EngineError::Config(
                "MCP_POLL_INITIAL_SECONDS must be less than MCP_POLL_MAX_SECONDS".to_string(),
            ));
        }
        if self.polling.timeout_secs <= self.polling.max_secs {
            return Err(EngineError::Config(
                "MCP_POLL_TIMEOUT_SECONDS must be greater than MCP_POLL_MAX_SECONDS".to_string(),
            ));
        }
        if self.polling.backoff_factor <= 1.0 {
            return Err(EngineError::Config(
                "MCP_POLL_BACKOFF_FACTOR must be a float greater than 1.0".to_string(),
            ));
        }

        if self.orchestrator.max_iterations == 0 {
            return Err(EngineError::Config(
                "orchestrator.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.max_branches == 0 {
            return Err(EngineError::Config(
                "orchestrator.max_branches must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.turn_ceiling < self.orchestrator.max_iterations {
            return Err(EngineError::Config(
                "orchestrator.turn_ceiling must not be below max_iterations".to_string(),
            ));
        }
        if self.orchestrator.implementer_agent.trim().is_empty()
            || self.orchestrator.reviewer_agent.trim().is_empty()
        {
            return Err(EngineError::Config(
                "orchestrator agent names must be non-empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, EngineError> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("Invalid value for {}: {}", name, value)))
}
