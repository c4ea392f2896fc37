//! Devagent Engine Library
//!
//! Core of the devagent orchestrator. It is used by both the main binary and
//! integration tests.

/// Configuration management module
pub mod config;

/// Credential loading and redaction
pub mod secrets;

/// Brain (LLM) abstraction layer
pub mod llm;

/// Remote tool transport
pub mod mcp;

/// Tool dispatcher and branch lineage
pub mod tools;

/// Orchestration loop and publish step
pub mod agent;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
