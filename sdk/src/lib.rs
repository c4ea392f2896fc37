//! Devagent SDK
//!
//! Shared types and the error taxonomy used by the engine and its tests.

/// Error types and handling
pub mod errors;

/// Tool result envelope and run report types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, EngineErrorExt};
pub use types::{FinalReport, Lineage, RunReport, ToolResult};
