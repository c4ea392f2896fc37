//! Orchestration engine
//!
//! Runs the Brain over the tool dispatcher until it emits a final report or
//! the iteration bound is used up, then publishes the workspace.

pub mod conversation;
pub mod core;
pub mod finalize;
pub mod prompt;

pub use conversation::Conversation;
pub use core::{
    is_finished_marker, BoundStrategy, CompletionMarker, LoopSettings, LoopState, Orchestrator,
    RunOutcome, RunRequest,
};
pub use finalize::Publisher;
